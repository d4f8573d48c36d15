//! Replay command implementation.
//!
//! Builds a snapshot for every recorded event in parallel and prints them.

use anyhow::{Context, Result};
use gcinfo_exporter::{
    FanoutSink, GcSnapshot, PoolRegistryCache, SnapshotBuilder, StaticPoolSource,
    TracingSink, UsageSample,
};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::commands::generate::load_event_log;
use crate::config::{render, Config};
use crate::metrics::TelemetrySink;

/// One pool of a snapshot, before and after the collection.
#[derive(Debug, Clone, Serialize)]
pub struct PoolReport {
    pub name: String,
    pub before: UsageSample,
    pub after: UsageSample,
}

/// Printable view of a snapshot with pools in registry order.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotReport {
    pub index: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub duration: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collector: Option<String>,
    pub pools: Vec<PoolReport>,
}

impl SnapshotReport {
    pub fn new(snapshot: &GcSnapshot, pool_names: &[String], collector: Option<String>) -> Self {
        let pools = pool_names
            .iter()
            .filter_map(|name| {
                Some(PoolReport {
                    name: name.clone(),
                    before: *snapshot.before(name)?,
                    after: *snapshot.after(name)?,
                })
            })
            .collect();

        Self {
            index: snapshot.index(),
            start_time: snapshot.start_time(),
            end_time: snapshot.end_time(),
            duration: snapshot.duration(),
            collector,
            pools,
        }
    }
}

#[derive(Serialize)]
pub struct SnapshotList {
    pub snapshots: Vec<SnapshotReport>,
}

/// Diagnostic sink for commands: tracing log plus optional telemetry.
pub fn command_sink(config: &Config, telemetry: Option<&TelemetrySink>) -> FanoutSink {
    let tracing_sink = TracingSink::new().with_dumps(config.snapshot_dumps.unwrap_or(true));
    let mut sink = FanoutSink::new().with(Arc::new(tracing_sink));
    if let Some(t) = telemetry {
        sink = sink.with(Arc::new(t.clone()));
    }
    sink
}

/// Builds and prints snapshots for every event of the log.
pub fn command_replay(
    input: &Path,
    print_metrics: bool,
    config: &Config,
    telemetry: Option<&TelemetrySink>,
) -> Result<()> {
    let start = Instant::now();
    let log = load_event_log(input)?;

    let pools = StaticPoolSource::new(log.pools.clone());
    let cache = PoolRegistryCache::global();
    let sink = command_sink(config, telemetry);
    let builder = SnapshotBuilder::new(cache, &pools, &sink);

    let snapshots: Vec<GcSnapshot> = log
        .events
        .par_iter()
        .map(|event| {
            builder
                .build(&event.collection)
                .with_context(|| format!("Failed to build snapshot for index {}", event.collection.index))
        })
        .collect::<Result<_>>()?;

    if let Some(t) = telemetry {
        for _ in &snapshots {
            t.record_snapshot();
        }
    }

    let names = cache.pool_names().unwrap_or(&[]);
    let reports = snapshots
        .iter()
        .zip(&log.events)
        .map(|(s, e)| SnapshotReport::new(s, names, Some(e.collector_name.clone())))
        .collect();

    println!("{}", render(&SnapshotList { snapshots: reports }, config.output_format())?);

    if print_metrics {
        match telemetry {
            Some(t) => print!("{}", t.encode()?),
            None => debug!("Telemetry disabled, no metrics to print"),
        }
    }

    info!(
        "Replayed {} events over {} pools in {:.2}ms",
        snapshots.len(),
        names.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcinfo_exporter::{DiagnosticSink, MemoryPool, NullSink, RawCollection};

    #[test]
    fn test_report_follows_registry_order() {
        let cache = PoolRegistryCache::new();
        let pools = StaticPoolSource::new(vec![
            MemoryPool::heap("b-heap", 0),
            MemoryPool::non_heap("a-code", 1),
        ]);
        let snapshot = SnapshotBuilder::new(&cache, &pools, &NullSink)
            .build(&RawCollection {
                index: 2,
                start_time: 5,
                end_time: 9,
                initial_size: vec![0, 0],
                pre_used: vec![4, 1],
                pre_committed: vec![8, 2],
                pre_max: vec![-1, -1],
                post_used: vec![2, 1],
                post_committed: vec![8, 2],
                post_max: vec![-1, -1],
            })
            .unwrap();

        let report = SnapshotReport::new(&snapshot, cache.pool_names().unwrap(), None);

        let names: Vec<&str> = report.pools.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b-heap", "a-code"]);
        assert_eq!(report.duration, 4);
        assert_eq!(report.pools[0].after.used, 2);
    }

    #[test]
    fn test_sink_includes_telemetry_when_enabled() {
        let telemetry = TelemetrySink::new().unwrap();
        let sink = command_sink(&Config::default(), Some(&telemetry));
        sink.emit(&gcinfo_exporter::Diagnostic::SnapshotDump {
            collection_index: 1,
            pools: Vec::new(),
        });
        assert!(telemetry.encode().unwrap().contains("gcinfo_snapshot_dumps_total 1"));
    }
}
