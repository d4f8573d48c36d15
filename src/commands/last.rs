//! Last command implementation.
//!
//! Shows the most recent collection of each collector in an event log.

use anyhow::{bail, Result};
use gcinfo_exporter::{GarbageCollectorMonitor, PoolRegistryCache, StaticPoolSource};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::commands::generate::load_event_log;
use crate::commands::replay::{command_sink, SnapshotList, SnapshotReport};
use crate::config::{render, Config};
use crate::metrics::TelemetrySink;

pub fn command_last(
    input: &Path,
    collector: Option<i32>,
    config: &Config,
    telemetry: Option<&TelemetrySink>,
) -> Result<()> {
    let log = load_event_log(input)?;

    let mut collectors = log.collectors();
    if let Some(id) = collector {
        collectors.retain(|(cid, _)| *cid == id);
        if collectors.is_empty() {
            bail!("Collector {id} has no events in {}", input.display());
        }
    }

    let recorded = Arc::new(log.recorded_collections());
    let pools = Arc::new(StaticPoolSource::new(log.pools.clone()));
    let sink = Arc::new(command_sink(config, telemetry));

    let mut reports = Vec::new();
    for (id, name) in collectors {
        let monitor = GarbageCollectorMonitor::new(
            name.clone(),
            id,
            recorded.clone(),
            pools.clone(),
            sink.clone(),
        );

        match monitor.last_gc_info()? {
            Some(snapshot) => {
                if let Some(t) = telemetry {
                    t.record_snapshot();
                }
                let names = PoolRegistryCache::global().pool_names().unwrap_or(&[]);
                reports.push(SnapshotReport::new(&snapshot, names, Some(name)));
            }
            None => warn!("Collector {} ({}) has not collected yet", name, id),
        }
    }

    println!("{}", render(&SnapshotList { snapshots: reports }, config.output_format())?);
    Ok(())
}
