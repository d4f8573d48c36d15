//! Check command implementation.
//!
//! Builds every event of a log against a collecting sink and summarizes
//! what was reported.

use ahash::AHashMap as HashMap;
use anyhow::{Context, Result};
use gcinfo_exporter::{
    CollectingSink, Diagnostic, FanoutSink, PoolRegistryCache, SnapshotBuilder, StaticPoolSource,
};
use std::fmt::Write as FmtWrite;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::commands::generate::load_event_log;
use crate::metrics::TelemetrySink;

/// Per-pool violation counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolCounts {
    pub before_gc: u64,
    pub after_gc: u64,
}

/// Summary of all diagnostics of one check run.
#[derive(Debug, Default)]
pub struct CheckSummary {
    pub events: usize,
    pub pool_order_violations: u64,
    pub duplicate_pool_names: u64,
    pub snapshot_dumps: u64,
    pub per_pool: HashMap<String, PoolCounts>,
}

impl CheckSummary {
    pub fn from_diagnostics(events: usize, diagnostics: &[Diagnostic]) -> Self {
        let mut summary = Self {
            events,
            ..Default::default()
        };

        for d in diagnostics {
            match d {
                Diagnostic::PoolOrderViolation { .. } => summary.pool_order_violations += 1,
                Diagnostic::DuplicatePoolName { .. } => summary.duplicate_pool_names += 1,
                Diagnostic::SnapshotDump { .. } => summary.snapshot_dumps += 1,
                Diagnostic::UsageViolation {
                    pool_name, phase, ..
                } => {
                    let counts = summary.per_pool.entry(pool_name.clone()).or_default();
                    match phase {
                        gcinfo_exporter::Phase::BeforeGc => counts.before_gc += 1,
                        gcinfo_exporter::Phase::AfterGc => counts.after_gc += 1,
                    }
                }
            }
        }
        summary
    }

    pub fn usage_violations(&self) -> u64 {
        self.per_pool
            .values()
            .map(|c| c.before_gc + c.after_gc)
            .sum()
    }

    pub fn render_table(&self, pool_order: &[String]) -> String {
        let left_col = 32usize;
        let col_w = 10usize;

        let mut out = String::new();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$}",
            "pool",
            "BeforeGc",
            "AfterGc",
            left = left_col,
            col = col_w
        )
        .ok();
        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 2)).ok();

        for name in pool_order {
            let counts = self.per_pool.get(name).copied().unwrap_or_default();
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$}",
                name,
                counts.before_gc,
                counts.after_gc,
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "events checked:          {}", self.events).ok();
        writeln!(out, "usage violations:        {}", self.usage_violations()).ok();
        writeln!(out, "snapshot dumps:          {}", self.snapshot_dumps).ok();
        writeln!(out, "pool order violations:   {}", self.pool_order_violations).ok();
        writeln!(out, "duplicate pool names:    {}", self.duplicate_pool_names).ok();
        out
    }
}

/// Returns `true` when the log is free of usage violations.
pub fn command_check(
    input: &Path,
    verbose: bool,
    print_metrics: bool,
    telemetry: Option<&TelemetrySink>,
) -> Result<bool> {
    let log = load_event_log(input)?;

    let pools = StaticPoolSource::new(log.pools.clone());
    let cache = PoolRegistryCache::global();
    let collected = Arc::new(CollectingSink::new());
    let mut sink = FanoutSink::new().with(collected.clone());
    if let Some(t) = telemetry {
        sink = sink.with(Arc::new(t.clone()));
    }
    let builder = SnapshotBuilder::new(cache, &pools, &sink);

    for event in &log.events {
        builder
            .build(&event.collection)
            .with_context(|| format!("Failed to build snapshot for index {}", event.collection.index))?;
        if let Some(t) = telemetry {
            t.record_snapshot();
        }
    }

    let diagnostics = collected.take();
    debug!("Check collected {} diagnostics", diagnostics.len());

    if verbose {
        for d in &diagnostics {
            println!("[{}] {}", d.severity(), d);
        }
        println!();
    }

    let summary = CheckSummary::from_diagnostics(log.events.len(), &diagnostics);
    print!("{}", summary.render_table(cache.pool_names().unwrap_or(&[])));

    let clean = summary.usage_violations() == 0;
    if clean {
        println!("✅ No memory usage violations found");
    } else {
        println!("❌ {} memory usage violations found", summary.usage_violations());
    }

    if print_metrics {
        match telemetry {
            Some(t) => print!("{}", t.encode()?),
            None => debug!("Telemetry disabled, no metrics to print"),
        }
    }

    Ok(clean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcinfo_exporter::{Phase, UsageSample, Violation};

    fn violation(pool: &str, phase: Phase) -> Diagnostic {
        Diagnostic::UsageViolation {
            collection_index: 1,
            pool_index: 0,
            pool_name: pool.into(),
            phase,
            sample: UsageSample::new(0, 2, 1, -1),
            violations: vec![Violation::UsedExceedsCommitted],
        }
    }

    #[test]
    fn test_summary_counts() {
        let diagnostics = vec![
            violation("tenured", Phase::BeforeGc),
            violation("tenured", Phase::AfterGc),
            Diagnostic::SnapshotDump {
                collection_index: 1,
                pools: Vec::new(),
            },
            violation("nursery", Phase::AfterGc),
        ];

        let summary = CheckSummary::from_diagnostics(3, &diagnostics);

        assert_eq!(summary.usage_violations(), 3);
        assert_eq!(summary.snapshot_dumps, 1);
        assert_eq!(
            summary.per_pool["tenured"],
            PoolCounts {
                before_gc: 1,
                after_gc: 1
            }
        );

        let table = summary.render_table(&["nursery".into(), "tenured".into(), "code".into()]);
        assert_eq!(table.lines().filter(|l| l.contains(" | ")).count(), 4);
        assert!(table.contains("usage violations:        3"));
    }

    #[test]
    fn test_check_feeds_telemetry() {
        // populates the process-wide cache; no other test in the binary does
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        crate::commands::command_generate_testdata(path.clone(), 4, 1.0).unwrap();

        let telemetry = TelemetrySink::new().unwrap();
        let clean = command_check(&path, false, true, Some(&telemetry)).unwrap();

        assert!(!clean);
        assert_eq!(telemetry.snapshots_built(), 4);
        let text = telemetry.encode().unwrap();
        assert!(text.contains("gcinfo_usage_violations_total{phase=\"BeforeGc\",pool=\"tenured-SOA\"} 4"));
        assert!(text.contains("gcinfo_snapshot_dumps_total 32"));
    }
}
