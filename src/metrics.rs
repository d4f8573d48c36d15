//! Prometheus telemetry for gcinfo-exporter.
//!
//! Counts diagnostics and built snapshots. The counters are fed through the
//! same [`DiagnosticSink`] interface the snapshot builder reports to.

use gcinfo_exporter::{Diagnostic, DiagnosticSink};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Collection of Prometheus counters for snapshot diagnostics.
#[derive(Clone)]
pub struct TelemetrySink {
    registry: Registry,
    usage_violations: IntCounterVec,
    pool_order_violations: IntCounter,
    duplicate_pool_names: IntCounter,
    snapshot_dumps: IntCounter,
    snapshots_built: IntCounter,
}

impl TelemetrySink {
    /// Creates and registers all counters with a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let usage_violations = IntCounterVec::new(
            Opts::new(
                "gcinfo_usage_violations_total",
                "Memory usage samples that broke an accounting invariant",
            ),
            &["phase", "pool"],
        )?;
        let pool_order_violations = IntCounter::new(
            "gcinfo_pool_order_violations_total",
            "Memory pools enumerated out of the expected heap-first id order",
        )?;
        let duplicate_pool_names = IntCounter::new(
            "gcinfo_duplicate_pool_names_total",
            "Memory pools whose name repeats an earlier pool",
        )?;
        let snapshot_dumps = IntCounter::new(
            "gcinfo_snapshot_dumps_total",
            "Full raw value dumps emitted for collections with invalid samples",
        )?;
        let snapshots_built = IntCounter::new(
            "gcinfo_snapshots_built_total",
            "Snapshots successfully built",
        )?;

        registry.register(Box::new(usage_violations.clone()))?;
        registry.register(Box::new(pool_order_violations.clone()))?;
        registry.register(Box::new(duplicate_pool_names.clone()))?;
        registry.register(Box::new(snapshot_dumps.clone()))?;
        registry.register(Box::new(snapshots_built.clone()))?;

        Ok(Self {
            registry,
            usage_violations,
            pool_order_violations,
            duplicate_pool_names,
            snapshot_dumps,
            snapshots_built,
        })
    }

    pub fn record_snapshot(&self) {
        self.snapshots_built.inc();
    }

    #[cfg(test)]
    pub fn snapshots_built(&self) -> u64 {
        self.snapshots_built.get()
    }

    #[cfg(test)]
    pub fn usage_violations(&self, phase: &str, pool: &str) -> u64 {
        self.usage_violations
            .with_label_values(&[phase, pool])
            .get()
    }

    /// Encodes all counters in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl DiagnosticSink for TelemetrySink {
    fn emit(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::PoolOrderViolation { .. } => self.pool_order_violations.inc(),
            Diagnostic::DuplicatePoolName { .. } => self.duplicate_pool_names.inc(),
            Diagnostic::UsageViolation {
                phase, pool_name, ..
            } => self
                .usage_violations
                .with_label_values(&[phase.as_str(), pool_name.as_str()])
                .inc(),
            Diagnostic::SnapshotDump { .. } => self.snapshot_dumps.inc(),
        }
    }
}
