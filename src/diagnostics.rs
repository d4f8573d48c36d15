//! Structured diagnostics and the sinks that consume them.
//!
//! The snapshot code never prints. Everything it has to say about
//! anomalous input is a [`Diagnostic`] handed to a [`DiagnosticSink`].

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

use crate::usage::{Phase, UsageSample, Violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Raw values of one pool for both phases of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolUsageRow {
    pub pool_name: String,
    pub init: i64,
    pub pre_used: i64,
    pub pre_committed: i64,
    pub pre_max: i64,
    pub post_used: i64,
    pub post_committed: i64,
    pub post_max: i64,
}

impl fmt::Display for PoolUsageRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "poolName={}, init={}, preUsed={}, preCommitted={}, preMax={}, postUsed={}, postCommitted={}, postMax={}",
            self.pool_name,
            self.init,
            self.pre_used,
            self.pre_committed,
            self.pre_max,
            self.post_used,
            self.post_committed,
            self.post_max
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Diagnostic {
    /// Pools were not enumerated heap-first with non-decreasing ids.
    PoolOrderViolation {
        position: usize,
        pool_name: String,
        current_id: i32,
        previous_id: i32,
    },
    /// Two pools share a name; only the later one is kept in snapshot maps.
    DuplicatePoolName {
        position: usize,
        first_position: usize,
        pool_name: String,
    },
    /// A sample broke at least one usage invariant.
    UsageViolation {
        collection_index: i64,
        pool_index: usize,
        pool_name: String,
        phase: Phase,
        sample: UsageSample,
        violations: Vec<Violation>,
    },
    /// Raw values of every pool for a collection with an invalid sample.
    SnapshotDump {
        collection_index: i64,
        pools: Vec<PoolUsageRow>,
    },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::PoolOrderViolation { .. } => Severity::Warning,
            Diagnostic::DuplicatePoolName { .. }
            | Diagnostic::UsageViolation { .. }
            | Diagnostic::SnapshotDump { .. } => Severity::Error,
        }
    }

    /// Short machine-friendly name, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::PoolOrderViolation { .. } => "pool_order",
            Diagnostic::DuplicatePoolName { .. } => "duplicate_pool",
            Diagnostic::UsageViolation { .. } => "usage",
            Diagnostic::SnapshotDump { .. } => "snapshot_dump",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::PoolOrderViolation {
                position,
                pool_name,
                current_id,
                previous_id,
            } => write!(
                f,
                "memory pool order error at position {position} ({pool_name}): currentID={current_id}, previousID={previous_id}"
            ),
            Diagnostic::DuplicatePoolName {
                position,
                first_position,
                pool_name,
            } => write!(
                f,
                "memory pool name {pool_name} at position {position} repeats position {first_position}"
            ),
            Diagnostic::UsageViolation {
                collection_index,
                pool_index,
                pool_name,
                phase,
                sample,
                violations,
            } => {
                write!(
                    f,
                    "memory usage {phase} error: index={collection_index}, pool={pool_index} ({pool_name}), {sample}: "
                )?;
                for (i, v) in violations.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
            Diagnostic::SnapshotDump {
                collection_index,
                pools,
            } => {
                write!(f, "memory usage dump for index={collection_index}:")?;
                for (i, row) in pools.iter().enumerate() {
                    write!(f, "\n  MemoryUsage{i}: {row}")?;
                }
                Ok(())
            }
        }
    }
}

/// Receiver of diagnostics. Implementations must tolerate concurrent calls.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: &Diagnostic);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Arc<S> {
    fn emit(&self, diagnostic: &Diagnostic) {
        (**self).emit(diagnostic)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _diagnostic: &Diagnostic) {}
}

/// Forwards diagnostics to the `tracing` subscriber.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    include_dumps: bool,
}

impl TracingSink {
    pub fn new() -> Self {
        Self {
            include_dumps: true,
        }
    }

    /// Full snapshot dumps are large; they can be left out of the log.
    pub fn with_dumps(mut self, include_dumps: bool) -> Self {
        self.include_dumps = include_dumps;
        self
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::PoolOrderViolation {
                position,
                pool_name,
                current_id,
                previous_id,
            } => warn!(
                position,
                pool = %pool_name,
                current_id,
                previous_id,
                "Memory pool order error"
            ),
            Diagnostic::DuplicatePoolName {
                position,
                first_position,
                pool_name,
            } => error!(
                position,
                first_position,
                pool = %pool_name,
                "Duplicate memory pool name"
            ),
            Diagnostic::UsageViolation {
                collection_index,
                pool_index,
                pool_name,
                phase,
                sample,
                ..
            } => error!(
                index = collection_index,
                pool_index,
                pool = %pool_name,
                phase = %phase,
                init = sample.init,
                used = sample.used,
                committed = sample.committed,
                max = sample.max,
                "{}",
                diagnostic
            ),
            Diagnostic::SnapshotDump { collection_index, .. } => {
                if self.include_dumps {
                    error!(index = collection_index, "{}", diagnostic);
                }
            }
        }
    }
}

/// Keeps diagnostics in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    inner: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Default::default()
    }

    /// Copy of everything recorded so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self.inner.lock() {
            Ok(d) => d.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drains the recorded diagnostics.
    pub fn take(&self) -> Vec<Diagnostic> {
        match self.inner.lock() {
            Ok(mut d) => std::mem::take(&mut *d),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        if let Ok(mut d) = self.inner.lock() {
            d.push(diagnostic.clone());
        }
    }
}

/// Sends each diagnostic to every inner sink, in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn DiagnosticSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl DiagnosticSink for FanoutSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        for sink in &self.sinks {
            sink.emit(diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_violation() -> Diagnostic {
        Diagnostic::PoolOrderViolation {
            position: 1,
            pool_name: "heap-young".into(),
            current_id: 0,
            previous_id: 2,
        }
    }

    #[test]
    fn test_severity_and_kind() {
        assert_eq!(order_violation().severity(), Severity::Warning);
        assert_eq!(order_violation().kind(), "pool_order");

        let dump = Diagnostic::SnapshotDump {
            collection_index: 3,
            pools: Vec::new(),
        };
        assert_eq!(dump.severity(), Severity::Error);
        assert_eq!(dump.kind(), "snapshot_dump");
    }

    #[test]
    fn test_usage_violation_display_lists_every_clause() {
        let d = Diagnostic::UsageViolation {
            collection_index: 9,
            pool_index: 2,
            pool_name: "metaspace".into(),
            phase: Phase::AfterGc,
            sample: UsageSample::new(0, -1, 70, 60),
            violations: vec![Violation::NegativeUsed, Violation::CommittedExceedsMax],
        };
        assert_eq!(
            d.to_string(),
            "memory usage AfterGc error: index=9, pool=2 (metaspace), init=0, used=-1, committed=70, max=60: used is negative; committed is greater than max"
        );
    }

    #[test]
    fn test_dump_display_has_one_line_per_pool() {
        let row = |name: &str| PoolUsageRow {
            pool_name: name.into(),
            init: 0,
            pre_used: 1,
            pre_committed: 2,
            pre_max: -1,
            post_used: 1,
            post_committed: 2,
            post_max: -1,
        };
        let d = Diagnostic::SnapshotDump {
            collection_index: 5,
            pools: vec![row("a"), row("b")],
        };
        let text = d.to_string();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("MemoryUsage1: poolName=b, init=0, preUsed=1"));
    }

    #[test]
    fn test_fanout_reaches_all_sinks() {
        let a = Arc::new(CollectingSink::new());
        let b = Arc::new(CollectingSink::new());
        let fanout = FanoutSink::new().with(a.clone()).with(b.clone());

        fanout.emit(&order_violation());

        assert_eq!(a.len(), 1);
        assert_eq!(b.diagnostics(), vec![order_violation()]);
    }

    /// Captures formatted log output of everything emitted inside `f`.
    fn captured_log(f: impl FnOnce()) -> String {
        #[derive(Clone, Default)]
        struct Buffer(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Buffer {
            fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(bytes);
                Ok(bytes.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn usage_violation() -> Diagnostic {
        Diagnostic::UsageViolation {
            collection_index: 4,
            pool_index: 0,
            pool_name: "tenured".into(),
            phase: Phase::BeforeGc,
            sample: UsageSample::new(0, 9, 8, -1),
            violations: vec![Violation::UsedExceedsCommitted],
        }
    }

    fn dump() -> Diagnostic {
        Diagnostic::SnapshotDump {
            collection_index: 4,
            pools: Vec::new(),
        }
    }

    #[test]
    fn test_tracing_sink_without_dumps_still_logs_violations() {
        let sink = TracingSink::new().with_dumps(false);
        let log = captured_log(|| {
            sink.emit(&usage_violation());
            sink.emit(&dump());
        });

        assert!(log.contains("memory usage BeforeGc error: index=4, pool=0 (tenured)"));
        assert!(log.contains("ERROR"));
        assert!(!log.contains("memory usage dump"));
    }

    #[test]
    fn test_tracing_sink_logs_dumps_by_default() {
        let sink = TracingSink::new();
        let log = captured_log(|| {
            sink.emit(&dump());
            sink.emit(&order_violation());
        });

        assert!(log.contains("memory usage dump for index=4"));
        assert!(log.contains("WARN"));
        assert!(log.contains("Memory pool order error"));
    }

    #[test]
    fn test_duplicate_name_is_an_error() {
        let d = Diagnostic::DuplicatePoolName {
            position: 3,
            first_position: 1,
            pool_name: "tenured".into(),
        };
        assert_eq!(d.severity(), Severity::Error);
        assert_eq!(
            d.to_string(),
            "memory pool name tenured at position 3 repeats position 1"
        );
    }

    #[test]
    fn test_collecting_sink_take_drains() {
        let sink = CollectingSink::new();
        sink.emit(&order_violation());
        assert_eq!(sink.take().len(), 1);
        assert!(sink.is_empty());
    }
}
