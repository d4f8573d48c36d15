//! gcinfo-exporter library.
//!
//! Turns the raw per-pool counters reported for a garbage collection event
//! into a [`GcSnapshot`] of memory usage before and after the collection.
//! The ordered pool list is discovered once and cached in a
//! [`PoolRegistryCache`]; every sample is checked against the physical
//! invariants of memory accounting and anomalies are reported to a
//! [`DiagnosticSink`] without dropping the sample.

pub mod diagnostics;
pub mod error;
pub mod monitor;
pub mod pool;
pub mod snapshot;
pub mod source;
pub mod usage;

pub use diagnostics::{
    CollectingSink, Diagnostic, DiagnosticSink, FanoutSink, NullSink, PoolUsageRow, Severity,
    TracingSink,
};
pub use error::{SnapshotError, SourceError};
pub use monitor::GarbageCollectorMonitor;
pub use pool::{MemoryPool, PoolKind, PoolRegistryCache, PoolSource, StaticPoolSource};
pub use snapshot::{GcSnapshot, RawCollection, SnapshotBuilder};
pub use source::{CollectionSource, RecordedCollections};
pub use usage::{Phase, UsageSample, Violation};
