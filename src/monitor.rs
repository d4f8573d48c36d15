//! Per-collector view over the snapshot builder.

use std::sync::Arc;
use tracing::debug;

use crate::diagnostics::DiagnosticSink;
use crate::error::SnapshotError;
use crate::pool::{PoolRegistryCache, PoolSource};
use crate::snapshot::{GcSnapshot, SnapshotBuilder};
use crate::source::CollectionSource;

/// One garbage collector and the collaborators needed to describe its
/// most recent collection.
pub struct GarbageCollectorMonitor {
    name: String,
    id: i32,
    collections: Arc<dyn CollectionSource>,
    pools: Arc<dyn PoolSource>,
    sink: Arc<dyn DiagnosticSink>,
    cache: &'static PoolRegistryCache,
}

impl GarbageCollectorMonitor {
    /// Creates a monitor backed by the process-wide pool cache.
    pub fn new(
        name: impl Into<String>,
        id: i32,
        collections: Arc<dyn CollectionSource>,
        pools: Arc<dyn PoolSource>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            name: name.into(),
            id,
            collections,
            pools,
            sink,
            cache: PoolRegistryCache::global(),
        }
    }

    /// Uses `cache` instead of the process-wide one.
    pub fn with_cache(mut self, cache: &'static PoolRegistryCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// Snapshot of the most recent collection, or `None` if the collector
    /// has not run yet.
    pub fn last_gc_info(&self) -> Result<Option<GcSnapshot>, SnapshotError> {
        let Some(raw) = self.collections.fetch_last_collection(self.id)? else {
            debug!("Collector {} ({}) has no collection yet", self.name, self.id);
            return Ok(None);
        };

        let builder = SnapshotBuilder::new(self.cache, self.pools.as_ref(), self.sink.as_ref());
        builder.build(&raw).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::error::SourceError;
    use crate::pool::{MemoryPool, StaticPoolSource};
    use crate::snapshot::RawCollection;
    use crate::source::RecordedCollections;

    fn leaked_cache() -> &'static PoolRegistryCache {
        Box::leak(Box::new(PoolRegistryCache::new()))
    }

    fn monitor(recorded: RecordedCollections, id: i32) -> GarbageCollectorMonitor {
        let pools = StaticPoolSource::new(vec![
            MemoryPool::heap("nursery", 0),
            MemoryPool::heap("tenured", 1),
        ]);
        GarbageCollectorMonitor::new(
            "scavenge",
            id,
            Arc::new(recorded),
            Arc::new(pools),
            Arc::new(CollectingSink::new()),
        )
        .with_cache(leaked_cache())
    }

    #[test]
    fn test_last_gc_info_builds_latest() {
        let mut recorded = RecordedCollections::new();
        recorded.record(
            0,
            RawCollection {
                index: 4,
                start_time: 10,
                end_time: 14,
                initial_size: vec![0, 0],
                pre_used: vec![10, 20],
                pre_committed: vec![16, 32],
                pre_max: vec![-1, 64],
                post_used: vec![2, 20],
                post_committed: vec![16, 32],
                post_max: vec![-1, 64],
            },
        );

        let m = monitor(recorded, 0);
        let snapshot = m.last_gc_info().unwrap().unwrap();

        assert_eq!(m.name(), "scavenge");
        assert_eq!(snapshot.index(), 4);
        assert_eq!(snapshot.after("nursery").unwrap().used, 2);
    }

    #[test]
    fn test_no_collection_yet() {
        let mut recorded = RecordedCollections::new();
        recorded.register(1);
        assert!(monitor(recorded, 1).last_gc_info().unwrap().is_none());
    }

    #[test]
    fn test_source_failure_is_external_error() {
        let err = monitor(RecordedCollections::new(), 2)
            .last_gc_info()
            .unwrap_err();
        assert_eq!(err, SnapshotError::Source(SourceError::UnknownCollector(2)));
    }
}
