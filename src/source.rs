//! Delivery of raw collection data from the collector side.

use ahash::AHashMap as HashMap;
use std::sync::Arc;

use crate::error::SourceError;
use crate::snapshot::RawCollection;

/// Supplies the counters of the most recent collection of a collector.
///
/// `Ok(None)` means the collector has not run yet; errors are reserved for
/// a source that cannot answer at all.
pub trait CollectionSource: Send + Sync {
    fn fetch_last_collection(&self, collector_id: i32) -> Result<Option<RawCollection>, SourceError>;
}

impl<S: CollectionSource + ?Sized> CollectionSource for Arc<S> {
    fn fetch_last_collection(&self, collector_id: i32) -> Result<Option<RawCollection>, SourceError> {
        (**self).fetch_last_collection(collector_id)
    }
}

/// Collections recorded ahead of time, keyed by collector id.
#[derive(Debug, Clone, Default)]
pub struct RecordedCollections {
    by_collector: HashMap<i32, Vec<RawCollection>>,
}

impl RecordedCollections {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a collector with no collections yet.
    pub fn register(&mut self, collector_id: i32) {
        self.by_collector.entry(collector_id).or_default();
    }

    /// Appends a collection; later records supersede earlier ones.
    pub fn record(&mut self, collector_id: i32, collection: RawCollection) {
        self.by_collector
            .entry(collector_id)
            .or_default()
            .push(collection);
    }

    pub fn collector_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.by_collector.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl CollectionSource for RecordedCollections {
    fn fetch_last_collection(&self, collector_id: i32) -> Result<Option<RawCollection>, SourceError> {
        self.by_collector
            .get(&collector_id)
            .map(|events| events.last().cloned())
            .ok_or(SourceError::UnknownCollector(collector_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(index: i64) -> RawCollection {
        RawCollection {
            index,
            ..Default::default()
        }
    }

    #[test]
    fn test_last_collection_wins() {
        let mut recorded = RecordedCollections::new();
        recorded.record(1, collection(1));
        recorded.record(1, collection(2));
        recorded.record(0, collection(9));

        assert_eq!(recorded.fetch_last_collection(1).unwrap().unwrap().index, 2);
        assert_eq!(recorded.collector_ids(), vec![0, 1]);
    }

    #[test]
    fn test_absent_and_unknown_are_distinct() {
        let mut recorded = RecordedCollections::new();
        recorded.register(3);

        assert_eq!(recorded.fetch_last_collection(3), Ok(None));
        assert_eq!(
            recorded.fetch_last_collection(4),
            Err(SourceError::UnknownCollector(4))
        );
    }
}
