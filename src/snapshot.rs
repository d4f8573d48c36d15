//! Construction of before/after memory usage snapshots.

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DiagnosticSink, PoolUsageRow};
use crate::error::SnapshotError;
use crate::pool::{PoolRegistryCache, PoolSource};
use crate::usage::{self, Phase, UsageSample};

/// Raw counters delivered for one collection event, one entry per pool in
/// the order of the pool registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCollection {
    pub index: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub initial_size: Vec<i64>,
    pub pre_used: Vec<i64>,
    pub pre_committed: Vec<i64>,
    pub pre_max: Vec<i64>,
    pub post_used: Vec<i64>,
    pub post_committed: Vec<i64>,
    pub post_max: Vec<i64>,
}

impl RawCollection {
    fn arrays(&self) -> [(&'static str, &[i64]); 7] {
        [
            ("initial_size", self.initial_size.as_slice()),
            ("pre_used", self.pre_used.as_slice()),
            ("pre_committed", self.pre_committed.as_slice()),
            ("pre_max", self.pre_max.as_slice()),
            ("post_used", self.post_used.as_slice()),
            ("post_committed", self.post_committed.as_slice()),
            ("post_max", self.post_max.as_slice()),
        ]
    }

    fn check_lengths(&self, expected: usize) -> Result<(), SnapshotError> {
        for (field, values) in self.arrays() {
            if values.len() != expected {
                return Err(SnapshotError::ArrayLengthMismatch {
                    field,
                    expected,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }

    fn before(&self, i: usize) -> UsageSample {
        UsageSample::new(
            self.initial_size[i],
            self.pre_used[i],
            self.pre_committed[i],
            self.pre_max[i],
        )
    }

    fn after(&self, i: usize) -> UsageSample {
        UsageSample::new(
            self.initial_size[i],
            self.post_used[i],
            self.post_committed[i],
            self.post_max[i],
        )
    }

    fn usage_rows(&self, names: &[String]) -> Vec<PoolUsageRow> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| PoolUsageRow {
                pool_name: name.clone(),
                init: self.initial_size[i],
                pre_used: self.pre_used[i],
                pre_committed: self.pre_committed[i],
                pre_max: self.pre_max[i],
                post_used: self.post_used[i],
                post_committed: self.post_committed[i],
                post_max: self.post_max[i],
            })
            .collect()
    }
}

/// Memory usage of every pool around one collection. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct GcSnapshot {
    index: i64,
    start_time: i64,
    end_time: i64,
    before: HashMap<String, UsageSample>,
    after: HashMap<String, UsageSample>,
}

impl GcSnapshot {
    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    /// Elapsed time of the collection in the unit of the time stamps.
    pub fn duration(&self) -> i64 {
        self.end_time.saturating_sub(self.start_time)
    }

    pub fn usage_before_gc(&self) -> &HashMap<String, UsageSample> {
        &self.before
    }

    pub fn usage_after_gc(&self) -> &HashMap<String, UsageSample> {
        &self.after
    }

    pub fn before(&self, pool: &str) -> Option<&UsageSample> {
        self.before.get(pool)
    }

    pub fn after(&self, pool: &str) -> Option<&UsageSample> {
        self.after.get(pool)
    }

    pub fn pool_count(&self) -> usize {
        self.before.len()
    }
}

/// Builds snapshots against a shared pool cache.
///
/// The builder holds no state of its own and can be used from any number
/// of threads at once.
pub struct SnapshotBuilder<'a> {
    cache: &'a PoolRegistryCache,
    pools: &'a dyn PoolSource,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(
        cache: &'a PoolRegistryCache,
        pools: &'a dyn PoolSource,
        sink: &'a dyn DiagnosticSink,
    ) -> Self {
        Self { cache, pools, sink }
    }

    /// Validates every pool of `raw` and packages the result.
    ///
    /// Invalid samples are reported and stored unchanged. Arrays that do
    /// not match the registered pool count are rejected before anything
    /// is read from them.
    pub fn build(&self, raw: &RawCollection) -> Result<GcSnapshot, SnapshotError> {
        self.cache.ensure_populated(self.pools, self.sink);
        let names = self.cache.pool_names().unwrap_or(&[]);
        let count = names.len();

        raw.check_lengths(count)?;

        let mut before = HashMap::with_capacity(count);
        let mut after = HashMap::with_capacity(count);

        for (i, name) in names.iter().enumerate() {
            let pre = raw.before(i);
            let post = raw.after(i);

            let pre_ok = usage::validate(raw.index, i, name, &pre, Phase::BeforeGc, self.sink);
            let post_ok = usage::validate(raw.index, i, name, &post, Phase::AfterGc, self.sink);

            if !(pre_ok && post_ok) {
                self.sink.emit(&Diagnostic::SnapshotDump {
                    collection_index: raw.index,
                    pools: raw.usage_rows(names),
                });
            }

            before.insert(name.clone(), pre);
            after.insert(name.clone(), post);
        }

        Ok(GcSnapshot {
            index: raw.index,
            start_time: raw.start_time,
            end_time: raw.end_time,
            before,
            after,
        })
    }
}
