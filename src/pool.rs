//! Memory pool identity and the process-wide pool registry cache.
//!
//! The pool set is assumed static once the runtime is up, so the ordered
//! pool list is queried once and reused by every snapshot built afterwards.

use ahash::AHashMap as HashMap;
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::diagnostics::{Diagnostic, DiagnosticSink};

/// Heap or non-heap classification of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Heap,
    NonHeap,
}

/// Static identity of a memory pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryPool {
    pub name: String,
    pub id: i32,
    pub kind: PoolKind,
}

impl MemoryPool {
    pub fn heap(name: impl Into<String>, id: i32) -> Self {
        Self {
            name: name.into(),
            id,
            kind: PoolKind::Heap,
        }
    }

    pub fn non_heap(name: impl Into<String>, id: i32) -> Self {
        Self {
            name: name.into(),
            id,
            kind: PoolKind::NonHeap,
        }
    }

    pub fn is_heap(&self) -> bool {
        self.kind == PoolKind::Heap
    }
}

/// Enumerates the memory pools of the runtime, heap and non-heap alike.
pub trait PoolSource: Send + Sync {
    fn memory_pools(&self) -> Vec<MemoryPool>;
}

impl<S: PoolSource + ?Sized> PoolSource for Arc<S> {
    fn memory_pools(&self) -> Vec<MemoryPool> {
        (**self).memory_pools()
    }
}

/// A fixed pool list, e.g. one loaded from a recorded event log.
#[derive(Debug, Clone, Default)]
pub struct StaticPoolSource {
    pools: Vec<MemoryPool>,
}

impl StaticPoolSource {
    pub fn new(pools: Vec<MemoryPool>) -> Self {
        Self { pools }
    }
}

impl PoolSource for StaticPoolSource {
    fn memory_pools(&self) -> Vec<MemoryPool> {
        self.pools.clone()
    }
}

#[derive(Debug)]
struct PoolTable {
    pools: Vec<MemoryPool>,
    names: Vec<String>,
}

/// Outcome of a failed population attempt; never stored in the cell.
struct EmptyRegistry;

static GLOBAL_CACHE: Lazy<PoolRegistryCache> = Lazy::new(PoolRegistryCache::new);

/// Lazily populated, ordered list of memory pools.
#[derive(Debug, Default)]
pub struct PoolRegistryCache {
    table: OnceCell<PoolTable>,
}

impl PoolRegistryCache {
    pub fn new() -> Self {
        Self {
            table: OnceCell::new(),
        }
    }

    /// The cache shared by the whole process.
    pub fn global() -> &'static PoolRegistryCache {
        &GLOBAL_CACHE
    }

    /// Returns the cached pools, querying `source` on first use.
    ///
    /// Concurrent first callers block until one of them has populated the
    /// cache; the source is queried exactly once on success. An empty
    /// result is not cached: an empty slice is returned and the next call
    /// queries the source again.
    pub fn ensure_populated(
        &self,
        source: &dyn PoolSource,
        sink: &dyn DiagnosticSink,
    ) -> &[MemoryPool] {
        let populated = self.table.get_or_try_init(|| {
            let pools = source.memory_pools();
            if pools.is_empty() {
                warn!("Memory pool registry returned no pools, cache left unpopulated");
                return Err(EmptyRegistry);
            }
            check_pool_order(&pools, sink);
            check_duplicate_names(&pools, sink);
            let names = pools.iter().map(|p| p.name.clone()).collect();
            debug!("Memory pool cache populated with {} pools", pools.len());
            Ok(PoolTable { pools, names })
        });

        match populated {
            Ok(table) => &table.pools,
            Err(EmptyRegistry) => &[],
        }
    }

    /// Pool names in registry order, or `None` before population.
    pub fn pool_names(&self) -> Option<&[String]> {
        self.table.get().map(|t| t.names.as_slice())
    }

    pub fn pools(&self) -> Option<&[MemoryPool]> {
        self.table.get().map(|t| t.pools.as_slice())
    }

    pub fn is_populated(&self) -> bool {
        self.table.get().is_some()
    }
}

/// Pools are expected heap-first, then non-heap, with non-decreasing ids
/// inside each group. Anything else is reported, never corrected.
fn check_pool_order(pools: &[MemoryPool], sink: &dyn DiagnosticSink) {
    let mut previous_id = 0;
    let mut non_heap = false;

    for (position, pool) in pools.iter().enumerate() {
        debug!(
            "Memory pool order: position={}, id={}, name={}",
            position, pool.id, pool.name
        );

        if !pool.is_heap() && !non_heap {
            non_heap = true;
        } else if pool.id < previous_id || (pool.is_heap() && non_heap) {
            sink.emit(&Diagnostic::PoolOrderViolation {
                position,
                pool_name: pool.name.clone(),
                current_id: pool.id,
                previous_id,
            });
        }
        previous_id = pool.id;
    }
}

/// Snapshot maps are keyed by name, so a repeated name loses samples.
fn check_duplicate_names(pools: &[MemoryPool], sink: &dyn DiagnosticSink) {
    let mut first_seen: HashMap<&str, usize> = HashMap::with_capacity(pools.len());

    for (position, pool) in pools.iter().enumerate() {
        if let Some(&first_position) = first_seen.get(pool.name.as_str()) {
            sink.emit(&Diagnostic::DuplicatePoolName {
                position,
                first_position,
                pool_name: pool.name.clone(),
            });
        } else {
            first_seen.insert(&pool.name, position);
        }
    }
}
