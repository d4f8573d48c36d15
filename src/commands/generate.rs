//! Event log format and the generate-testdata command.
//!
//! Generates synthetic collection events for testing.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use gcinfo_exporter::{MemoryPool, RawCollection, RecordedCollections};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const EVENT_LOG_VERSION: &str = "1.0";

/// One recorded collection and the collector that performed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub collector_id: i32,
    pub collector_name: String,
    pub collection: RawCollection,
}

/// Root structure for event log JSON files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    pub version: String,
    pub generated_at: String,
    pub pools: Vec<MemoryPool>,
    pub events: Vec<RecordedEvent>,
}

impl EventLog {
    /// Collector ids with their names, in order of first appearance.
    pub fn collectors(&self) -> Vec<(i32, String)> {
        let mut out: Vec<(i32, String)> = Vec::new();
        for e in &self.events {
            if !out.iter().any(|(id, _)| *id == e.collector_id) {
                out.push((e.collector_id, e.collector_name.clone()));
            }
        }
        out
    }

    pub fn recorded_collections(&self) -> RecordedCollections {
        let mut recorded = RecordedCollections::new();
        for e in &self.events {
            recorded.record(e.collector_id, e.collection.clone());
        }
        recorded
    }
}

/// Load an event log from a JSON file.
pub fn load_event_log(path: &Path) -> Result<EventLog> {
    debug!("Loading event log from: {}", path.display());

    if !path.exists() {
        bail!("Event log file not found: {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read event log {}", path.display()))?;
    let log: EventLog = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse event log JSON {}", path.display()))?;

    info!(
        "Loaded event log version {} ({} pools, {} events) generated at {}",
        log.version,
        log.pools.len(),
        log.events.len(),
        log.generated_at
    );

    Ok(log)
}

/// Pool layout of a generational heap: heap pools first, ids ascending.
fn default_pools() -> Vec<MemoryPool> {
    vec![
        MemoryPool::heap("nursery-allocate", 0),
        MemoryPool::heap("nursery-survivor", 1),
        MemoryPool::heap("tenured-LOA", 2),
        MemoryPool::heap("tenured-SOA", 3),
        MemoryPool::non_heap("class storage", 4),
        MemoryPool::non_heap("JIT code cache", 5),
        MemoryPool::non_heap("JIT data cache", 6),
        MemoryPool::non_heap("miscellaneous non-heap storage", 7),
    ]
}

/// Generates a synthetic event log file for testing purposes.
pub fn command_generate_testdata(output: PathBuf, events: usize, violation_rate: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&violation_rate) {
        bail!("violation rate must be between 0.0 and 1.0, got {violation_rate}");
    }

    debug!(
        "Generating event log: events={}, violation_rate={}, output={}",
        events,
        violation_rate,
        output.display()
    );

    let log = generate_event_log(&mut rand::thread_rng(), events, violation_rate);

    let json_content = serde_json::to_string_pretty(&log)?;
    fs::write(&output, &json_content)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "✅ Generated event log: {} events over {} pools in {}",
        log.events.len(),
        log.pools.len(),
        output.display()
    );

    Ok(())
}

pub fn generate_event_log(rng: &mut impl Rng, events: usize, violation_rate: f64) -> EventLog {
    let pools = default_pools();
    let collectors = [(0, "scavenge"), (1, "global")];

    let mut clock: i64 = rng.gen_range(1_000..5_000);
    let mut recorded = Vec::with_capacity(events);

    for index in 0..events {
        let (collector_id, collector_name) = collectors[if index % 8 == 7 { 1 } else { 0 }];
        let duration = rng.gen_range(1..40);
        let collection = generate_collection(rng, &pools, index as i64 + 1, clock, clock + duration, violation_rate);
        clock += duration + rng.gen_range(50..2_000);

        recorded.push(RecordedEvent {
            collector_id,
            collector_name: collector_name.to_string(),
            collection,
        });
    }

    EventLog {
        version: EVENT_LOG_VERSION.to_string(),
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        pools,
        events: recorded,
    }
}

/// Generates counters for all pools; with probability `violation_rate`
/// a pool's used value is pushed past its committed size.
fn generate_collection(
    rng: &mut impl Rng,
    pools: &[MemoryPool],
    index: i64,
    start_time: i64,
    end_time: i64,
    violation_rate: f64,
) -> RawCollection {
    let mut raw = RawCollection {
        index,
        start_time,
        end_time,
        ..Default::default()
    };

    for pool in pools {
        // committed: 1 MB - 512 MB for heap, 64 KB - 64 MB for non-heap
        let committed: i64 = if pool.is_heap() {
            rng.gen_range(1 << 20..512 << 20)
        } else {
            rng.gen_range(64 << 10..64 << 20)
        };
        let max: i64 = if rng.gen_bool(0.5) {
            -1
        } else {
            committed + rng.gen_range(0..committed)
        };
        let init: i64 = rng.gen_range(0..=committed);

        let mut pre_used = rng.gen_range(0..=committed);
        // a collection frees up to everything in the pool
        let mut post_used = rng.gen_range(0..=pre_used);

        if violation_rate > 0.0 && rng.gen_bool(violation_rate) {
            pre_used = committed + rng.gen_range(1..4096);
        }
        if violation_rate > 0.0 && rng.gen_bool(violation_rate) {
            post_used = committed + rng.gen_range(1..4096);
        }

        raw.initial_size.push(init);
        raw.pre_used.push(pre_used);
        raw.pre_committed.push(committed);
        raw.pre_max.push(max);
        raw.post_used.push(post_used);
        raw.post_committed.push(committed);
        raw.post_max.push(max);
    }

    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcinfo_exporter::UsageSample;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_log_is_consistent() {
        let mut rng = StdRng::seed_from_u64(7);
        let log = generate_event_log(&mut rng, 16, 0.0);

        assert_eq!(log.events.len(), 16);
        assert_eq!(
            log.collectors(),
            vec![(0, "scavenge".to_string()), (1, "global".to_string())]
        );

        for e in &log.events {
            let raw = &e.collection;
            assert_eq!(raw.pre_used.len(), log.pools.len());
            assert!(raw.end_time > raw.start_time);
            for i in 0..log.pools.len() {
                let before = UsageSample::new(raw.initial_size[i], raw.pre_used[i], raw.pre_committed[i], raw.pre_max[i]);
                let after = UsageSample::new(raw.initial_size[i], raw.post_used[i], raw.post_committed[i], raw.post_max[i]);
                assert!(before.is_well_formed(), "{before}");
                assert!(after.is_well_formed(), "{after}");
            }
        }
    }

    #[test]
    fn test_full_violation_rate_breaks_every_sample() {
        let mut rng = StdRng::seed_from_u64(11);
        let log = generate_event_log(&mut rng, 2, 1.0);
        let raw = &log.events[0].collection;
        assert!(raw
            .pre_used
            .iter()
            .zip(&raw.pre_committed)
            .all(|(used, committed)| used > committed));
    }

    #[test]
    fn test_event_log_json_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        let log = generate_event_log(&mut rng, 1, 0.0);
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["pools"][4]["kind"], "non_heap");
        assert_eq!(json["events"][0]["collection"]["index"], 1);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = load_event_log(Path::new("/nonexistent/events.json")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_generated_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        command_generate_testdata(path.clone(), 5, 0.0).unwrap();

        let log = load_event_log(&path).unwrap();
        assert_eq!(log.events.len(), 5);
        assert_eq!(log.pools, default_pools());
    }

    #[test]
    fn test_out_of_range_violation_rate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(command_generate_testdata(dir.path().join("e.json"), 1, 1.5).is_err());
    }
}
