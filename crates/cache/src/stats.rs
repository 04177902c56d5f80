//! Read-only cache summary and hit/miss counters

use crate::store::EntryStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Summary returned by [`crate::TestResultCache::get_cache_stats`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Entries currently held
    pub total_entries: usize,
    /// Hits divided by lookups, 0.0 before the first lookup
    pub hit_rate: f64,
    /// Lookups that returned a result
    pub hits: u64,
    /// Lookups that did not
    pub misses: u64,
    /// Approximate in-memory size of the table in MiB
    pub size_mb: f64,
    /// Timestamp of the oldest entry
    pub oldest_entry: Option<DateTime<Utc>>,
    /// Timestamp of the newest entry
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Hit/miss counters kept beside the table; not persisted
#[derive(Debug, Default)]
pub struct HitCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HitCounters {
    /// Count a hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Zero both counters
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Current `(hits, misses)`
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// Summarize a store together with the lookup counters
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize(store: &EntryStore, counters: &HitCounters) -> CacheStats {
    let (hits, misses) = counters.snapshot();
    let lookups = hits + misses;
    let hit_rate = if lookups == 0 {
        0.0
    } else {
        hits as f64 / lookups as f64
    };

    let mut size_bytes = 0usize;
    let mut oldest: Option<DateTime<Utc>> = None;
    let mut newest: Option<DateTime<Utc>> = None;
    for (key, entry) in store.iter() {
        size_bytes += key.len() + serde_json::to_vec(entry).map_or(0, |v| v.len());
        oldest = Some(oldest.map_or(entry.timestamp, |t| t.min(entry.timestamp)));
        newest = Some(newest.map_or(entry.timestamp, |t| t.max(entry.timestamp)));
    }

    CacheStats {
        total_entries: store.len(),
        hit_rate,
        hits,
        misses,
        size_mb: size_bytes as f64 / BYTES_PER_MB,
        oldest_entry: oldest,
        newest_entry: newest,
    }
}
