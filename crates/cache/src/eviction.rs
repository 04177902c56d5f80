//! Age-based and size-based entry removal

use crate::store::EntryStore;
use chrono::{DateTime, Duration, Utc};

/// Limits applied to the entry table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Entries older than this are expired
    pub max_age: Duration,
    /// Upper bound on the number of entries
    pub max_entries: usize,
    /// Extra entries removed beyond the minimum on overflow, so the next few
    /// inserts do not each trigger a sweep. Capped at half of `max_entries`.
    pub margin: usize,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::hours(24),
            max_entries: 100,
            margin: 10,
        }
    }
}

impl EvictionPolicy {
    /// Whether an entry recorded at `timestamp` is too old at `now`
    #[must_use]
    pub fn is_expired(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - timestamp > self.max_age
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self, store: &mut EntryStore, now: DateTime<Utc>) -> usize {
        let removed = store.remove_where(|_, entry| self.is_expired(entry.timestamp, now));
        if removed > 0 {
            tracing::debug!(removed, "Removed expired test cache entries");
        }
        removed
    }

    /// Size the table down to `max_entries - margin` once it exceeds
    /// `max_entries`, oldest first. Returns how many were removed.
    pub fn enforce_size(&self, store: &mut EntryStore) -> usize {
        if store.len() <= self.max_entries {
            return 0;
        }
        let margin = self.margin.min(self.max_entries / 2);
        let target = self.max_entries - margin;
        let excess = store.len() - target;

        let mut by_age: Vec<(DateTime<Utc>, String)> = store
            .iter()
            .map(|(key, entry)| (entry.timestamp, key.clone()))
            .collect();
        by_age.sort();

        for (_, key) in by_age.into_iter().take(excess) {
            store.remove(&key);
            tracing::debug!(key = %key, "Evicted test cache entry to reduce table size");
        }
        excess
    }
}
