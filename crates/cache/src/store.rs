//! In-memory entry table and its on-disk snapshot

use crate::eviction::EvictionPolicy;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Snapshot format version; bump on incompatible changes
pub const SNAPSHOT_VERSION: u32 = 1;

/// One remembered test outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Tested unit
    pub project_name: String,
    /// Digest of every fingerprinted file, keyed by the caller's path string
    pub file_hashes: BTreeMap<String, String>,
    /// Digest of the test configuration
    pub config_hash: String,
    /// When the result was recorded
    pub timestamp: DateTime<Utc>,
    /// Opaque test outcome, returned verbatim
    pub result: serde_json::Value,
}

/// On-disk snapshot of the whole table
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    entries: Vec<(String, CacheEntry)>,
}

/// Table of cache entries keyed by cache key
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: HashMap<String, CacheEntry>,
    policy: EvictionPolicy,
}

impl EntryStore {
    /// Empty store governed by `policy`
    #[must_use]
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
        }
    }

    /// Load a store from a snapshot file.
    ///
    /// Any failure yields an empty store; cache loss is never fatal.
    #[must_use]
    pub fn load(path: &Path, policy: EvictionPolicy) -> Self {
        let mut store = Self::new(policy);
        match read_snapshot(path) {
            Ok(entries) => {
                tracing::debug!(
                    path = %path.display(),
                    entries = entries.len(),
                    "Loaded test cache snapshot"
                );
                store.entries = entries.into_iter().collect();
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %path.display(), "No test cache snapshot yet");
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    "Discarding unreadable test cache snapshot: {e}"
                );
            }
        }
        store
    }

    /// Write the full table to `path`, replacing the file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut entries: Vec<(String, CacheEntry)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            entries,
        };
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| Error::serialization(format!("Failed to serialize snapshot: {e}")))?;
        write_atomic(path, &json)
    }

    /// Eviction policy in force
    #[must_use]
    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    /// Pure lookup; no validity checking
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Insert or overwrite, then enforce the size limit.
    ///
    /// Returns the number of entries evicted to make room.
    pub fn put(&mut self, key: String, entry: CacheEntry) -> usize {
        self.entries.insert(key, entry);
        let policy = self.policy.clone();
        policy.enforce_size(self)
    }

    /// Remove one entry
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    /// Remove every entry matching `predicate`, returning how many went
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&str, &CacheEntry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, v| !predicate(k, v));
        before - self.entries.len()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, entry)` pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter()
    }

    #[cfg(test)]
    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.entries.get_mut(key)
    }
}

fn read_snapshot(path: &Path) -> Result<Vec<(String, CacheEntry)>> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .map_err(|e| Error::serialization(format!("Failed to parse snapshot: {e}")))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(Error::SnapshotVersion {
            expected: SNAPSHOT_VERSION,
            found: snapshot.version,
        });
    }
    Ok(snapshot.entries)
}

/// Write to a sibling temp file, sync, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
    }

    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| Error::io(e, &temp_path, "create"))?;
    file.write_all(bytes)
        .map_err(|e| Error::io(e, &temp_path, "write_all"))?;
    file.sync_all()
        .map_err(|e| Error::io(e, &temp_path, "sync_all"))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::io(e, path, "rename")
    })
}
