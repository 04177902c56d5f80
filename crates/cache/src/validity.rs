//! Hit or miss decision for a stored entry

use crate::eviction::EvictionPolicy;
use crate::fingerprint::Fingerprint;
use crate::store::{CacheEntry, EntryStore};
use chrono::{DateTime, Utc};
use std::fmt;

/// Why a lookup did not produce a reusable result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    /// No entry under the key
    NotFound,
    /// Entry older than the maximum age
    Expired,
    /// Test configuration digest differs
    ConfigChanged,
    /// A fingerprinted file now has different content
    FileChanged {
        /// Caller path of the file
        path: String,
    },
    /// A fingerprinted file can no longer be fingerprinted
    FileRemoved {
        /// Caller path of the file
        path: String,
    },
    /// A file is fingerprintable now that was not when the entry was recorded
    FileAdded {
        /// Caller path of the file
        path: String,
    },
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no entry"),
            Self::Expired => write!(f, "entry expired"),
            Self::ConfigChanged => write!(f, "test configuration changed"),
            Self::FileChanged { path } => write!(f, "{path} changed"),
            Self::FileRemoved { path } => write!(f, "{path} no longer present"),
            Self::FileAdded { path } => write!(f, "{path} is new"),
        }
    }
}

/// Outcome of a validity check
#[derive(Debug, PartialEq)]
pub enum Validity<'a> {
    /// Entry is still valid
    Hit(&'a CacheEntry),
    /// Entry is absent or stale
    Miss(MissReason),
}

impl Validity<'_> {
    /// True for [`Validity::Hit`]
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

/// Decide whether the entry under `key` may be reused.
///
/// Checks run in order: presence, age, configuration, then files. This is a
/// pure decision; removing a stale entry is up to the caller.
#[must_use]
pub fn check<'a>(
    store: &'a EntryStore,
    policy: &EvictionPolicy,
    now: DateTime<Utc>,
    key: &str,
    config_hash: &str,
    current: &Fingerprint,
) -> Validity<'a> {
    let Some(entry) = store.get(key) else {
        return Validity::Miss(MissReason::NotFound);
    };
    if policy.is_expired(entry.timestamp, now) {
        return Validity::Miss(MissReason::Expired);
    }
    if entry.config_hash != config_hash {
        return Validity::Miss(MissReason::ConfigChanged);
    }
    if let Some(reason) = compare_files(entry, current) {
        return Validity::Miss(reason);
    }
    Validity::Hit(entry)
}

fn compare_files(entry: &CacheEntry, current: &Fingerprint) -> Option<MissReason> {
    for (path, stored) in &entry.file_hashes {
        match current.hashes.get(path) {
            Some(digest) if digest == stored => {}
            Some(_) => return Some(MissReason::FileChanged { path: path.clone() }),
            None => return Some(MissReason::FileRemoved { path: path.clone() }),
        }
    }
    current
        .hashes
        .keys()
        .find(|path| !entry.file_hashes.contains_key(*path))
        .map(|path| MissReason::FileAdded { path: path.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::entry;
    use std::collections::BTreeMap;

    fn fingerprint(pairs: &[(&str, &str)]) -> Fingerprint {
        Fingerprint {
            hashes: pairs
                .iter()
                .map(|(p, h)| ((*p).to_string(), (*h).to_string()))
                .collect::<BTreeMap<_, _>>(),
            skipped: vec![],
        }
    }

    fn store_with(key: &str, age_secs: i64) -> EntryStore {
        let mut store = EntryStore::default();
        store.put(key.into(), entry("svc-a", age_secs));
        store
    }

    #[test]
    fn hit_when_everything_matches() {
        let store = store_with("k", 0);
        let v = check(
            &store,
            &EvictionPolicy::default(),
            Utc::now(),
            "k",
            "cfg",
            &fingerprint(&[("src/a.ts", "aa")]),
        );
        assert!(v.is_hit());
    }

    #[test]
    fn miss_when_absent() {
        let store = EntryStore::default();
        let v = check(
            &store,
            &EvictionPolicy::default(),
            Utc::now(),
            "k",
            "cfg",
            &Fingerprint::default(),
        );
        assert_eq!(v, Validity::Miss(MissReason::NotFound));
    }

    #[test]
    fn expiry_checked_before_content() {
        let store = store_with("k", 2 * 24 * 3600);
        let v = check(
            &store,
            &EvictionPolicy::default(),
            Utc::now(),
            "k",
            "cfg",
            &fingerprint(&[("src/a.ts", "aa")]),
        );
        assert_eq!(v, Validity::Miss(MissReason::Expired));
    }

    #[test]
    fn config_mismatch() {
        let store = store_with("k", 0);
        let v = check(
            &store,
            &EvictionPolicy::default(),
            Utc::now(),
            "k",
            "other",
            &fingerprint(&[("src/a.ts", "aa")]),
        );
        assert_eq!(v, Validity::Miss(MissReason::ConfigChanged));
    }

    #[test]
    fn file_changed_removed_added() {
        let store = store_with("k", 0);
        let policy = EvictionPolicy::default();
        let now = Utc::now();

        let changed = check(&store, &policy, now, "k", "cfg", &fingerprint(&[("src/a.ts", "bb")]));
        assert_eq!(
            changed,
            Validity::Miss(MissReason::FileChanged {
                path: "src/a.ts".into()
            })
        );

        let removed = check(&store, &policy, now, "k", "cfg", &Fingerprint::default());
        assert_eq!(
            removed,
            Validity::Miss(MissReason::FileRemoved {
                path: "src/a.ts".into()
            })
        );

        let added = check(
            &store,
            &policy,
            now,
            "k",
            "cfg",
            &fingerprint(&[("src/a.ts", "aa"), ("src/new.ts", "cc")]),
        );
        assert_eq!(
            added,
            Validity::Miss(MissReason::FileAdded {
                path: "src/new.ts".into()
            })
        );
    }

    #[test]
    fn miss_reason_display() {
        assert_eq!(MissReason::Expired.to_string(), "entry expired");
        assert_eq!(
            MissReason::FileChanged {
                path: "src/a.ts".into()
            }
            .to_string(),
            "src/a.ts changed"
        );
    }
}
