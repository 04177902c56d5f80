//! The test-result cache facade
//!
//! [`TestResultCache`] is what a test runner talks to. It ties the entry
//! store, fingerprinting, validity checking and eviction together, and it
//! never lets a cache failure reach the caller: problems turn into misses,
//! an empty table, or a warning in the log.

use crate::eviction::EvictionPolicy;
use crate::fingerprint::{fingerprint_files, has_fingerprintable_file};
use crate::key::{cache_key, config_hash};
use crate::settings::CacheSettings;
use crate::stats::{CacheStats, HitCounters, summarize};
use crate::store::{CacheEntry, EntryStore};
use crate::validity::{MissReason, Validity, check};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Test-result cache for one workspace.
///
/// All methods take `&self`; the entry table sits behind a single mutex so
/// an instance can be shared between concurrent test runs.
#[derive(Debug)]
pub struct TestResultCache {
    workspace_root: PathBuf,
    snapshot_path: Option<PathBuf>,
    policy: EvictionPolicy,
    store: Mutex<EntryStore>,
    counters: HitCounters,
    dirty: AtomicBool,
}

impl TestResultCache {
    /// Open the cache for a workspace, restoring its snapshot.
    ///
    /// Expired entries are dropped and the table is trimmed to the configured
    /// size before first use. If no snapshot location can be determined the
    /// cache works in memory only.
    #[must_use]
    pub fn new(settings: &CacheSettings) -> Self {
        let policy = settings.eviction_policy();
        let snapshot_path = match settings.snapshot_path() {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Test cache will not be persisted: {e}");
                None
            }
        };

        let mut store = snapshot_path.as_deref().map_or_else(
            || EntryStore::new(policy.clone()),
            |path| EntryStore::load(path, policy.clone()),
        );
        let expired = policy.sweep_expired(&mut store, Utc::now());
        let evicted = policy.enforce_size(&mut store);

        let cache = Self {
            workspace_root: settings.workspace_root.clone(),
            snapshot_path,
            policy,
            store: Mutex::new(store),
            counters: HitCounters::default(),
            dirty: AtomicBool::new(false),
        };
        if expired + evicted > 0 {
            cache.persist(&cache.lock());
        }
        cache
    }

    /// Root that relative file paths resolve against
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Snapshot file, if the cache is persisted
    #[must_use]
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Previously recorded result as raw JSON, if still valid.
    ///
    /// Stale entries are removed on the spot.
    pub fn get_cached_value<S, C>(
        &self,
        project_name: &str,
        affected_files: &[S],
        test_config: &C,
    ) -> Option<serde_json::Value>
    where
        S: AsRef<str>,
        C: Serialize + ?Sized,
    {
        let value = self.lookup(project_name, affected_files, test_config);
        self.count(value.is_some());
        value
    }

    /// Previously recorded result, if still valid, decoded as `R`.
    ///
    /// A payload that does not decode as `R` counts as a miss.
    pub fn get_cached_result<R, S, C>(
        &self,
        project_name: &str,
        affected_files: &[S],
        test_config: &C,
    ) -> Option<R>
    where
        R: DeserializeOwned,
        S: AsRef<str>,
        C: Serialize + ?Sized,
    {
        let decoded = self
            .lookup(project_name, affected_files, test_config)
            .and_then(|value| match serde_json::from_value(value) {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!(project = %project_name, "Cached test result has unexpected shape: {e}");
                    None
                }
            });
        self.count(decoded.is_some());
        decoded
    }

    fn lookup<S, C>(
        &self,
        project_name: &str,
        affected_files: &[S],
        test_config: &C,
    ) -> Option<serde_json::Value>
    where
        S: AsRef<str>,
        C: Serialize + ?Sized,
    {
        let key = cache_key(project_name, affected_files);
        let config_digest = match config_hash(test_config) {
            Ok(digest) => digest,
            Err(e) => {
                tracing::warn!(project = %project_name, "Cannot digest test config: {e}");
                return None;
            }
        };
        let current = fingerprint_files(&self.workspace_root, affected_files);

        let mut store = self.lock();
        let reason = match check(
            &store,
            &self.policy,
            Utc::now(),
            &key,
            &config_digest,
            &current,
        ) {
            Validity::Hit(entry) => {
                tracing::debug!(project = %project_name, key = %key, "Test cache hit");
                return Some(entry.result.clone());
            }
            Validity::Miss(reason) => reason,
        };

        if reason != MissReason::NotFound {
            store.remove(&key);
            self.persist(&store);
        }
        tracing::debug!(
            project = %project_name,
            key = %key,
            reason = %reason,
            "Test cache miss"
        );
        None
    }

    fn count(&self, hit: bool) {
        if hit {
            self.counters.record_hit();
        } else {
            self.counters.record_miss();
        }
    }

    /// Record the result of a real test run.
    ///
    /// Skipped when none of the files can be fingerprinted. Persistence
    /// failures are logged, never returned.
    pub fn cache_result<S, C, R>(
        &self,
        project_name: &str,
        affected_files: &[S],
        test_config: &C,
        result: &R,
    ) where
        S: AsRef<str>,
        C: Serialize + ?Sized,
        R: Serialize + ?Sized,
    {
        let config_digest = match config_hash(test_config) {
            Ok(digest) => digest,
            Err(e) => {
                tracing::warn!(project = %project_name, "Not caching, cannot digest test config: {e}");
                return;
            }
        };
        let payload = match serde_json::to_value(result) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(project = %project_name, "Not caching, cannot encode test result: {e}");
                return;
            }
        };

        let fingerprint = fingerprint_files(&self.workspace_root, affected_files);
        if fingerprint.is_empty() {
            tracing::debug!(
                project = %project_name,
                skipped = fingerprint.skipped.len(),
                "Not caching, no fingerprintable files"
            );
            return;
        }

        let key = cache_key(project_name, affected_files);
        let now = Utc::now();
        let entry = CacheEntry {
            project_name: project_name.to_string(),
            file_hashes: fingerprint.hashes,
            config_hash: config_digest,
            timestamp: now,
            result: payload,
        };

        let mut store = self.lock();
        self.policy.sweep_expired(&mut store, now);
        let evicted = store.put(key.clone(), entry);
        self.persist(&store);
        tracing::debug!(
            project = %project_name,
            key = %key,
            evicted,
            "Cached test result"
        );
    }

    /// Drop every entry recorded for `project_name`
    pub fn invalidate_project(&self, project_name: &str) -> usize {
        let mut store = self.lock();
        let removed = store.remove_where(|_, entry| entry.project_name == project_name);
        if removed > 0 {
            self.persist(&store);
        }
        tracing::info!(project = %project_name, removed, "Invalidated test cache entries");
        removed
    }

    /// Drop every entry and persist immediately
    pub fn clear_cache(&self) {
        let mut store = self.lock();
        let removed = store.len();
        store.clear();
        self.persist(&store);
        tracing::info!(removed, "Cleared test cache");
    }

    /// Remove expired entries now instead of waiting for the next write
    pub fn prune(&self) -> usize {
        let mut store = self.lock();
        let removed = self.policy.sweep_expired(&mut store, Utc::now());
        if removed > 0 {
            self.persist(&store);
        }
        removed
    }

    /// Summary of the table and lookup counters
    #[must_use]
    pub fn get_cache_stats(&self) -> CacheStats {
        summarize(&self.lock(), &self.counters)
    }

    /// Zero the hit/miss counters
    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    /// Whether `cache_result` with these arguments would record anything.
    ///
    /// True iff the config can be digested and at least one entry of the
    /// list is an existing regular file. Nothing is read or written.
    pub fn would_be_cached<S, C>(
        &self,
        _project_name: &str,
        affected_files: &[S],
        test_config: &C,
    ) -> bool
    where
        S: AsRef<str>,
        C: Serialize + ?Sized,
    {
        config_hash(test_config).is_ok()
            && has_fingerprintable_file(&self.workspace_root, affected_files)
    }

    /// Write the snapshot if an earlier save failed
    pub fn flush(&self) {
        if self.dirty.load(Ordering::Acquire) {
            self.persist(&self.lock());
        }
    }

    /// Flush pending persistence and release the cache
    pub fn dispose(self) {
        self.flush();
    }

    fn lock(&self) -> MutexGuard<'_, EntryStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, store: &EntryStore) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        match store.save(path) {
            Ok(()) => self.dirty.store(false, Ordering::Release),
            Err(e) => {
                self.dirty.store(true, Ordering::Release);
                tracing::warn!(
                    path = %path.display(),
                    "Failed to save test cache snapshot: {e}"
                );
            }
        }
    }
}

impl Drop for TestResultCache {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::TestConfig;
    use crate::result::TestRunResult;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        workspace: TempDir,
        cache_dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let workspace = TempDir::new().unwrap();
            fs::create_dir_all(workspace.path().join("src")).unwrap();
            fs::write(workspace.path().join("src/a.ts"), "export const a = 1;").unwrap();
            fs::write(workspace.path().join("src/b.ts"), "export const b = 2;").unwrap();
            Self {
                workspace,
                cache_dir: TempDir::new().unwrap(),
            }
        }

        fn settings(&self) -> CacheSettings {
            CacheSettings::new(self.workspace.path())
                .with_snapshot_path(self.cache_dir.path().join("snapshot.json"))
        }

        fn open(&self) -> TestResultCache {
            TestResultCache::new(&self.settings())
        }

        fn write(&self, rel: &str, content: &str) {
            fs::write(self.workspace.path().join(rel), content).unwrap();
        }
    }

    fn passing() -> TestRunResult {
        TestRunResult {
            passed: 5,
            ..TestRunResult::default()
        }
    }

    #[test]
    fn round_trip_hit() {
        let fx = Fixture::new();
        let cache = fx.open();
        let cfg = TestConfig::new("test");
        cache.cache_result("svc-a", &["src/a.ts"], &cfg, &passing());

        let hit: Option<TestRunResult> = cache.get_cached_result("svc-a", &["src/a.ts"], &cfg);
        assert_eq!(hit, Some(passing()));
        assert_eq!(cache.get_cache_stats().hits, 1);
    }

    #[test]
    fn expired_entry_is_a_miss_and_removed() {
        let fx = Fixture::new();
        let cache = fx.open();
        let cfg = TestConfig::new("test");
        cache.cache_result("svc-a", &["src/a.ts"], &cfg, &passing());

        let key = cache_key("svc-a", &["src/a.ts"]);
        cache.lock().get_mut(&key).unwrap().timestamp = Utc::now() - chrono::Duration::hours(25);

        assert!(cache.get_cached_value("svc-a", &["src/a.ts"], &cfg).is_none());
        assert!(cache.lock().get(&key).is_none());
    }

    #[test]
    fn file_change_removes_entry() {
        let fx = Fixture::new();
        let cache = fx.open();
        let cfg = TestConfig::new("test");
        cache.cache_result("svc-a", &["src/a.ts", "src/b.ts"], &cfg, &passing());
        fx.write("src/b.ts", "export const b = 3;");

        assert!(cache.get_cached_value("svc-a", &["src/a.ts", "src/b.ts"], &cfg).is_none());
        assert_eq!(cache.get_cache_stats().total_entries, 0);
    }

    #[test]
    fn new_file_appearing_is_a_miss() {
        let fx = Fixture::new();
        let cache = fx.open();
        let cfg = TestConfig::new("test");
        let files = ["src/a.ts", "src/c.ts"];
        cache.cache_result("svc-a", &files, &cfg, &passing());
        assert!(cache.get_cached_value("svc-a", &files, &cfg).is_some());

        fx.write("src/c.ts", "export const c = 1;");
        assert!(cache.get_cached_value("svc-a", &files, &cfg).is_none());
    }

    #[test]
    fn deleted_file_is_a_miss() {
        let fx = Fixture::new();
        let cache = fx.open();
        let cfg = TestConfig::new("test");
        let files = ["src/a.ts", "src/b.ts"];
        cache.cache_result("svc-a", &files, &cfg, &passing());
        fs::remove_file(fx.workspace.path().join("src/b.ts")).unwrap();
        assert!(cache.get_cached_value("svc-a", &files, &cfg).is_none());
    }

    #[test]
    fn nothing_fingerprintable_is_not_cached() {
        let fx = Fixture::new();
        let cache = fx.open();
        let cfg = TestConfig::new("test");
        assert!(!cache.would_be_cached("svc-a", &["**/*.ts", "src/missing.ts"], &cfg));
        cache.cache_result("svc-a", &["**/*.ts", "src/missing.ts"], &cfg, &passing());
        assert_eq!(cache.get_cache_stats().total_entries, 0);
        assert!(!fx.cache_dir.path().join("snapshot.json").exists());
    }

    #[test]
    fn would_be_cached_does_not_write() {
        let fx = Fixture::new();
        let cache = fx.open();
        let cfg = TestConfig::new("test");
        assert!(cache.would_be_cached("svc-a", &["**/*.ts", "src/a.ts"], &cfg));
        assert_eq!(cache.get_cache_stats().total_entries, 0);
    }

    #[test]
    fn would_be_cached_agrees_with_cache_result() {
        let fx = Fixture::new();
        let cache = fx.open();
        let cfg = TestConfig::new("test");
        let cases: [(&str, &[&str]); 4] = [
            ("", &["src/a.ts"]),
            ("svc-a", &["src/a.ts", "**/*.ts"]),
            ("svc-b", &["src/missing.ts"]),
            ("", &["src"]),
        ];
        for (project, files) in cases {
            let predicted = cache.would_be_cached(project, files, &cfg);
            let before = cache.get_cache_stats().total_entries;
            cache.cache_result(project, files, &cfg, &1);
            let recorded = cache.get_cache_stats().total_entries > before;
            assert_eq!(predicted, recorded, "project {project:?}, files {files:?}");
        }
    }

    #[test]
    fn reopen_with_lower_limit_trims_table() {
        let fx = Fixture::new();
        let cfg = TestConfig::new("test");
        {
            let cache = fx.open();
            for i in 0..10 {
                cache.cache_result(&format!("p{i}"), &["src/a.ts"], &cfg, &i);
            }
            assert_eq!(cache.get_cache_stats().total_entries, 10);
        }

        let settings = fx.settings().with_max_entries(3).with_eviction_margin(0);
        let cache = TestResultCache::new(&settings);
        assert_eq!(cache.get_cache_stats().total_entries, 3);
        drop(cache);

        // The trimmed table was persisted
        let reopened = TestResultCache::new(&fx.settings());
        assert_eq!(reopened.get_cache_stats().total_entries, 3);
    }

    #[test]
    fn undecodable_payload_counts_as_miss() {
        let fx = Fixture::new();
        let cache = fx.open();
        let cfg = TestConfig::new("test");
        cache.cache_result("svc-a", &["src/a.ts"], &cfg, &"just a string");

        let typed: Option<TestRunResult> = cache.get_cached_result("svc-a", &["src/a.ts"], &cfg);
        assert!(typed.is_none());
        let stats = cache.get_cache_stats();
        assert_eq!((stats.hits, stats.misses), (0, 1));

        assert!(cache.get_cached_value("svc-a", &["src/a.ts"], &cfg).is_some());
        assert_eq!(cache.get_cache_stats().hits, 1);
    }

    #[test]
    fn snapshot_survives_reopen() {
        let fx = Fixture::new();
        let cfg = TestConfig::new("test");
        {
            let cache = fx.open();
            cache.cache_result("svc-a", &["src/a.ts"], &cfg, &passing());
            cache.dispose();
        }
        let cache = fx.open();
        assert_eq!(
            cache.get_cached_result::<TestRunResult, _, _>("svc-a", &["src/a.ts"], &cfg),
            Some(passing())
        );
    }

    #[test]
    fn reopen_sweeps_expired_entries() {
        let fx = Fixture::new();
        let cfg = TestConfig::new("test");
        {
            let cache = fx.open();
            cache.cache_result("svc-a", &["src/a.ts"], &cfg, &passing());
            let key = cache_key("svc-a", &["src/a.ts"]);
            let mut store = cache.lock();
            store.get_mut(&key).unwrap().timestamp = Utc::now() - chrono::Duration::days(3);
            cache.persist(&store);
        }
        let cache = fx.open();
        assert_eq!(cache.get_cache_stats().total_entries, 0);
    }

    #[test]
    fn clear_persists_immediately() {
        let fx = Fixture::new();
        let cfg = TestConfig::new("test");
        let cache = fx.open();
        cache.cache_result("svc-a", &["src/a.ts"], &cfg, &passing());
        cache.clear_cache();

        let reopened = fx.open();
        assert_eq!(reopened.get_cache_stats().total_entries, 0);
    }

    #[test]
    fn save_failure_does_not_surface() {
        let fx = Fixture::new();
        let blocker = fx.cache_dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let settings = CacheSettings::new(fx.workspace.path())
            .with_snapshot_path(blocker.join("snapshot.json"));
        let cache = TestResultCache::new(&settings);
        let cfg = TestConfig::new("test");

        cache.cache_result("svc-a", &["src/a.ts"], &cfg, &passing());
        assert!(cache.dirty.load(Ordering::Acquire));
        // The in-memory table stays authoritative
        assert!(cache.get_cached_value("svc-a", &["src/a.ts"], &cfg).is_some());
    }
}
