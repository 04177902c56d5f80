//! Content-addressed test-result caching for retest
//!
//! This crate lets a test runner skip re-running a project's tests when
//! neither the affected source files nor the test configuration changed
//! since the last recorded run:
//! - Deterministic cache keys from a project name and its sorted file list
//! - Per-file SHA-256 fingerprints, skipping globs, directories and missing files
//! - Validity checks against age, configuration digest and file digests
//! - Age-based and size-based eviction
//! - A single JSON snapshot per workspace, replaced atomically
//!
//! # Overview
//!
//! ```rust,no_run
//! use retest_cache::{CacheSettings, TestConfig, TestResultCache, TestRunResult};
//!
//! let cache = TestResultCache::new(&CacheSettings::new("/path/to/workspace"));
//! let config = TestConfig::new("test").with_mode("ci");
//! let files = ["libs/svc-a/src/index.ts", "libs/svc-a/**/*.spec.ts"];
//!
//! let result: TestRunResult = match cache.get_cached_result("svc-a", &files, &config) {
//!     Some(cached) => cached,
//!     None => {
//!         let fresh = TestRunResult { passed: 5, ..TestRunResult::default() };
//!         cache.cache_result("svc-a", &files, &config, &fresh);
//!         fresh
//!     }
//! };
//! assert!(result.success());
//! cache.dispose();
//! ```
//!
//! # Failure model
//!
//! The cache is an optimization layer. Nothing in [`TestResultCache`]
//! returns an error: unreadable snapshots start empty, failed saves are
//! logged, and anything doubtful is treated as a miss.

mod cache;
mod error;
pub mod eviction;
pub mod fingerprint;
pub mod key;
pub mod result;
pub mod settings;
pub mod stats;
pub mod store;
#[cfg(test)]
mod test_utils;
pub mod validity;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use cache::TestResultCache;
pub use eviction::EvictionPolicy;
pub use fingerprint::{Fingerprint, SkipReason, SkippedFile, fingerprint_files, is_glob_pattern};
pub use key::{TestConfig, cache_key, config_hash};
pub use result::{TestFailure, TestRunResult};
pub use settings::CacheSettings;
pub use stats::CacheStats;
pub use store::{CacheEntry, EntryStore};
pub use validity::{MissReason, Validity};
