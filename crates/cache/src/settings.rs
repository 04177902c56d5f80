//! Cache configuration
//!
//! Limits and file locations for one workspace's cache. Settings can come
//! from code, from a JSON file, or from defaults; the snapshot location falls
//! back through environment and platform cache directories.

use crate::eviction::EvictionPolicy;
use crate::key::sha256_hex;
use crate::{Error, Result};
use chrono::TimeDelta;
use dirs::{cache_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the snapshot directory
pub const CACHE_DIR_ENV: &str = "RETEST_CACHE_DIR";

const DEFAULT_MAX_AGE_SECS: u64 = 24 * 60 * 60;
const DEFAULT_MAX_ENTRIES: usize = 100;
const DEFAULT_EVICTION_MARGIN: usize = 10;

/// Settings for a [`crate::TestResultCache`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Root that relative file paths resolve against
    pub workspace_root: PathBuf,
    /// Explicit snapshot file; derived from the workspace root when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
    /// Maximum age of a reusable entry, in seconds
    pub max_age_secs: u64,
    /// Maximum number of entries kept
    pub max_entries: usize,
    /// Extra entries removed beyond the minimum when the table overflows
    pub eviction_margin: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            snapshot_path: None,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            max_entries: DEFAULT_MAX_ENTRIES,
            eviction_margin: DEFAULT_EVICTION_MARGIN,
        }
    }
}

impl CacheSettings {
    /// Default settings for a workspace
    #[must_use]
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            ..Self::default()
        }
    }

    /// Use an explicit snapshot file
    #[must_use]
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Override the maximum entry age
    #[must_use]
    pub fn with_max_age_secs(mut self, secs: u64) -> Self {
        self.max_age_secs = secs;
        self
    }

    /// Override the maximum entry count
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Override the eviction margin
    #[must_use]
    pub fn with_eviction_margin(mut self, margin: usize) -> Self {
        self.eviction_margin = margin;
        self
    }

    /// Load settings from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        serde_json::from_str(&content).map_err(|e| {
            Error::configuration(format!("Invalid settings in {}: {e}", path.display()))
        })
    }

    /// Eviction policy described by these settings
    #[must_use]
    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            max_age: i64::try_from(self.max_age_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            max_entries: self.max_entries,
            margin: self.eviction_margin,
        }
    }

    /// Snapshot file for this workspace.
    ///
    /// Uses the explicit path if set, otherwise
    /// `<cache root>/<workspace digest>.json`.
    pub fn snapshot_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.snapshot_path {
            return Ok(path.clone());
        }
        let root = cache_root()?;
        Ok(root.join(snapshot_file_name(&self.workspace_root)))
    }
}

/// One snapshot per workspace: name derived from the workspace root
fn snapshot_file_name(workspace_root: &Path) -> String {
    let canonical = workspace_root
        .canonicalize()
        .unwrap_or_else(|_| workspace_root.to_path_buf());
    let digest = sha256_hex(canonical.to_string_lossy().as_bytes());
    format!("{}.json", &digest[..16])
}

/// Inputs for determining the cache root directory
#[derive(Debug, Clone)]
struct CacheInputs {
    override_dir: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    temp_dir: PathBuf,
}

fn cache_root_from_inputs(inputs: CacheInputs) -> Result<PathBuf> {
    // Resolution order (first writable wins):
    // 1) RETEST_CACHE_DIR
    // 2) XDG_CACHE_HOME/retest
    // 3) OS cache dir/retest
    // 4) ~/.retest/cache
    // 5) TMPDIR/retest/cache
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(dir) = inputs.override_dir.filter(|p| !p.as_os_str().is_empty()) {
        candidates.push(dir);
    }
    if let Some(xdg) = inputs.xdg_cache_home {
        candidates.push(xdg.join("retest"));
    }
    if let Some(os_cache) = inputs.os_cache_dir {
        candidates.push(os_cache.join("retest"));
    }
    if let Some(home) = inputs.home_dir {
        candidates.push(home.join(".retest/cache"));
    }
    candidates.push(inputs.temp_dir.join("retest/cache"));

    for path in candidates {
        if path.exists() {
            let probe = path.join(".write_probe");
            match fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&probe)
            {
                Ok(_) => {
                    let _ = fs::remove_file(&probe);
                    return Ok(path);
                }
                Err(_) => continue,
            }
        }
        if fs::create_dir_all(&path).is_ok() {
            return Ok(path);
        }
    }
    Err(Error::configuration(
        "Failed to determine a writable cache directory",
    ))
}

fn non_empty_env(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

fn cache_root() -> Result<PathBuf> {
    cache_root_from_inputs(CacheInputs {
        override_dir: non_empty_env(CACHE_DIR_ENV),
        xdg_cache_home: non_empty_env("XDG_CACHE_HOME"),
        os_cache_dir: cache_dir(),
        home_dir: home_dir(),
        temp_dir: std::env::temp_dir(),
    })
}
