//! Deterministic cache keys and configuration digests

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hex-encoded SHA-256 of arbitrary bytes
#[must_use]
pub fn sha256_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(bytes.as_ref()))
}

/// Envelope hashed to produce a cache key
#[derive(Debug, Serialize)]
struct KeyEnvelope<'a> {
    project: &'a str,
    files: Vec<&'a str>,
}

/// Compute the cache key for a project and its candidate file list.
///
/// The file list is sorted before hashing, so callers may pass files in any
/// order. Duplicates are kept; `["a", "a"]` and `["a"]` are different keys.
#[must_use]
pub fn cache_key<S: AsRef<str>>(project_name: &str, files: &[S]) -> String {
    let mut sorted: Vec<&str> = files.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();

    let envelope = KeyEnvelope {
        project: project_name,
        files: sorted,
    };
    // Serializing borrowed strings into a Vec cannot fail
    let bytes = serde_json::to_vec(&envelope).unwrap_or_default();
    sha256_hex(bytes)
}

/// Test configuration a result was produced under.
///
/// Any change to this record invalidates previously cached results. Maps are
/// ordered, so two configs with the same content always digest identically
/// regardless of the order keys were supplied in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    /// Command used to run the tests (e.g. `test`, `e2e`)
    pub command: String,
    /// Execution mode (e.g. `watch`, `ci`, `coverage`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Command-line flags passed to the test runner
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, String>,
    /// Any remaining structured settings
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TestConfig {
    /// Config for a plain command with no mode or flags
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Set the execution mode
    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Add a flag
    #[must_use]
    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }
}

/// Digest any serializable configuration value.
///
/// The value goes through [`serde_json::Value`], whose object maps are
/// key-sorted, so the digest depends on content only.
pub fn config_hash<T: Serialize + ?Sized>(config: &T) -> Result<String> {
    let value = serde_json::to_value(config)
        .map_err(|e| Error::serialization(format!("Failed to encode config: {e}")))?;
    let bytes = serde_json::to_vec(&value)
        .map_err(|e| Error::serialization(format!("Failed to serialize config: {e}")))?;
    Ok(sha256_hex(bytes))
}
