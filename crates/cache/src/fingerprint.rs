//! Per-file content fingerprints
//!
//! Turns a caller-supplied file list into a map of path to SHA-256 digest.
//! Entries that cannot be hashed are not errors: they are reported as
//! [`SkippedFile`]s and left out of the map.

use crate::key::sha256_hex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Why a file list entry was left out of a fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Contains `*`, `?` or `[`; never read
    GlobPattern,
    /// Nothing exists at the resolved path
    NotFound,
    /// Exists but is a directory or other non-regular file
    NotAFile,
    /// Exists but reading it failed
    Unreadable(String),
}

/// A file list entry that produced no digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// The path exactly as the caller supplied it
    pub path: String,
    /// Why it was skipped
    pub reason: SkipReason,
}

/// Outcome of fingerprinting one file list entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Hex-encoded SHA-256 of the file contents
    Hashed(String),
    /// No digest could be produced
    Skipped {
        /// Why the entry was skipped
        reason: SkipReason,
    },
}

/// Digests for every fingerprintable entry of a file list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    /// Caller path string to content digest
    pub hashes: BTreeMap<String, String>,
    /// Entries with no digest, in input order
    pub skipped: Vec<SkippedFile>,
}

impl Fingerprint {
    /// True when no entry could be hashed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Skip reason recorded for `path`, if it was skipped
    #[must_use]
    pub fn skip_reason(&self, path: &str) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|s| s.path == path)
            .map(|s| &s.reason)
    }
}

/// Whether a file list entry is a glob pattern rather than a concrete path
#[must_use]
pub fn is_glob_pattern(path: &str) -> bool {
    path.contains(&['*', '?', '['][..])
}

/// Resolve a caller path against the workspace root
#[must_use]
pub fn resolve(workspace_root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        workspace_root.join(p)
    }
}

/// Fingerprint a single file list entry
#[must_use]
pub fn fingerprint_file(workspace_root: &Path, path: &str) -> FileOutcome {
    if is_glob_pattern(path) {
        return FileOutcome::Skipped {
            reason: SkipReason::GlobPattern,
        };
    }

    let resolved = resolve(workspace_root, path);
    let meta = match fs::metadata(&resolved) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return FileOutcome::Skipped {
                reason: SkipReason::NotFound,
            };
        }
        Err(e) => {
            tracing::debug!(path = %path, "Cannot stat file for fingerprint: {e}");
            return FileOutcome::Skipped {
                reason: SkipReason::Unreadable(e.to_string()),
            };
        }
    };
    if !meta.is_file() {
        return FileOutcome::Skipped {
            reason: SkipReason::NotAFile,
        };
    }

    match fs::read(&resolved) {
        Ok(bytes) => FileOutcome::Hashed(sha256_hex(bytes)),
        Err(e) => {
            tracing::debug!(path = %path, "Failed to read file for fingerprint: {e}");
            FileOutcome::Skipped {
                reason: SkipReason::Unreadable(e.to_string()),
            }
        }
    }
}

/// Fingerprint every entry of a file list.
///
/// Map keys are the caller's original strings, not resolved paths, so a later
/// call with the same list compares like with like.
#[must_use]
pub fn fingerprint_files<S: AsRef<str>>(workspace_root: &Path, files: &[S]) -> Fingerprint {
    let mut fingerprint = Fingerprint::default();
    for path in files.iter().map(AsRef::as_ref) {
        if fingerprint.hashes.contains_key(path) {
            continue;
        }
        match fingerprint_file(workspace_root, path) {
            FileOutcome::Hashed(digest) => {
                fingerprint.hashes.insert(path.to_string(), digest);
            }
            FileOutcome::Skipped { reason } => {
                if fingerprint.skip_reason(path).is_none() {
                    fingerprint.skipped.push(SkippedFile {
                        path: path.to_string(),
                        reason,
                    });
                }
            }
        }
    }
    fingerprint
}

/// True iff at least one entry of the list can be fingerprinted.
///
/// Stops at the first hit and only stats files, never reads them.
#[must_use]
pub fn has_fingerprintable_file<S: AsRef<str>>(workspace_root: &Path, files: &[S]) -> bool {
    files.iter().map(AsRef::as_ref).any(|path| {
        !is_glob_pattern(path)
            && fs::metadata(resolve(workspace_root, path)).is_ok_and(|m| m.is_file())
    })
}
