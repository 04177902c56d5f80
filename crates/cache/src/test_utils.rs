//! Shared fixtures for unit tests

use crate::store::CacheEntry;
use chrono::Utc;
use std::collections::BTreeMap;

/// Entry for `project` recorded `age_secs` seconds ago
pub(crate) fn entry(project: &str, age_secs: i64) -> CacheEntry {
    CacheEntry {
        project_name: project.to_string(),
        file_hashes: BTreeMap::from([("src/a.ts".to_string(), "aa".to_string())]),
        config_hash: "cfg".to_string(),
        timestamp: Utc::now() - chrono::Duration::seconds(age_secs),
        result: serde_json::json!({"passed": 5, "failed": 0}),
    }
}
