//! Standard test-run outcome payload
//!
//! The cache stores results as opaque JSON. This type is what the test runner
//! integration records; other payload shapes work as long as they serialize.

use serde::{Deserialize, Serialize};

/// A single failing test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFailure {
    /// Fully qualified test name
    pub name: String,
    /// Failure message reported by the runner
    pub message: String,
    /// Source file of the test, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Outcome of one test run for one project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunResult {
    /// Number of passing tests
    pub passed: u32,
    /// Number of failing tests
    pub failed: u32,
    /// Number of skipped tests
    #[serde(default)]
    pub skipped: u32,
    /// Wall-clock duration in milliseconds
    #[serde(default)]
    pub duration_ms: u64,
    /// Raw runner output
    #[serde(default)]
    pub output: String,
    /// Details for each failure
    #[serde(default)]
    pub failures: Vec<TestFailure>,
}

impl TestRunResult {
    /// True when nothing failed
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of tests seen by the runner
    #[must_use]
    pub fn total(&self) -> u32 {
        self.passed
            .saturating_add(self.failed)
            .saturating_add(self.skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_payload_deserializes() {
        let r: TestRunResult = serde_json::from_str(r#"{"passed":5,"failed":0}"#).unwrap();
        assert_eq!(r.passed, 5);
        assert!(r.success());
        assert_eq!(r.total(), 5);
        assert!(r.failures.is_empty());
    }

    #[test]
    fn total_saturates_instead_of_overflowing() {
        let r = TestRunResult {
            passed: u32::MAX,
            failed: 3,
            skipped: 1,
            ..TestRunResult::default()
        };
        assert_eq!(r.total(), u32::MAX);
    }

    #[test]
    fn failures_are_camel_case() {
        let r = TestRunResult {
            passed: 1,
            failed: 1,
            duration_ms: 1200,
            failures: vec![TestFailure {
                name: "math adds".into(),
                message: "expected 3".into(),
                file: None,
            }],
            ..TestRunResult::default()
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["durationMs"], 1200);
        assert!(json["failures"][0].get("file").is_none());
        assert!(!r.success());
    }
}
