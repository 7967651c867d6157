//! Core data model: records, test results, queue messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::PASSED;

// ============================================================================
// Records
// ============================================================================

/// One self-delimited structure entry (molfile plus tag lines).
///
/// The delimiter line itself is not part of the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    seq: u64,
    text: String,
}

impl Record {
    pub fn new(seq: u64, text: impl Into<String>) -> Self {
        Self {
            seq,
            text: text.into(),
        }
    }

    /// 0-based position of the record within its archive.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of one test function on one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(rename = "test")]
    pub test_name: String,
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    pub record_id: String,
    pub outcome: String,
}

impl TestResult {
    /// Build a result stamped with the current time.
    pub fn new(
        test_name: impl Into<String>,
        record_id: impl Into<String>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            timestamp: Utc::now(),
            record_id: record_id.into(),
            outcome: outcome.into(),
        }
    }

    pub fn passed(test_name: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self::new(test_name, record_id, PASSED)
    }

    pub fn is_passed(&self) -> bool {
        self.outcome == PASSED
    }
}

/// Results in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    results: Vec<TestResult>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: TestResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestResult> {
        self.results.iter()
    }

    pub fn as_slice(&self) -> &[TestResult] {
        &self.results
    }

    pub fn into_vec(self) -> Vec<TestResult> {
        self.results
    }

    /// Results whose outcome is anything other than `passed`.
    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.is_passed())
    }

    /// Only the rows written by `test_name`, order preserved.
    pub fn filter_test(&self, test_name: &str) -> ResultSet {
        self.results
            .iter()
            .filter(|r| r.test_name == test_name)
            .cloned()
            .collect()
    }

    /// Copy sorted by record id (stable, so duplicates keep arrival order).
    ///
    /// Arrival order depends on worker interleaving; this is the comparable form.
    pub fn sorted_by_record_id(&self) -> Vec<TestResult> {
        let mut sorted = self.results.clone();
        sorted.sort_by(|a, b| {
            a.record_id
                .cmp(&b.record_id)
                .then_with(|| a.test_name.cmp(&b.test_name))
        });
        sorted
    }
}

impl FromIterator<TestResult> for ResultSet {
    fn from_iter<I: IntoIterator<Item = TestResult>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<TestResult>> for ResultSet {
    fn from(results: Vec<TestResult>) -> Self {
        Self { results }
    }
}

impl IntoIterator for ResultSet {
    type Item = TestResult;
    type IntoIter = std::vec::IntoIter<TestResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a TestResult;
    type IntoIter = std::slice::Iter<'a, TestResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

// ============================================================================
// Queue messages
// ============================================================================

/// Element type of the job queue.
#[derive(Debug)]
pub enum JobMessage {
    Record(Record),
    /// End of input. Exactly one is queued per worker.
    WorkerDone,
}

/// Element type of the result queue.
#[derive(Debug)]
pub enum ResultMessage {
    Result(TestResult),
    /// The worker consumed its sentinel and exited.
    WorkerDone { worker_id: usize },
    /// The worker hit an infrastructure failure and exited without a sentinel.
    WorkerFailed { worker_id: usize, error: String },
}

// ============================================================================
// Test function errors
// ============================================================================

/// Error a test function may return.
#[derive(Debug, Error)]
pub enum TestError {
    /// Assertion-style failure. The message becomes the outcome.
    #[error("{0}")]
    Failed(String),

    /// Programming defect. Fatal to the worker that ran the test.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl TestError {
    pub fn failed(message: impl Into<String>) -> Self {
        TestError::Failed(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, TestError::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(test: &str, id: &str, outcome: &str) -> TestResult {
        TestResult::new(test, id, outcome)
    }

    #[test]
    fn test_passed_outcome() {
        assert!(TestResult::passed("invariance", "m1").is_passed());
        assert!(!result("invariance", "m1", "atom count differs").is_passed());
    }

    #[test]
    fn test_failures_and_filter() {
        let set: ResultSet = vec![
            result("invariance", "a", "passed"),
            result("invariance", "b", "bond order mismatch"),
            result("canonicalization", "a", "C2H6"),
        ]
        .into();

        let failures: Vec<_> = set.failures().map(|r| r.record_id.as_str()).collect();
        assert_eq!(failures, vec!["b", "a"]);

        let canonical = set.filter_test("canonicalization");
        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical.as_slice()[0].outcome, "C2H6");
    }

    #[test]
    fn test_sorted_by_record_id_keeps_duplicate_order() {
        let set: ResultSet = vec![
            result("t", "z", "1"),
            result("t", "a", "first"),
            result("t", "a", "second"),
        ]
        .into();

        let sorted = set.sorted_by_record_id();
        let outcomes: Vec<_> = sorted.iter().map(|r| r.outcome.as_str()).collect();
        assert_eq!(outcomes, vec!["first", "second", "1"]);
    }

    #[test]
    fn test_result_serializes_with_log_column_names() {
        let json = serde_json::to_value(result("invariance", "m7", "passed")).unwrap();
        assert_eq!(json["test"], "invariance");
        assert_eq!(json["record_id"], "m7");
        assert!(json.get("time").is_some());
    }

    #[test]
    fn test_error_classification() {
        assert!(!TestError::failed("nope").is_fatal());
        let fatal: TestError = anyhow::anyhow!("index out of range").into();
        assert!(fatal.is_fatal());
        assert_eq!(TestError::failed("nope").to_string(), "nope");
    }
}
