//! Canonical default values shared by the reader, worker pool and CLI.

/// Line that terminates one record in an SDF archive.
pub const RECORD_DELIMITER: &str = "$$$$";
pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_JOB_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_RESULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_RESULT_DESTINATION: &str = ":memory:";
/// Outcome string of a test that found nothing wrong.
pub const PASSED: &str = "passed";
/// Test name carried by every verdict the regression engine writes.
pub const REGRESSION_TEST_NAME: &str = "regression";
