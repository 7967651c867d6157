//! Drivers: the three kinds of run the CLI offers.

use sdf_protocol::{PipelineConfig, ResultSet, TestResult};
use sdf_regression::{compare, RegressionError, RegressionReport};
use sdf_sinks::{MemoryIndex, MemorySink, ResultSink, SinkError, SinkResult};
use sdf_worker::TestSuite;
use thiserror::Error;
use tracing::{info, warn};

use crate::pipeline::{run_pipeline, PipelineError, PipelineReport};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Regression(#[from] RegressionError),

    #[error("Failed to flush verdicts: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Clone)]
pub struct InvarianceSummary {
    pub report: PipelineReport,
    /// Every result whose outcome is not `passed`, in arrival order.
    pub failures: Vec<TestResult>,
}

#[derive(Debug, Clone)]
pub struct RegressionSummary {
    /// The current run (its results are kept in memory only).
    pub report: PipelineReport,
    pub regression: RegressionReport,
    /// Reference rows written by tests outside the suite, not compared.
    pub ignored_reference_rows: usize,
    /// Current-run rows shadowed by an earlier row with the same id.
    pub duplicate_ids: usize,
}

/// Sink adapter that remembers non-passed results on their way through.
struct FailureCollector<'a> {
    inner: &'a mut dyn ResultSink,
    failures: Vec<TestResult>,
}

impl ResultSink for FailureCollector<'_> {
    fn append(&mut self, result: &TestResult) -> SinkResult<()> {
        if !result.is_passed() {
            self.failures.push(result.clone());
        }
        self.inner.append(result)
    }

    fn flush(&mut self) -> SinkResult<()> {
        self.inner.flush()
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.inner.finish()
    }

    fn rows_written(&self) -> u64 {
        self.inner.rows_written()
    }
}

/// Run invariance-style tests and list everything that did not pass.
pub fn invariance(
    config: &PipelineConfig,
    suite: &TestSuite,
    sink: &mut dyn ResultSink,
) -> Result<InvarianceSummary, PipelineError> {
    info!("Invariance run: {:?}", suite.test_names());
    let mut collector = FailureCollector {
        inner: sink,
        failures: Vec::new(),
    };
    let report = run_pipeline(config, suite, &mut collector)?;
    Ok(InvarianceSummary {
        report,
        failures: collector.failures,
    })
}

/// Persist the suite's outputs so later runs can be compared against them.
pub fn compute_reference(
    config: &PipelineConfig,
    suite: &TestSuite,
    sink: &mut dyn ResultSink,
) -> Result<PipelineReport, PipelineError> {
    info!("Computing reference results: {:?}", suite.test_names());
    run_pipeline(config, suite, sink)
}

/// Run the suite into memory, then write one verdict per reference row.
///
/// Only reference rows written by one of the suite's tests are compared.
pub fn regression(
    config: &PipelineConfig,
    suite: &TestSuite,
    reference: &ResultSet,
    sink: &mut dyn ResultSink,
) -> Result<RegressionSummary, DriverError> {
    info!(
        "Regression run: {:?} against {} reference rows",
        suite.test_names(),
        reference.len()
    );
    let mut intermediate = MemorySink::new();
    let report = run_pipeline(config, suite, &mut intermediate)?;
    let current = intermediate.into_results();

    let index = MemoryIndex::build(&current);
    if index.duplicates() > 0 {
        warn!(
            "{} results share a record id with an earlier result; the first one is compared",
            index.duplicates()
        );
    }

    let names = suite.test_names();
    let relevant: ResultSet = reference
        .iter()
        .filter(|r| names.contains(&r.test_name.as_str()))
        .cloned()
        .collect();
    let ignored_reference_rows = reference.len() - relevant.len();
    if ignored_reference_rows > 0 {
        info!(
            "Skipping {} reference rows written by other tests",
            ignored_reference_rows
        );
    }

    let regression = compare(&relevant, &index, sink)?;
    sink.flush()?;

    Ok(RegressionSummary {
        report,
        regression,
        ignored_reference_rows,
        duplicate_ids: index.duplicates(),
    })
}
