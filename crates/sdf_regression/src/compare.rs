//! Reference vs. current comparison.

use sdf_protocol::defaults::{PASSED, REGRESSION_TEST_NAME};
use sdf_protocol::{ResultSet, TestResult};
use sdf_sinks::{RecordIndex, ResultSink, SinkError};
use thiserror::Error;
use tracing::{debug, info};

use crate::report::{RegressionReport, VerdictCategory};

/// Verdict outcome for a reference id the current run never produced.
pub const MISSING_OUTCOME: &str = "missing from current run";

#[derive(Debug, Error)]
pub enum RegressionError {
    #[error("Current-run lookup failed for {test_name} on record {record_id}: {source}")]
    Lookup {
        test_name: String,
        record_id: String,
        #[source]
        source: SinkError,
    },

    #[error("Failed to persist verdict: {0}")]
    Sink(#[from] SinkError),
}

/// Judge one reference row against the current outcome (if any).
pub fn verdict(
    record_id: &str,
    reference_outcome: &str,
    current_outcome: Option<&str>,
) -> (VerdictCategory, TestResult) {
    let (category, outcome) = match current_outcome {
        None => (VerdictCategory::Missing, MISSING_OUTCOME.to_string()),
        Some(current) if current == reference_outcome => {
            (VerdictCategory::Passed, PASSED.to_string())
        }
        Some(current) => (
            VerdictCategory::Mismatch,
            format!("reference: {} / current: {}", reference_outcome, current),
        ),
    };
    (
        category,
        TestResult::new(REGRESSION_TEST_NAME, record_id, outcome),
    )
}

/// Compare every reference row, in order, and write one verdict per row.
///
/// Each row is matched on its own test name, so a reference may mix tests.
/// The sink is not finished here.
pub fn compare(
    reference: &ResultSet,
    current: &dyn RecordIndex,
    sink: &mut dyn ResultSink,
) -> Result<RegressionReport, RegressionError> {
    info!("Comparing {} reference results", reference.len());
    let mut report = RegressionReport::new();

    for expected in reference {
        let current_outcome =
            current
                .lookup(&expected.test_name, &expected.record_id)
                .map_err(|source| RegressionError::Lookup {
                    test_name: expected.test_name.clone(),
                    record_id: expected.record_id.clone(),
                    source,
                })?;

        let (category, result) = verdict(
            &expected.record_id,
            &expected.outcome,
            current_outcome.as_deref(),
        );
        if category.is_failure() {
            debug!(record_id = %expected.record_id, %category, "Regression");
        }
        report.record(&expected.record_id, category, &result.outcome);
        sink.append(&result)?;
    }

    info!(
        "Regression complete: {}/{} passed ({} mismatched, {} missing)",
        report.passed(),
        report.total,
        report.count(VerdictCategory::Mismatch),
        report.count(VerdictCategory::Missing)
    );
    Ok(report)
}
