//! Regression Engine
//!
//! Compares the outcomes of a current run against a stored reference, one
//! verdict per reference row. Verdicts are ordinary `TestResult`s under the
//! test name `regression`, so a verdict log can itself serve as a reference.

pub mod compare;
pub mod report;

pub use compare::{compare, verdict, RegressionError, MISSING_OUTCOME};
pub use report::{RegressionReport, RegressionSample, VerdictCategory};
