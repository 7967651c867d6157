//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use std::fmt;
use std::path::Path;

use sdf_pipeline::{AggregateError, DriverError, PipelineError};
use sdf_worker::ReaderError;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions
            .extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    pub fn archive_not_found(path: &Path) -> Self {
        Self::new(format!("Archive not found: {}", path.display()))
            .with_context("The --archive path does not exist")
            .with_suggestions([
                format!("TRY: Check that the file exists: ls -la {}", path.display()),
                "TRY: Check for typos in the path".to_string(),
            ])
    }

    pub fn reference_not_found(path: &Path) -> Self {
        Self::new(format!("Reference results not found: {}", path.display()))
            .with_context("The --regression-reference path does not exist")
            .with_suggestions([
                "TRY: Compute a reference first: sdf-pipeline regression --archive <ARCHIVE> --result-destination ref.sqlite --compute-reference".to_string(),
                format!("TRY: Check that the file exists: ls -la {}", path.display()),
            ])
    }

    pub fn memory_reference() -> Self {
        Self::new("':memory:' cannot be used as a regression reference")
            .with_context("In-memory results are discarded when the run ends")
            .with_suggestion(
                "TRY: Pass the .sqlite or .tsv file an earlier --compute-reference run wrote",
            )
    }

    /// Translate a pipeline failure, naming the worker and cause where known.
    pub fn from_pipeline(err: &PipelineError) -> Self {
        match err {
            PipelineError::Input(ReaderError::NotGzip { path }) => {
                Self::new(format!("Not a gzip archive: {}", path.display()))
                    .with_context("Archives are read as gzip-compressed SDF")
                    .with_suggestion(format!(
                        "TRY: Compress the file first: gzip -k {}",
                        path.display()
                    ))
            }
            PipelineError::Input(e) => Self::new("Cannot read archive")
                .with_context(e.to_string())
                .with_suggestion("TRY: Check the file is a complete gzip download (gzip -t <ARCHIVE>)"),
            PipelineError::Aggregate(AggregateError::WorkerFailed { worker_id, error }) => {
                Self::new(format!("Worker {} failed", worker_id))
                    .with_context(error.clone())
                    .with_suggestions([
                        "TRY: Rerun with -v to see which record triggered the failure",
                        "TRY: Inspect the log under $SDF_PIPELINE_HOME/logs",
                    ])
            }
            PipelineError::Aggregate(AggregateError::QueueClosed { .. }) => {
                Self::new("A worker exited without reporting")
                    .with_context(err.to_string())
                    .with_suggestion("TRY: Inspect the log under $SDF_PIPELINE_HOME/logs")
            }
            PipelineError::Config(e) => Self::new(format!("Invalid settings: {}", e))
                .with_suggestion("TRY: --workers and --queue-capacity accept positive numbers (0 = unbounded queue)"),
            other => Self::new("Pipeline failed").with_context(other.to_string()),
        }
    }

    pub fn from_driver(err: &DriverError) -> Self {
        match err {
            DriverError::Pipeline(e) => Self::from_pipeline(e),
            other => Self::new("Regression failed").with_context(other.to_string()),
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// `{"status": "failed", "error": ...}` on stdout for `--json` runs.
pub fn print_json_error(err: &anyhow::Error) {
    let message = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => match &helpful.context {
            Some(ctx) => format!("{}: {}", helpful.message, ctx),
            None => helpful.message.clone(),
        },
        None => format!("{:#}", err),
    };
    println!(
        "{}",
        serde_json::json!({ "status": "failed", "error": message })
    );
}
