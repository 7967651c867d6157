//! Pipeline configuration passed explicitly into every run.

use std::path::PathBuf;

use thiserror::Error;

use crate::defaults::{
    DEFAULT_JOB_QUEUE_CAPACITY, DEFAULT_RESULT_QUEUE_CAPACITY, DEFAULT_WORKERS, RECORD_DELIMITER,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("{queue} queue capacity must be at least 1 (use no capacity for an unbounded queue)")]
    ZeroCapacity { queue: &'static str },
    #[error("record delimiter must not be empty")]
    EmptyDelimiter,
}

/// Settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Gzip-compressed SDF archive to stream.
    pub archive_path: PathBuf,
    /// Number of worker threads (W). One sentinel is queued per worker.
    pub workers: usize,
    /// Job queue bound. `None` means unbounded; the producer never blocks.
    pub job_queue_capacity: Option<usize>,
    /// Result queue bound. `None` means unbounded.
    pub result_queue_capacity: Option<usize>,
    /// Delimiter line ending each record.
    pub delimiter: String,
}

impl PipelineConfig {
    pub fn new(archive_path: impl Into<PathBuf>) -> Self {
        Self {
            archive_path: archive_path.into(),
            workers: DEFAULT_WORKERS,
            job_queue_capacity: Some(DEFAULT_JOB_QUEUE_CAPACITY),
            result_queue_capacity: Some(DEFAULT_RESULT_QUEUE_CAPACITY),
            delimiter: RECORD_DELIMITER.to_string(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_job_queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.job_queue_capacity = capacity;
        self
    }

    pub fn with_result_queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.result_queue_capacity = capacity;
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.job_queue_capacity == Some(0) {
            return Err(ConfigError::ZeroCapacity { queue: "job" });
        }
        if self.result_queue_capacity == Some(0) {
            return Err(ConfigError::ZeroCapacity { queue: "result" });
        }
        if self.delimiter.trim().is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }
        Ok(())
    }
}
