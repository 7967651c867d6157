//! Tab-separated result log.
//!
//! Columns: `test  time  record_id  outcome`. Fields holding tabs, quotes or
//! newlines (multi-line canonical forms) are quoted by the csv writer.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use sdf_protocol::{ResultSet, TestResult};
use tracing::{debug, info};

use crate::{ResultSink, SinkError, SinkResult};

pub const HEADER: [&str; 4] = ["test", "time", "record_id", "outcome"];

pub struct TsvSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    rows_written: u64,
}

impl TsvSink {
    /// Create (or truncate) the log file and write the header row.
    pub fn create(path: &Path) -> SinkResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SinkError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(file);
        writer.write_record(HEADER)?;

        info!("Writing results to {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for TsvSink {
    fn append(&mut self, result: &TestResult) -> SinkResult<()> {
        let writer = self.writer.as_mut().ok_or(SinkError::Finished)?;
        writer.serialize(result)?;
        self.rows_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })?;
            debug!(
                "Closed {} ({} rows)",
                self.path.display(),
                self.rows_written
            );
        }
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

/// Read a log written by `TsvSink`.
pub fn read_results(path: &Path) -> SinkResult<ResultSet> {
    let file = File::open(path).map_err(|source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(file);

    let mut results = ResultSet::new();
    for row in reader.deserialize::<TestResult>() {
        results.push(row?);
    }
    debug!("Loaded {} results from {}", results.len(), path.display());
    Ok(results)
}
