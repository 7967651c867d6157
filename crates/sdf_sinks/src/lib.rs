//! Result log sinks.
//!
//! A run writes its `TestResult`s through a `ResultSink`, chosen from the
//! destination string:
//! - `:memory:` keeps results in process (`MemorySink`)
//! - `*.sqlite`, `*.sqlite3`, `*.db` go to a SQLite `results` table (`SqliteStore`)
//! - anything else becomes a tab-separated flat file (`TsvSink`)
//!
//! Sinks are single-writer: the aggregator owns the one sink of a run.

use std::io;
use std::path::{Path, PathBuf};

use sdf_protocol::{ResultSet, TestResult};
use thiserror::Error;

pub mod index;
pub mod memory;
pub mod sqlite;
pub mod tsv;

pub use index::{MemoryIndex, RecordIndex};
pub use memory::MemorySink;
pub use sqlite::SqliteStore;
pub use tsv::TsvSink;

/// Errors returned by sink writing, reading and lookups.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Flat-file log error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to start database runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("Result destination must not be empty")]
    EmptyDestination,

    #[error("In-memory results are not persisted and cannot be loaded")]
    NotPersisted,

    #[error("Sink already finished")]
    Finished,
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Where a run's results go.
pub trait ResultSink: Send {
    /// Record one result. Order of calls is the order rows are stored.
    fn append(&mut self, result: &TestResult) -> SinkResult<()>;

    /// Make every appended row durable. The sink stays open.
    fn flush(&mut self) -> SinkResult<()>;

    /// Flush and close. Appending afterwards is an error.
    fn finish(&mut self) -> SinkResult<()>;

    /// Rows accepted so far.
    fn rows_written(&self) -> u64;
}

/// Parsed result destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Memory,
    Sqlite(PathBuf),
    Tsv(PathBuf),
}

const MEMORY_DESTINATION: &str = ":memory:";
const SQLITE_EXTENSIONS: &[&str] = &["sqlite", "sqlite3", "db"];

impl Destination {
    pub fn parse(destination: &str) -> SinkResult<Self> {
        let trimmed = destination.trim();
        if trimmed.is_empty() {
            return Err(SinkError::EmptyDestination);
        }
        if trimmed == MEMORY_DESTINATION {
            return Ok(Destination::Memory);
        }

        let path = PathBuf::from(trimmed);
        let is_sqlite = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                SQLITE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);

        Ok(if is_sqlite {
            Destination::Sqlite(path)
        } else {
            Destination::Tsv(path)
        })
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Destination::Memory => None,
            Destination::Sqlite(path) | Destination::Tsv(path) => Some(path),
        }
    }

    pub fn is_persistent(&self) -> bool {
        !matches!(self, Destination::Memory)
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Memory => write!(f, "{}", MEMORY_DESTINATION),
            Destination::Sqlite(path) => write!(f, "sqlite:{}", path.display()),
            Destination::Tsv(path) => write!(f, "tsv:{}", path.display()),
        }
    }
}

/// Open a writable sink for `destination`.
pub fn open_sink(destination: &Destination) -> SinkResult<Box<dyn ResultSink>> {
    Ok(match destination {
        Destination::Memory => Box::new(MemorySink::new()),
        Destination::Sqlite(path) => Box::new(SqliteStore::open(path)?),
        Destination::Tsv(path) => Box::new(TsvSink::create(path)?),
    })
}

/// Read a persisted result log back, rows in stored order.
pub fn load_results(destination: &Destination) -> SinkResult<ResultSet> {
    match destination {
        Destination::Memory => Err(SinkError::NotPersisted),
        Destination::Sqlite(path) => SqliteStore::open_read_only(path)?.load_all(),
        Destination::Tsv(path) => tsv::read_results(path),
    }
}
