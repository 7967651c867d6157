//! SQLite result log.
//!
//! One `results(test, time, record_id, outcome)` table. Writes are buffered
//! and committed in batches; reads come back in insertion (rowid) order.
//!
//! sqlx is async, the pipeline is not: each store drives its pool from a
//! private current-thread tokio runtime.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sdf_protocol::{ResultSet, TestResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::index::RecordIndex;
use crate::{ResultSink, SinkError, SinkResult};

const INSERT_BATCH_SIZE: usize = 512;

pub struct SqliteStore {
    runtime: Runtime,
    pool: Pool<Sqlite>,
    location: PathBuf,
    pending: Vec<TestResult>,
    rows_written: u64,
    read_only: bool,
    finished: bool,
}

impl SqliteStore {
    /// Open (creating if needed) a store for writing.
    pub fn open(path: &Path) -> SinkResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let store = Self::connect(options, path.to_path_buf(), false)?;
        info!("Writing results to {}", path.display());
        Ok(store)
    }

    /// Open an existing store for reading only (regression references).
    pub fn open_read_only(path: &Path) -> SinkResult<Self> {
        let options = SqliteConnectOptions::new().filename(path).read_only(true);
        Self::connect(options, path.to_path_buf(), true)
    }

    /// Create an in-memory store (for testing and intermediates).
    pub fn in_memory() -> SinkResult<Self> {
        let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
        Self::connect(options, PathBuf::from(":memory:"), false)
    }

    fn connect(options: SqliteConnectOptions, location: PathBuf, read_only: bool) -> SinkResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SinkError::Runtime)?;

        // One connection: an in-memory database lives and dies with it.
        let pool = runtime.block_on(
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options),
        )?;

        let store = Self {
            runtime,
            pool,
            location,
            pending: Vec::with_capacity(INSERT_BATCH_SIZE),
            rows_written: 0,
            read_only,
            finished: read_only,
        };
        if !read_only {
            store.init_schema()?;
        }
        Ok(store)
    }

    fn init_schema(&self) -> SinkResult<()> {
        self.runtime.block_on(async {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS results (
                    test TEXT NOT NULL,
                    time TEXT NOT NULL,
                    record_id TEXT NOT NULL,
                    outcome TEXT NOT NULL
                )
                "#,
            )
            .execute(&self.pool)
            .await
        })?;
        Ok(())
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Build the point-lookup index on `(record_id, test)`. Idempotent.
    pub fn create_index(&self) -> SinkResult<()> {
        self.runtime.block_on(async {
            sqlx::query("CREATE INDEX IF NOT EXISTS record_id_index ON results(record_id, test)")
                .execute(&self.pool)
                .await
        })?;
        debug!("Indexed {} by record_id", self.location.display());
        Ok(())
    }

    /// Every stored row in insertion order.
    pub fn load_all(&self) -> SinkResult<ResultSet> {
        let rows: Vec<ResultRow> = self.runtime.block_on(async {
            sqlx::query_as(
                "SELECT test, time, record_id, outcome FROM results ORDER BY rowid",
            )
            .fetch_all(&self.pool)
            .await
        })?;
        debug!("Loaded {} results from {}", rows.len(), self.location.display());
        Ok(rows.into_iter().map(TestResult::from).collect())
    }

    /// Number of stored rows (pending rows not included).
    pub fn count(&self) -> SinkResult<u64> {
        let (count,): (i64,) = self.runtime.block_on(async {
            sqlx::query_as("SELECT COUNT(*) FROM results")
                .fetch_one(&self.pool)
                .await
        })?;
        Ok(count.max(0) as u64)
    }

    fn flush_pending(&mut self) -> SinkResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        let pool = &self.pool;
        let committed = self.runtime.block_on(async {
            let mut tx = pool.begin().await?;
            for result in &batch {
                sqlx::query(
                    "INSERT INTO results (test, time, record_id, outcome) VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(&result.test_name)
                .bind(result.timestamp)
                .bind(&result.record_id)
                .bind(&result.outcome)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await
        });
        if let Err(e) = committed {
            // Rolled back: keep the rows so a later flush can retry them.
            self.pending = batch;
            return Err(e.into());
        }
        debug!("Committed {} rows to {}", batch.len(), self.location.display());
        self.pending = batch;
        self.pending.clear();
        Ok(())
    }
}

impl ResultSink for SqliteStore {
    fn append(&mut self, result: &TestResult) -> SinkResult<()> {
        if self.finished {
            return Err(SinkError::Finished);
        }
        self.pending.push(result.clone());
        self.rows_written += 1;
        if self.pending.len() >= INSERT_BATCH_SIZE {
            self.flush_pending()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        self.flush_pending()
    }

    fn finish(&mut self) -> SinkResult<()> {
        if self.finished {
            return Ok(());
        }
        self.flush_pending()?;
        self.finished = true;
        debug!(
            "Closed {} ({} rows)",
            self.location.display(),
            self.rows_written
        );
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

impl RecordIndex for SqliteStore {
    fn lookup(&self, test_name: &str, record_id: &str) -> SinkResult<Option<String>> {
        let row: Option<(String,)> = self.runtime.block_on(async {
            sqlx::query_as(
                "SELECT outcome FROM results WHERE record_id = ?1 AND test = ?2 ORDER BY rowid LIMIT 1",
            )
            .bind(record_id)
            .bind(test_name)
            .fetch_optional(&self.pool)
            .await
        })?;
        Ok(row.map(|(outcome,)| outcome))
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if !self.pending.is_empty() && !self.read_only {
            warn!(
                "Store {} dropped with {} unflushed rows, flushing",
                self.location.display(),
                self.pending.len()
            );
            if let Err(e) = self.flush_pending() {
                warn!("Failed to flush {}: {}", self.location.display(), e);
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct ResultRow {
    test: String,
    time: DateTime<Utc>,
    record_id: String,
    outcome: String,
}

impl From<ResultRow> for TestResult {
    fn from(row: ResultRow) -> Self {
        TestResult {
            test_name: row.test,
            timestamp: row.time,
            record_id: row.record_id,
            outcome: row.outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_come_back_in_insertion_order() {
        let mut store = SqliteStore::in_memory().unwrap();
        for id in ["c", "a", "b"] {
            store.append(&TestResult::passed("invariance", id)).unwrap();
        }
        store.finish().unwrap();

        let loaded = store.load_all().unwrap();
        let ids: Vec<_> = loaded.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_batches_larger_than_one_transaction() {
        let mut store = SqliteStore::in_memory().unwrap();
        let total = INSERT_BATCH_SIZE * 2 + 7;
        for i in 0..total {
            store
                .append(&TestResult::new("t", format!("id-{}", i), "passed"))
                .unwrap();
        }
        // Two full batches are already committed.
        assert_eq!(store.count().unwrap(), (INSERT_BATCH_SIZE * 2) as u64);
        store.finish().unwrap();
        assert_eq!(store.count().unwrap(), total as u64);
    }

    #[test]
    fn test_lookup_returns_first_stored_outcome() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.append(&TestResult::new("t", "dup", "first")).unwrap();
        store.append(&TestResult::new("u", "dup", "other test")).unwrap();
        store.append(&TestResult::new("t", "dup", "second")).unwrap();
        store.finish().unwrap();
        store.create_index().unwrap();
        store.create_index().unwrap();

        assert_eq!(store.lookup("t", "dup").unwrap().as_deref(), Some("first"));
        assert_eq!(store.lookup("u", "dup").unwrap().as_deref(), Some("other test"));
        assert_eq!(store.lookup("t", "absent").unwrap(), None);
    }

    #[test]
    fn test_read_only_store_rejects_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ref.sqlite");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.append(&TestResult::new("t", "m1", "C2H6")).unwrap();
            store.finish().unwrap();
        }

        let mut reference = SqliteStore::open_read_only(&path).unwrap();
        assert_eq!(reference.load_all().unwrap().len(), 1);
        assert!(matches!(
            reference.append(&TestResult::passed("t", "m2")),
            Err(SinkError::Finished)
        ));
    }

    #[test]
    fn test_failed_commit_keeps_rows_for_retry() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .runtime
            .block_on(sqlx::query("DROP TABLE results").execute(&store.pool))
            .unwrap();

        store.append(&TestResult::passed("t", "kept")).unwrap();
        assert!(store.flush().is_err());
        assert_eq!(store.pending.len(), 1);

        store.init_schema().unwrap();
        store.flush().unwrap();
        assert!(store.pending.is_empty());
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.rows_written(), 1);
    }

    #[test]
    fn test_open_read_only_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(SqliteStore::open_read_only(&tmp.path().join("nope.sqlite")).is_err());
    }
}
