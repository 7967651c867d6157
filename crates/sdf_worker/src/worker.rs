//! Worker Pool
//!
//! Design principles:
//! - W plain OS threads; test functions are CPU-bound and need real parallelism
//! - The two queues are the only shared state (plus lock-free counters)
//! - A worker stops at its first sentinel and answers with its own
//! - `TestError::Failed` is an outcome; `TestError::Fatal` or a panic ends the
//!   worker, which reports `WorkerFailed` so the aggregator never waits on it

use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use sdf_protocol::{JobMessage, Record, ResultMessage, TestError, TestResult};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::metrics::Metrics;
use crate::queue::{JobReceiver, ResultSender};

// ============================================================================
// Error Types
// ============================================================================

/// Infrastructure failures. Each one ends the worker that hit it.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker {worker_id}: test '{test}' failed fatally on record {seq}: {message}")]
    TestFunction {
        worker_id: usize,
        test: String,
        seq: u64,
        message: String,
    },

    #[error("worker {worker_id}: record id extraction failed on record {seq}: {message}")]
    IdExtractor {
        worker_id: usize,
        seq: u64,
        message: String,
    },

    #[error("worker {worker_id}: job queue closed before a sentinel arrived")]
    JobQueueClosed { worker_id: usize },

    #[error("worker {worker_id}: result queue closed")]
    ResultQueueClosed { worker_id: usize },

    #[error("worker {worker_id} panicked: {message}")]
    Panicked { worker_id: usize, message: String },

    #[error("failed to spawn worker {worker_id}: {source}")]
    Spawn {
        worker_id: usize,
        #[source]
        source: io::Error,
    },
}

impl WorkerError {
    pub fn worker_id(&self) -> usize {
        match self {
            WorkerError::TestFunction { worker_id, .. }
            | WorkerError::IdExtractor { worker_id, .. }
            | WorkerError::JobQueueClosed { worker_id }
            | WorkerError::ResultQueueClosed { worker_id }
            | WorkerError::Panicked { worker_id, .. }
            | WorkerError::Spawn { worker_id, .. } => *worker_id,
        }
    }

    /// True when the worker only stopped because the orchestrator went away.
    pub fn is_secondary(&self) -> bool {
        matches!(self, WorkerError::ResultQueueClosed { .. })
    }
}

// ============================================================================
// Test registration
// ============================================================================

/// `(record) -> outcome`. `Err(TestError::Failed)` becomes the outcome.
pub type TestFn = Arc<dyn Fn(&Record) -> Result<String, TestError> + Send + Sync>;

/// `(record) -> record id`. Must return an empty string rather than fail.
pub type IdExtractor = Arc<dyn Fn(&Record) -> String + Send + Sync>;

#[derive(Clone)]
pub struct RegisteredTest {
    name: String,
    func: TestFn,
}

impl RegisteredTest {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for RegisteredTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTest").field("name", &self.name).finish()
    }
}

/// Test functions in registration order plus the record id extractor.
#[derive(Clone)]
pub struct TestSuite {
    tests: Vec<RegisteredTest>,
    id_extractor: IdExtractor,
}

impl TestSuite {
    pub fn new<E>(id_extractor: E) -> Self
    where
        E: Fn(&Record) -> String + Send + Sync + 'static,
    {
        Self {
            tests: Vec::new(),
            id_extractor: Arc::new(id_extractor),
        }
    }

    /// Append a test. Results for one record follow registration order.
    pub fn register<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Record) -> Result<String, TestError> + Send + Sync + 'static,
    {
        self.tests.push(RegisteredTest {
            name: name.into(),
            func: Arc::new(func),
        });
        self
    }

    pub fn tests(&self) -> &[RegisteredTest] {
        &self.tests
    }

    pub fn test_names(&self) -> Vec<&str> {
        self.tests.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

impl fmt::Debug for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSuite")
            .field("tests", &self.test_names())
            .finish()
    }
}

// ============================================================================
// Worker
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub worker_id: usize,
    pub records_processed: u64,
    pub results_sent: u64,
}

/// One execution unit of the pool.
pub struct Worker {
    id: usize,
    suite: TestSuite,
    job_rx: JobReceiver,
    result_tx: ResultSender,
    metrics: Arc<Metrics>,
}

impl Worker {
    pub fn new(
        id: usize,
        suite: TestSuite,
        job_rx: JobReceiver,
        result_tx: ResultSender,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            id,
            suite,
            job_rx,
            result_tx,
            metrics,
        }
    }

    /// Main loop - consumes self (can only be called once).
    pub fn run(self) -> Result<WorkerStats, WorkerError> {
        let mut stats = WorkerStats {
            worker_id: self.id,
            ..Default::default()
        };

        loop {
            let msg = match self.job_rx.recv() {
                Ok(msg) => msg,
                Err(_) => return Err(self.fail(WorkerError::JobQueueClosed { worker_id: self.id })),
            };

            match msg {
                JobMessage::WorkerDone => {
                    self.result_tx
                        .send(ResultMessage::WorkerDone { worker_id: self.id })
                        .map_err(|_| WorkerError::ResultQueueClosed { worker_id: self.id })?;
                    info!(
                        "Worker {} done consuming records ({} processed)",
                        self.id, stats.records_processed
                    );
                    return Ok(stats);
                }
                JobMessage::Record(record) => {
                    if let Err(e) = self.process(&record, &mut stats) {
                        return Err(self.fail(e));
                    }
                }
            }
        }
    }

    fn process(&self, record: &Record, stats: &mut WorkerStats) -> Result<(), WorkerError> {
        let record_id = guarded(|| (self.suite.id_extractor)(record)).map_err(|message| {
            WorkerError::IdExtractor {
                worker_id: self.id,
                seq: record.seq(),
                message,
            }
        })?;

        for test in &self.suite.tests {
            let outcome = match guarded(|| (test.func)(record)) {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(TestError::Failed(message))) => {
                    self.metrics.inc_tests_failed();
                    message
                }
                Ok(Err(TestError::Fatal(err))) => {
                    return Err(WorkerError::TestFunction {
                        worker_id: self.id,
                        test: test.name.clone(),
                        seq: record.seq(),
                        message: format!("{:#}", err),
                    });
                }
                Err(panic_message) => {
                    return Err(WorkerError::TestFunction {
                        worker_id: self.id,
                        test: test.name.clone(),
                        seq: record.seq(),
                        message: format!("panicked: {}", panic_message),
                    });
                }
            };

            let result = TestResult::new(test.name.clone(), record_id.clone(), outcome);
            self.result_tx
                .send(ResultMessage::Result(result))
                .map_err(|_| WorkerError::ResultQueueClosed { worker_id: self.id })?;
            stats.results_sent += 1;
            self.metrics.inc_results_sent();
        }

        stats.records_processed += 1;
        self.metrics.inc_records_processed();
        debug!(worker = self.id, seq = record.seq(), id = %record_id, "Record processed");
        Ok(())
    }

    /// Report a fatal error to the aggregator, then hand it back.
    fn fail(&self, error: WorkerError) -> WorkerError {
        self.metrics.inc_worker_failures();
        error!("{}", error);
        if !error.is_secondary() {
            let _ = self.result_tx.send(ResultMessage::WorkerFailed {
                worker_id: self.id,
                error: error.to_string(),
            });
        }
        error
    }
}

fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ============================================================================
// Pool
// ============================================================================

/// Handles of the running workers.
pub struct WorkerPool {
    handles: Vec<(usize, JoinHandle<Result<WorkerStats, WorkerError>>)>,
}

impl WorkerPool {
    /// Start `workers` threads named `sdf-worker-{i}`.
    ///
    /// Each worker gets its own clone of both queue endpoints; the caller
    /// should drop its copies afterwards so disconnection is observable.
    pub fn spawn(
        workers: usize,
        suite: &TestSuite,
        job_rx: &JobReceiver,
        result_tx: &ResultSender,
        metrics: &Arc<Metrics>,
    ) -> Result<Self, WorkerError> {
        info!(
            "Distributing {} test function(s) over {} workers",
            suite.len(),
            workers
        );
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let worker = Worker::new(
                worker_id,
                suite.clone(),
                job_rx.clone(),
                result_tx.clone(),
                Arc::clone(metrics),
            );
            let handle = thread::Builder::new()
                .name(format!("sdf-worker-{}", worker_id))
                .spawn(move || worker.run())
                .map_err(|source| WorkerError::Spawn { worker_id, source })?;
            handles.push((worker_id, handle));
        }
        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker. Returns the first primary error, if any.
    ///
    /// `ResultQueueClosed` is only reported when nothing else went wrong.
    pub fn join(self) -> Result<Vec<WorkerStats>, WorkerError> {
        let mut stats = Vec::with_capacity(self.handles.len());
        let mut first_error: Option<WorkerError> = None;

        for (worker_id, handle) in self.handles {
            let outcome = handle.join().unwrap_or_else(|payload| {
                Err(WorkerError::Panicked {
                    worker_id,
                    message: panic_message(payload.as_ref()),
                })
            });
            match outcome {
                Ok(s) => stats.push(s),
                Err(e) => {
                    let replace = match &first_error {
                        None => true,
                        Some(existing) => existing.is_secondary() && !e.is_secondary(),
                    };
                    if replace {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}
