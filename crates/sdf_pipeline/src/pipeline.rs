//! Pipeline orchestration: one producer thread, W workers, and the
//! aggregator on the calling thread.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use sdf_protocol::{ConfigError, PipelineConfig};
use sdf_sinks::{ResultSink, SinkError};
use sdf_worker::{
    job_channel, open_archive, produce, result_channel, Metrics, MetricsSnapshot, ProducerStats,
    QueueError, ReaderError, TestSuite, WorkerError, WorkerPool,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::aggregator::{AggregateError, AggregateStats, Aggregator};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] ReaderError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Producer(#[from] QueueError),

    #[error("Failed to spawn producer thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("Producer thread panicked")]
    ProducerPanicked,

    #[error("Failed to flush results: {0}")]
    Sink(#[from] SinkError),
}

impl PipelineError {
    /// Worker named by the failure, when there is one.
    pub fn worker_id(&self) -> Option<usize> {
        match self {
            PipelineError::Aggregate(AggregateError::WorkerFailed { worker_id, .. }) => {
                Some(*worker_id)
            }
            PipelineError::Worker(e) => Some(e.worker_id()),
            _ => None,
        }
    }
}

/// Totals for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub records_read: u64,
    pub results_written: u64,
    pub workers_finished: usize,
    /// Results whose outcome is not `passed`.
    pub failures: u64,
    pub elapsed: Duration,
    pub metrics: MetricsSnapshot,
}

/// Stream `config.archive_path` through `suite`, writing results to `sink`.
///
/// Input errors are returned before any thread starts. The sink is flushed
/// but left open.
pub fn run_pipeline(
    config: &PipelineConfig,
    suite: &TestSuite,
    sink: &mut dyn ResultSink,
) -> Result<PipelineReport, PipelineError> {
    let started = Instant::now();
    config.validate()?;
    let records = open_archive(&config.archive_path, &config.delimiter)?;

    info!(
        "Running {} test(s) over {} with {} workers",
        suite.len(),
        config.archive_path.display(),
        config.workers
    );

    let metrics = Arc::new(Metrics::new());
    let (job_tx, job_rx) = job_channel(config.job_queue_capacity);
    let (result_tx, result_rx) = result_channel(config.result_queue_capacity);

    let pool = WorkerPool::spawn(config.workers, suite, &job_rx, &result_tx, &metrics)?;
    // Workers hold the only receivers and senders from here on, so a dead
    // worker shows up as a disconnected queue.
    drop(job_rx);
    drop(result_tx);

    let workers = config.workers;
    let producer_metrics = Arc::clone(&metrics);
    let producer = thread::Builder::new()
        .name("sdf-producer".to_string())
        .spawn(move || produce(records, &job_tx, workers, &producer_metrics));
    let producer = match producer {
        Ok(handle) => handle,
        Err(e) => {
            drop(result_rx);
            if let Err(worker_err) = pool.join() {
                warn!("Worker exited while aborting: {}", worker_err);
            }
            return Err(PipelineError::Spawn(e));
        }
    };

    let aggregated = Aggregator::new(workers, &mut *sink).run(&result_rx);
    // Unblocks workers and the producer if aggregation stopped early.
    drop(result_rx);

    let produced = join_producer(producer);
    let joined = pool.join();
    let flushed = sink.flush();

    let outcome: Result<(AggregateStats, ProducerStats), PipelineError> = match (aggregated, produced) {
        (Err(e), _) => Err(e.into()),
        (Ok(_), Err(e)) => Err(e),
        (Ok(stats), Ok(producer_stats)) => Ok((stats, producer_stats)),
    };
    let outcome = match (outcome, joined) {
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(primary), Err(e)) => {
            if !e.is_secondary() {
                warn!("Worker also failed: {}", e);
            }
            Err(primary)
        }
        (outcome, Ok(_)) => outcome,
    };
    let (stats, producer_stats) = match (outcome, flushed) {
        (Ok(v), Ok(())) => v,
        (Ok(_), Err(e)) => return Err(e.into()),
        (Err(primary), flushed) => {
            if let Err(e) = flushed {
                warn!("Failed to flush partial results: {}", e);
            }
            error!("Pipeline failed: {}", primary);
            return Err(primary);
        }
    };

    let report = PipelineReport {
        records_read: producer_stats.records_sent,
        results_written: stats.results_written,
        workers_finished: stats.workers_finished,
        failures: stats.failures,
        elapsed: started.elapsed(),
        metrics: metrics.snapshot(),
    };
    info!(
        "Pipeline complete: {} records, {} results, {} not passed in {:.2?}",
        report.records_read, report.results_written, report.failures, report.elapsed
    );
    Ok(report)
}

fn join_producer(
    handle: JoinHandle<Result<ProducerStats, QueueError>>,
) -> Result<ProducerStats, PipelineError> {
    match handle.join() {
        Ok(result) => result.map_err(PipelineError::from),
        Err(_) => Err(PipelineError::ProducerPanicked),
    }
}
