//! Result Aggregator
//!
//! Sole consumer of the result queue. Writes every result to the sink and
//! counts worker sentinels until all W workers have reported.
//!
//! State machine:
//! ```text
//! NotStarted -> Running -> Draining -> Complete
//!                  (first sentinel)  (W sentinels)
//! ```
//! A `WorkerFailed` message or a disconnected queue ends aggregation with an
//! error instead of waiting for sentinels that will never come.

use sdf_protocol::{ResultMessage, TestResult};
use sdf_sinks::{ResultSink, SinkError};
use sdf_worker::ResultReceiver;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("worker {worker_id} failed: {error}")]
    WorkerFailed { worker_id: usize, error: String },

    #[error("result queue closed after {workers_finished} of {expected} workers finished")]
    QueueClosed {
        workers_finished: usize,
        expected: usize,
    },

    #[error("failed to write result: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    NotStarted,
    Running,
    Draining,
    Complete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub results_written: u64,
    pub workers_finished: usize,
    /// Results whose outcome is not `passed`.
    pub failures: u64,
}

pub struct Aggregator<'a> {
    expected_workers: usize,
    sink: &'a mut dyn ResultSink,
    state: AggregatorState,
    stats: AggregateStats,
}

impl<'a> Aggregator<'a> {
    pub fn new(expected_workers: usize, sink: &'a mut dyn ResultSink) -> Self {
        Self {
            expected_workers,
            sink,
            state: AggregatorState::NotStarted,
            stats: AggregateStats::default(),
        }
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    pub fn stats(&self) -> AggregateStats {
        self.stats
    }

    /// Drain the result queue until every worker has sent its sentinel.
    pub fn run(&mut self, result_rx: &ResultReceiver) -> Result<AggregateStats, AggregateError> {
        self.transition(AggregatorState::Running);

        while self.stats.workers_finished < self.expected_workers {
            let msg = result_rx.recv().map_err(|_| {
                let err = AggregateError::QueueClosed {
                    workers_finished: self.stats.workers_finished,
                    expected: self.expected_workers,
                };
                error!("{}", err);
                err
            })?;
            self.handle(msg)?;
        }

        self.transition(AggregatorState::Complete);
        info!(
            "Aggregated {} results from {} workers",
            self.stats.results_written, self.stats.workers_finished
        );
        Ok(self.stats)
    }

    fn handle(&mut self, msg: ResultMessage) -> Result<(), AggregateError> {
        match msg {
            ResultMessage::Result(result) => self.write(&result),
            ResultMessage::WorkerDone { worker_id } => {
                self.stats.workers_finished += 1;
                debug!(
                    worker_id,
                    finished = self.stats.workers_finished,
                    expected = self.expected_workers,
                    "Worker sentinel received"
                );
                if self.state == AggregatorState::Running {
                    self.transition(AggregatorState::Draining);
                }
                Ok(())
            }
            ResultMessage::WorkerFailed { worker_id, error } => {
                error!("Worker {} failed, stopping aggregation: {}", worker_id, error);
                Err(AggregateError::WorkerFailed { worker_id, error })
            }
        }
    }

    fn write(&mut self, result: &TestResult) -> Result<(), AggregateError> {
        self.sink.append(result)?;
        self.stats.results_written += 1;
        if !result.is_passed() {
            self.stats.failures += 1;
        }
        Ok(())
    }

    fn transition(&mut self, next: AggregatorState) {
        debug!("Aggregator {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
