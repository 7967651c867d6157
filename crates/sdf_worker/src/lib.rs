//! Streaming and execution half of the SDF test pipeline.
//!
//! - `reader`: lazy record iterator over a gzip SDF archive
//! - `queue`: job/result channels and the producer with its sentinel protocol
//! - `worker`: the worker pool that runs registered test functions
//! - `metrics`: lock-free run counters

pub mod metrics;
pub mod queue;
pub mod reader;
pub mod worker;

pub use metrics::{Metrics, MetricsSnapshot};
pub use queue::{
    job_channel, produce, result_channel, JobReceiver, JobSender, ProducerStats, QueueError,
    ResultReceiver, ResultSender,
};
pub use reader::{open_archive, ArchiveReader, ReaderError, RecordReader};
pub use worker::{IdExtractor, TestFn, TestSuite, Worker, WorkerError, WorkerPool, WorkerStats};
