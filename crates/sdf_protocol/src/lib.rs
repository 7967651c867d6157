//! Shared data model for the SDF test pipeline.
//!
//! Records flow from the archive reader through the job queue to the worker
//! pool; test results flow back through the result queue to the aggregator.
//! Both queues carry tagged messages, so end-of-stream is a variant and never
//! a magic data value:
//!
//! ```text
//! Job queue:    Record(..) .. Record(..) WorkerDone x W
//! Result queue: Result(..) .. WorkerDone{id} | WorkerFailed{id, error}
//! ```

pub mod config;
pub mod defaults;
pub mod types;

pub use config::{ConfigError, PipelineConfig};
pub use types::{JobMessage, Record, ResultMessage, ResultSet, TestError, TestResult};
