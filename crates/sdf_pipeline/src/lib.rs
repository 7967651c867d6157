//! SDF Pipeline
//!
//! Streams structure records out of a gzip SDF archive, runs every record
//! through a suite of test functions on a fixed pool of worker threads, and
//! logs one result per (record, test) pair.
//!
//! ```text
//! reader -> job queue -> worker pool -> result queue -> aggregator -> sink
//!                                                               \
//!                                    reference -> regression engine
//! ```

pub mod aggregator;
pub mod consumers;
pub mod driver;
pub mod ids;
pub mod molfile;
pub mod pipeline;

pub use aggregator::{AggregateError, AggregateStats, Aggregator, AggregatorState};
pub use driver::{DriverError, InvarianceSummary, RegressionSummary};
pub use ids::IdSource;
pub use pipeline::{run_pipeline, PipelineError, PipelineReport};
