//! CLI command implementations

pub mod error;
pub mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use sdf_pipeline::consumers::{invariance_suite, regression_suite};
use sdf_pipeline::driver;
use sdf_pipeline::{IdSource, PipelineError};
use sdf_protocol::defaults::{DEFAULT_JOB_QUEUE_CAPACITY, DEFAULT_RESULT_DESTINATION, DEFAULT_WORKERS};
use sdf_protocol::{PipelineConfig, ResultSet};
use sdf_sinks::{load_results, open_sink, Destination, ResultSink};
use tracing::{info, warn};

use error::HelpfulError;

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Gzip-compressed SDF archive to test
    #[arg(long)]
    pub archive: PathBuf,

    /// Where results go: ':memory:', a .sqlite/.sqlite3/.db file, or a tab-separated file
    #[arg(long, default_value = DEFAULT_RESULT_DESTINATION)]
    pub result_destination: String,

    /// Number of worker threads
    #[arg(long, env = "SDF_PIPELINE_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Capacity of the job and result queues (0 = unbounded)
    #[arg(long, default_value_t = DEFAULT_JOB_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Record id source: mcule, pubchem or tag:<NAME>
    #[arg(long, default_value = "mcule")]
    pub id: IdSource,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        if !self.archive.exists() {
            return Err(HelpfulError::archive_not_found(&self.archive).into());
        }
        let capacity = (self.queue_capacity > 0).then_some(self.queue_capacity);
        let config = PipelineConfig::new(&self.archive)
            .with_workers(self.workers)
            .with_job_queue_capacity(capacity)
            .with_result_queue_capacity(capacity);
        config
            .validate()
            .map_err(|e| HelpfulError::from_pipeline(&PipelineError::from(e)))?;
        Ok(config)
    }

    fn open_sink(&self) -> Result<(Destination, Box<dyn ResultSink>)> {
        let destination = Destination::parse(&self.result_destination)
            .context("Invalid --result-destination")?;
        let sink = open_sink(&destination)
            .with_context(|| format!("Failed to open result destination {}", destination))?;
        Ok((destination, sink))
    }
}

pub fn run_invariance(args: &RunArgs) -> Result<()> {
    let config = args.pipeline_config()?;
    let suite = invariance_suite(&args.id).context("Invalid --id")?;
    let (_, mut sink) = args.open_sink()?;

    let summary = driver::invariance(&config, &suite, sink.as_mut())
        .map_err(|e| HelpfulError::from_pipeline(&e))?;
    sink.finish().context("Failed to close result destination")?;

    output::print_invariance(&summary, args.json);
    Ok(())
}

pub fn run_regression(args: &RunArgs, reference: Option<&Path>, compute_reference: bool) -> Result<()> {
    let config = args.pipeline_config()?;
    let suite = regression_suite(&args.id).context("Invalid --id")?;

    // Loaded before the sink opens: the two may name the same file.
    let reference = match reference {
        Some(path) if !compute_reference => Some(load_reference(path, &args.result_destination)?),
        _ => None,
    };
    let (destination, mut sink) = args.open_sink()?;

    match reference {
        Some(reference) => {
            let summary = driver::regression(&config, &suite, &reference, sink.as_mut())
                .map_err(|e| HelpfulError::from_driver(&e))?;
            sink.finish().context("Failed to close result destination")?;
            output::print_regression(&summary, args.json);
        }
        None => {
            if !destination.is_persistent() {
                warn!("Reference results go to {}, they will not be kept", destination);
            }
            let report = driver::compute_reference(&config, &suite, sink.as_mut())
                .map_err(|e| HelpfulError::from_pipeline(&e))?;
            sink.finish().context("Failed to close result destination")?;
            output::print_reference(&report, &destination.to_string(), args.json);
        }
    }
    Ok(())
}

/// Invariance, then regression into the same destination.
pub fn run_all(args: &RunArgs, reference: Option<&Path>) -> Result<()> {
    let config = args.pipeline_config()?;
    let invariance = invariance_suite(&args.id).context("Invalid --id")?;
    let regression = regression_suite(&args.id).context("Invalid --id")?;

    let reference = reference
        .map(|path| load_reference(path, &args.result_destination))
        .transpose()?;
    let (destination, mut sink) = args.open_sink()?;

    let summary = driver::invariance(&config, &invariance, sink.as_mut())
        .map_err(|e| HelpfulError::from_pipeline(&e))?;
    output::print_invariance(&summary, args.json);

    match reference {
        Some(reference) => {
            let summary = driver::regression(&config, &regression, &reference, sink.as_mut())
                .map_err(|e| HelpfulError::from_driver(&e))?;
            output::print_regression(&summary, args.json);
        }
        None => {
            info!("No reference given, computing one");
            let report = driver::compute_reference(&config, &regression, sink.as_mut())
                .map_err(|e| HelpfulError::from_pipeline(&e))?;
            output::print_reference(&report, &destination.to_string(), args.json);
        }
    }

    sink.finish().context("Failed to close result destination")?;
    Ok(())
}

fn load_reference(path: &Path, result_destination: &str) -> Result<ResultSet> {
    let destination = Destination::parse(&path.to_string_lossy())
        .context("Invalid --regression-reference")?;
    if !destination.is_persistent() {
        return Err(HelpfulError::memory_reference().into());
    }
    if !path.exists() {
        return Err(HelpfulError::reference_not_found(path).into());
    }
    if Path::new(result_destination) == path {
        warn!(
            "Reference and result destination are both {}; verdicts will be written into the reference",
            path.display()
        );
    }

    let reference = load_results(&destination)
        .with_context(|| format!("Failed to load reference results from {}", path.display()))?;
    info!("Loaded {} reference results from {}", reference.len(), path.display());
    Ok(reference)
}
