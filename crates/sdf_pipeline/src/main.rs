//! sdf-pipeline: parallel batch testing of gzip SDF archives.
//!
//! ```text
//! sdf-pipeline invariance --archive mcule.sdf.gz --result-destination log.tsv
//! sdf-pipeline regression --archive mcule.sdf.gz --result-destination ref.sqlite --compute-reference
//! sdf-pipeline regression --archive mcule.sdf.gz --result-destination run.sqlite --regression-reference ref.sqlite
//! sdf-pipeline all --archive mcule.sdf.gz --result-destination run.sqlite --regression-reference ref.sqlite
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser, Subcommand};
use sdf_logging::{init_logging, LogConfig};
use tracing::error;

mod cli;

use cli::RunArgs;

#[derive(Parser, Debug)]
#[command(
    name = "sdf-pipeline",
    version,
    about = "Run test functions over every structure in a gzip SDF archive"
)]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that canonical forms do not change when atoms are renumbered
    Invariance {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Compare canonical forms against a reference run, or compute the reference
    #[command(group(
        ArgGroup::new("reference")
            .required(true)
            .args(["regression_reference", "compute_reference"])
    ))]
    Regression {
        #[command(flatten)]
        run: RunArgs,

        /// Results of an earlier --compute-reference run to compare against
        #[arg(long)]
        regression_reference: Option<PathBuf>,

        /// Write reference results for later comparisons
        #[arg(long)]
        compute_reference: bool,
    },

    /// Invariance, then regression (computes a reference when none is given)
    All {
        #[command(flatten)]
        run: RunArgs,

        /// Results of an earlier --compute-reference run to compare against
        #[arg(long)]
        regression_reference: Option<PathBuf>,
    },
}

impl Commands {
    fn run_args(&self) -> &RunArgs {
        match self {
            Commands::Invariance { run }
            | Commands::Regression { run, .. }
            | Commands::All { run, .. } => run,
        }
    }
}

fn run_command(command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Invariance { run } => cli::run_invariance(run),
        Commands::Regression {
            run,
            regression_reference,
            compute_reference,
        } => cli::run_regression(run, regression_reference.as_deref(), *compute_reference),
        Commands::All {
            run,
            regression_reference,
        } => cli::run_all(run, regression_reference.as_deref()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "sdf-pipeline",
        verbose: cli.verbose,
        log_dir: None,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    let json_mode = cli.command.run_args().json;
    match run_command(&cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdf_pipeline::IdSource;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("sdf-pipeline").chain(args.iter().copied()))
    }

    #[test]
    fn test_invariance_defaults() {
        let cli = parse(&["invariance", "--archive", "a.sdf.gz"]).unwrap();
        let run = cli.command.run_args();
        assert_eq!(run.result_destination, ":memory:");
        assert_eq!(run.id, IdSource::Mcule);
        assert_eq!(run.queue_capacity, 1024);
        assert!(!run.json);
    }

    #[test]
    fn test_archive_is_required() {
        assert!(parse(&["invariance"]).is_err());
    }

    #[test]
    fn test_regression_requires_exactly_one_reference_flag() {
        assert!(parse(&["regression", "--archive", "a.sdf.gz"]).is_err());
        assert!(parse(&[
            "regression",
            "--archive",
            "a.sdf.gz",
            "--compute-reference",
            "--regression-reference",
            "ref.sqlite",
        ])
        .is_err());

        let cli = parse(&["regression", "--archive", "a.sdf.gz", "--compute-reference"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Regression {
                compute_reference: true,
                regression_reference: None,
                ..
            }
        ));
    }

    #[test]
    fn test_all_reference_is_optional() {
        let cli = parse(&["all", "--archive", "a.sdf.gz", "--id", "tag:PUBCHEM_COMPOUND_CID", "-v"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::All {
                run,
                regression_reference,
            } => {
                assert!(regression_reference.is_none());
                assert_eq!(run.id, IdSource::Tag("PUBCHEM_COMPOUND_CID".into()));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_id_source_is_rejected() {
        assert!(parse(&["invariance", "--archive", "a.sdf.gz", "--id", "chembl"]).is_err());
    }
}
