//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - installs the tracing subscriber
//! - loads configuration from the environment and applies CLI overrides
//! - runs the requested fit or simulation
//! - prints reports

use clap::Parser;

use crate::cli::{Command, FitArgs, MultifitArgs, SimulateArgs};
use crate::data::Dataset;
use crate::domain::{Axis, FitConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `chi2fit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Multifit(args) => handle_multifit(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = pipeline::fit_config_from_args(FitConfig::from_env()?, &args.common)?;
    let result = pipeline::run_single_fit(&args, config)?;
    if !args.common.quiet {
        if let Some(report) = &result.report {
            println!("{report}");
        }
    }
    Ok(())
}

fn handle_multifit(args: MultifitArgs) -> Result<(), AppError> {
    let config = pipeline::fit_config_from_args(FitConfig::from_env()?, &args.common)?;
    let result = pipeline::run_multifit(&args, config)?;
    if !args.common.quiet {
        if let Some(report) = &result.report {
            println!("{report}");
        }
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let dataset = pipeline::run_simulation(&args)?;
    println!(
        "wrote {} points ({} model) to {}",
        dataset.size(),
        args.model,
        args.out.display()
    );
    tracing::debug!(
        x_errors = dataset.has_errors(Axis::X),
        y_errors = dataset.has_errors(Axis::Y),
        "simulated dataset"
    );
    Ok(())
}
