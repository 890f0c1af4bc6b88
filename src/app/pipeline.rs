//! Shared fit workflows behind the CLI commands.
//!
//! Each workflow goes: read inputs -> build fit -> apply parameter options ->
//! fit -> optional export. Printing is left to [`crate::app`].

use std::sync::Arc;

use crate::cli::{CommonFitArgs, FitArgs, MultifitArgs, SimulateArgs};
use crate::data::{Dataset, SampleSpec, XYDataset, generate_sample};
use crate::domain::{FitConfig, FitResult, ParamRef};
use crate::error::FitError;
use crate::fit::{Fit, FitOptions, Multifit};
use crate::io::{read_dataset, write_dataset_file, write_result_json};
use crate::models::by_name;
use crate::observer::default_observer;

/// Environment configuration with the command-line overrides applied.
pub fn fit_config_from_args(base: FitConfig, args: &CommonFitArgs) -> Result<FitConfig, FitError> {
    let mut config = base;
    if let Some(level) = args.significance_level {
        config.significance_level = level;
    }
    if let Some(cap) = args.max_x_iterations {
        config.max_x_iterations = cap;
    }
    if let Some(dir) = &args.log_dir {
        config.log_dir = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

pub fn run_single_fit(args: &FitArgs, config: FitConfig) -> Result<FitResult, FitError> {
    let dataset = read_dataset(&args.data)?;
    let function = by_name(&args.model)?;
    let options = FitOptions {
        config,
        observer: default_observer(),
        label: dataset.basename().map(str::to_string),
    };
    let mut fit = Fit::with_options(Arc::new(dataset), function, options)?;

    for start in &args.starts {
        fit.set_parameter(start.name.as_str(), start.spec)?;
    }
    if !args.fixed.is_empty() {
        fit.fix_parameters(&args.fixed)?;
    }
    apply_constraints(&args.common, |names, values, sigmas| {
        fit.constrain_parameters(names, values, sigmas)
    })?;

    let result = fit.do_fit(args.common.quiet, args.common.verbose)?;
    if let Some(path) = &args.common.export {
        write_result_json(path, &result)?;
    }
    Ok(result)
}

pub fn run_multifit(args: &MultifitArgs, config: FitConfig) -> Result<FitResult, FitError> {
    let mut multifit: Multifit = Multifit::with_options(FitOptions {
        config,
        observer: default_observer(),
        label: args.label.clone(),
    });
    for pair in &args.pairs {
        let dataset = read_dataset(&pair.data)?;
        multifit.add_pair(Arc::new(dataset), by_name(&pair.model)?)?;
    }
    if args.autolink {
        multifit.autolink_parameters()?;
    }

    for fix in &args.fixed {
        let reference = ParamRef::from(fix.name.as_str());
        match fix.value {
            Some(value) => multifit.fix_parameters([reference], Some(&[value]))?,
            None => multifit.fix_parameters([reference], None)?,
        }
    }
    apply_constraints(&args.common, |names, values, sigmas| {
        multifit.constrain_parameters(names, values, sigmas)
    })?;

    let result = multifit.do_fit(args.common.quiet, args.common.verbose)?;
    if let Some(path) = &args.common.export {
        write_result_json(path, &result)?;
    }
    Ok(result)
}

fn apply_constraints<F>(args: &CommonFitArgs, mut constrain: F) -> Result<(), FitError>
where
    F: FnMut(Vec<String>, &[f64], &[f64]) -> Result<(), FitError>,
{
    if args.constraints.is_empty() {
        return Ok(());
    }
    let names = args.constraints.iter().map(|c| c.name.clone()).collect();
    let values: Vec<f64> = args.constraints.iter().map(|c| c.constraint.target).collect();
    let sigmas: Vec<f64> = args.constraints.iter().map(|c| c.constraint.sigma).collect();
    constrain(names, &values, &sigmas)
}

pub fn run_simulation(args: &SimulateArgs) -> Result<XYDataset, FitError> {
    let function = by_name(&args.model)?;
    let spec = SampleSpec {
        x_min: args.x_min,
        x_max: args.x_max,
        points: args.points,
        x_error: args.x_error,
        y_error: args.y_error,
        seed: args.seed,
    };
    let dataset = generate_sample(&function, &args.params, &spec)?;
    write_dataset_file(&args.out, &dataset)?;
    Ok(dataset)
}
