//! Command-line parsing for the `chi2fit` binary.
//!
//! Argument parsing and value parsing live here; command dispatch lives in
//! [`crate::app`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Constraint, ParamSpec};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "chi2fit", version, about = "Chi2 fits with x and y uncertainties")]
pub struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one model to one dataset file.
    Fit(FitArgs),
    /// Fit several dataset/model pairs with shared parameters.
    Multifit(MultifitArgs),
    /// Write a synthetic dataset drawn around a model.
    Simulate(SimulateArgs),
}

/// Options shared by `fit` and `multifit`.
#[derive(Debug, Args, Clone)]
pub struct CommonFitArgs {
    /// Gaussian constraint `name=value:sigma` (repeatable).
    #[arg(long = "constrain", value_name = "NAME=V:SIGMA", value_parser = parse_constraint)]
    pub constraints: Vec<ConstraintArg>,

    /// Do not print the report.
    #[arg(long)]
    pub quiet: bool,

    /// Log every minimizer iteration.
    #[arg(long)]
    pub verbose: bool,

    /// Write `<basename>.log` reports into this directory.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Export the fit result to JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Significance level of the chi2 hypothesis test.
    #[arg(long)]
    pub significance_level: Option<f64>,

    /// Cap on x-error projection passes.
    #[arg(long)]
    pub max_x_iterations: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Dataset JSON file.
    #[arg(long, value_name = "JSON")]
    pub data: PathBuf,

    /// Fit function name: constant_1par, linear_2par, quadratic_3par, exp_2par or gauss_3par.
    #[arg(long)]
    pub model: String,

    /// Start value `name=value` or `name=value:error` (repeatable).
    #[arg(long = "start", value_name = "NAME=V[:ERR]", value_parser = parse_start)]
    pub starts: Vec<StartArg>,

    /// Fix a parameter at its start value (repeatable).
    #[arg(long = "fix", value_name = "NAME")]
    pub fixed: Vec<String>,

    #[command(flatten)]
    pub common: CommonFitArgs,
}

#[derive(Debug, Args, Clone)]
pub struct MultifitArgs {
    /// Dataset/model pair `data.json:model` (repeatable, at least one).
    #[arg(long = "pair", value_name = "JSON:MODEL", value_parser = parse_pair, required = true)]
    pub pairs: Vec<PairArg>,

    /// Link parameters with the same name across pairs.
    #[arg(long)]
    pub autolink: bool,

    /// Fix a parameter, optionally at a value: `name` or `name=value` (repeatable).
    #[arg(long = "fix", value_name = "NAME[=V]", value_parser = parse_fix)]
    pub fixed: Vec<FixArg>,

    /// Name used for the log file and the exported result.
    #[arg(long)]
    pub label: Option<String>,

    #[command(flatten)]
    pub common: CommonFitArgs,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Fit function name.
    #[arg(long)]
    pub model: String,

    /// True parameter values, comma separated.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub params: Vec<f64>,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub x_min: f64,

    #[arg(long, default_value_t = 10.0, allow_hyphen_values = true)]
    pub x_max: f64,

    #[arg(long, default_value_t = 20)]
    pub points: usize,

    /// Gaussian smearing (and recorded error) of x.
    #[arg(long, default_value_t = 0.0)]
    pub x_error: f64,

    /// Gaussian smearing (and recorded error) of y.
    #[arg(long, default_value_t = 0.1)]
    pub y_error: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output dataset JSON file.
    #[arg(long, value_name = "JSON")]
    pub out: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartArg {
    pub name: String,
    pub spec: ParamSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintArg {
    pub name: String,
    pub constraint: Constraint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixArg {
    pub name: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairArg {
    pub data: PathBuf,
    pub model: String,
}

fn split_assignment(raw: &str) -> Result<(&str, &str), String> {
    match raw.split_once('=') {
        Some((name, rest)) if !name.trim().is_empty() => Ok((name.trim(), rest.trim())),
        _ => Err(format!("expected `name=...`, got `{raw}`")),
    }
}

fn parse_number(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>().map_err(|_| format!("`{raw}` is not a number"))
}

/// `name=value` or `name=value:error`
pub fn parse_start(raw: &str) -> Result<StartArg, String> {
    let (name, rest) = split_assignment(raw)?;
    let spec = match rest.split_once(':') {
        Some((value, error)) => ParamSpec::ValueError(parse_number(value)?, parse_number(error)?),
        None => ParamSpec::Value(parse_number(rest)?),
    };
    Ok(StartArg {
        name: name.to_string(),
        spec,
    })
}

/// `name=value:sigma`
pub fn parse_constraint(raw: &str) -> Result<ConstraintArg, String> {
    let (name, rest) = split_assignment(raw)?;
    let (value, sigma) = rest
        .split_once(':')
        .ok_or_else(|| format!("expected `name=value:sigma`, got `{raw}`"))?;
    Ok(ConstraintArg {
        name: name.to_string(),
        constraint: Constraint::new(parse_number(value)?, parse_number(sigma)?),
    })
}

/// `name` or `name=value`
pub fn parse_fix(raw: &str) -> Result<FixArg, String> {
    if !raw.contains('=') {
        return Ok(FixArg {
            name: raw.trim().to_string(),
            value: None,
        });
    }
    let (name, value) = split_assignment(raw)?;
    Ok(FixArg {
        name: name.to_string(),
        value: Some(parse_number(value)?),
    })
}

/// `path:model`, split at the last colon so paths may contain colons.
pub fn parse_pair(raw: &str) -> Result<PairArg, String> {
    match raw.rsplit_once(':') {
        Some((data, model)) if !data.is_empty() && !model.is_empty() => Ok(PairArg {
            data: PathBuf::from(data),
            model: model.to_string(),
        }),
        _ => Err(format!("expected `data.json:model`, got `{raw}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_values_with_and_without_errors() {
        assert_eq!(
            parse_start("slope=2.5").unwrap(),
            StartArg {
                name: "slope".to_string(),
                spec: ParamSpec::Value(2.5)
            }
        );
        assert_eq!(
            parse_start("slope = -1:0.2").unwrap().spec,
            ParamSpec::ValueError(-1.0, 0.2)
        );
        assert!(parse_start("=1").is_err());
        assert!(parse_start("slope=abc").is_err());
    }

    #[test]
    fn constraints_need_a_sigma() {
        let c = parse_constraint("p3=19.0:0.5").unwrap();
        assert_eq!(c.constraint, Constraint::new(19.0, 0.5));
        assert!(parse_constraint("p3=19.0").is_err());
    }

    #[test]
    fn fix_with_optional_value() {
        assert_eq!(parse_fix("p3").unwrap().value, None);
        assert_eq!(parse_fix("p3=19").unwrap().value, Some(19.0));
    }

    #[test]
    fn pairs_split_at_last_colon() {
        let p = parse_pair("data/iu.json:linear_2par").unwrap();
        assert_eq!(p.data, PathBuf::from("data/iu.json"));
        assert_eq!(p.model, "linear_2par");
        assert!(parse_pair("nomodel").is_err());
    }

    #[test]
    fn cli_parses_a_full_fit_command() {
        let cli = Cli::try_parse_from([
            "chi2fit",
            "--log-level",
            "info",
            "fit",
            "--data",
            "points.json",
            "--model",
            "linear_2par",
            "--start",
            "slope=2:0.1",
            "--fix",
            "y_intercept",
            "--constrain",
            "slope=2:0.5",
            "--quiet",
        ])
        .unwrap();
        assert_eq!(cli.log_level, tracing::Level::INFO);
        match cli.command {
            Command::Fit(args) => {
                assert_eq!(args.starts.len(), 1);
                assert_eq!(args.fixed, vec!["y_intercept".to_string()]);
                assert_eq!(args.common.constraints.len(), 1);
                assert!(args.common.quiet);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn simulate_accepts_negative_parameters() {
        let cli = Cli::try_parse_from([
            "chi2fit", "simulate", "--model", "linear_2par", "--params", "-1.5,2", "--out", "s.json",
        ])
        .unwrap();
        match cli.command {
            Command::Simulate(args) => assert_eq!(args.params, vec![-1.5, 2.0]),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
