//! Run-time knobs for fitting and reporting.

use std::path::PathBuf;

use crate::error::FitError;

pub const ENV_SIGNIFICANCE_LEVEL: &str = "CHI2FIT_SIGNIFICANCE_LEVEL";
pub const ENV_ERROR_PLACES: &str = "CHI2FIT_ERROR_PLACES";
pub const ENV_MAX_X_ITERATIONS: &str = "CHI2FIT_MAX_X_ITERATIONS";
pub const ENV_LOG_DIR: &str = "CHI2FIT_LOG_DIR";

#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    /// Significance level of the chi2 hypothesis test in the report.
    pub significance_level: f64,
    /// Significant places used when rounding errors for display.
    pub error_places: u32,
    /// Cap on x-projection passes.
    pub max_x_iterations: usize,
    /// Relative tolerance for covariance convergence (absolute tolerance is 0).
    pub cov_rtol: f64,
    /// Where per-fit log files go; `None` disables log files.
    pub log_dir: Option<PathBuf>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            error_places: 2,
            max_x_iterations: 10,
            cov_rtol: 1e-4,
            log_dir: None,
        }
    }
}

impl FitConfig {
    /// Defaults overridden by `CHI2FIT_*` variables (a `.env` file is honoured).
    pub fn from_env() -> Result<Self, FitError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FitError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_SIGNIFICANCE_LEVEL) {
            config.significance_level = parse_var(ENV_SIGNIFICANCE_LEVEL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ERROR_PLACES) {
            config.error_places = parse_var(ENV_ERROR_PLACES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_X_ITERATIONS) {
            config.max_x_iterations = parse_var(ENV_MAX_X_ITERATIONS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LOG_DIR) {
            if !raw.trim().is_empty() {
                config.log_dir = Some(PathBuf::from(raw.trim()));
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FitError> {
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(FitError::InvalidConfig(format!(
                "significance level must be in (0, 1), got {}",
                self.significance_level
            )));
        }
        if self.error_places == 0 {
            return Err(FitError::InvalidConfig(
                "error places must be at least 1".to_string(),
            ));
        }
        if self.max_x_iterations == 0 {
            return Err(FitError::InvalidConfig(
                "max x iterations must be at least 1".to_string(),
            ));
        }
        if !(self.cov_rtol.is_finite() && self.cov_rtol >= 0.0) {
            return Err(FitError::InvalidConfig(format!(
                "covariance rtol must be a non-negative number, got {}",
                self.cov_rtol
            )));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, FitError> {
    raw.trim()
        .parse()
        .map_err(|_| FitError::InvalidConfig(format!("{key}={raw:?} is not a valid value")))
}
