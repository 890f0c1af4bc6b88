//! Numerical minimizers behind a small strategy trait.
//!
//! The fit engine talks to a minimizer only through [`Minimizer`]:
//!
//! - it is built from parameter names, start values and start errors
//! - parameters can be fixed and released between calls
//! - `minimize` receives the objective for that call only
//! - results are read back as values, errors, an error matrix and fit info
//!
//! [`QuasiNewtonMinimizer`] is the implementation shipped with the crate: an
//! adapter over `argmin`'s L-BFGS with `finitediff` derivatives.

use nalgebra::DMatrix;
use serde::Serialize;

use crate::error::FitError;
use crate::math::chi2_probability;

pub mod adapter;
pub mod finite_diff;
pub mod quasi_newton;

pub use quasi_newton::*;

/// Everything a minimizer needs at construction; the parameter count is implied.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizerSetup {
    pub names: Vec<String>,
    pub values: Vec<f64>,
    pub errors: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitInfo {
    /// Objective value at the minimum.
    pub fcn: f64,
    /// Estimated distance to minimum.
    pub edm: f64,
    /// Objective change that defines one standard error ("UP").
    pub err_def: f64,
    pub status_code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitInfoKey {
    Fcn,
    Edm,
    ErrDef,
    StatusCode,
}

impl FitInfo {
    pub fn get(&self, key: FitInfoKey) -> f64 {
        match key {
            FitInfoKey::Fcn => self.fcn,
            FitInfoKey::Edm => self.edm,
            FitInfoKey::ErrDef => self.err_def,
            FitInfoKey::StatusCode => f64::from(self.status_code),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    pub value: f64,
    pub error: f64,
}

pub trait Minimizer {
    fn new(setup: MinimizerSetup) -> Result<Self, FitError>
    where
        Self: Sized;

    fn number_of_parameters(&self) -> usize;

    fn set_parameter_values(&mut self, values: &[f64]) -> Result<(), FitError>;

    fn set_parameter_errors(&mut self, errors: &[f64]) -> Result<(), FitError>;

    fn fix_parameter(&mut self, id: usize);

    fn release_parameter(&mut self, id: usize);

    /// Minimize `objective` starting from the current values.
    ///
    /// With `final_fit`, the search is followed by a full error analysis.
    fn minimize(&mut self, objective: &dyn Fn(&[f64]) -> f64, final_fit: bool, verbosity: u8);

    fn parameter_values(&self) -> Vec<f64>;

    /// Parabolic errors; fixed parameters report 0.
    fn parameter_errors(&self) -> Vec<f64>;

    fn parameter_info(&self) -> Vec<ParameterInfo>;

    /// Parameter covariance matrix; rows/columns of fixed parameters are zero.
    fn error_matrix(&self) -> DMatrix<f64>;

    fn fit_info(&self) -> FitInfo;

    fn get_fit_info(&self, key: FitInfoKey) -> f64 {
        self.fit_info().get(key)
    }

    /// Upper-tail chi2 probability of the current minimum; NaN for `ndf <= 0`.
    fn chi2_probability(&self, ndf: i64) -> f64 {
        chi2_probability(self.fit_info().fcn, ndf)
    }
}
