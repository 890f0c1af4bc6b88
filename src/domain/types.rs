//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON
//! - passed between the single-fit and joint-fit engines unchanged

use std::fmt;

use serde::{Deserialize, Serialize};

/// Measurement axis of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn label(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }
}

/// Reference to a fit parameter, either by position or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamRef {
    Index(usize),
    Name(String),
}

impl From<usize> for ParamRef {
    fn from(value: usize) -> Self {
        ParamRef::Index(value)
    }
}

impl From<&str> for ParamRef {
    fn from(value: &str) -> Self {
        ParamRef::Name(value.to_string())
    }
}

impl From<String> for ParamRef {
    fn from(value: String) -> Self {
        ParamRef::Name(value)
    }
}

impl From<&String> for ParamRef {
    fn from(value: &String) -> Self {
        ParamRef::Name(value.clone())
    }
}

impl fmt::Display for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamRef::Index(i) => write!(f, "{i}"),
            ParamRef::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Value (and optionally start error) for a single named parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamSpec {
    Value(f64),
    ValueError(f64, f64),
}

impl ParamSpec {
    pub fn value(self) -> f64 {
        match self {
            ParamSpec::Value(v) | ParamSpec::ValueError(v, _) => v,
        }
    }

    pub fn error(self) -> Option<f64> {
        match self {
            ParamSpec::Value(_) => None,
            ParamSpec::ValueError(_, e) => Some(e),
        }
    }
}

/// Gaussian constraint `target ± sigma` on a parameter.
///
/// A zero `sigma` leaves the parameter unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub target: f64,
    pub sigma: f64,
}

impl Constraint {
    pub fn new(target: f64, sigma: f64) -> Self {
        Self { target, sigma }
    }

    pub fn is_active(&self) -> bool {
        self.sigma != 0.0
    }

    /// Penalty term `((value - target) / sigma)^2`, zero when inactive.
    pub fn penalty(&self, value: f64) -> f64 {
        if !self.is_active() {
            return 0.0;
        }
        let d = (value - self.target) / self.sigma;
        d * d
    }
}

/// Final state of a (single or joint) fit, suitable for export.
#[derive(Debug, Clone, Serialize)]
pub struct FitResult {
    pub label: Option<String>,
    pub parameter_names: Vec<String>,
    pub values: Vec<f64>,
    pub errors: Vec<f64>,
    pub fixed: Vec<bool>,
    pub error_matrix: Vec<Vec<f64>>,
    pub fcn: f64,
    pub edm: f64,
    pub status_code: i32,
    pub ndf: i64,
    /// `None` when the degrees of freedom are not positive.
    pub chi2_probability: Option<f64>,
    /// Number of x-projection passes that were run (0 without x errors).
    pub x_iterations: usize,
    /// Whether the projected covariance settled within tolerance.
    pub converged: bool,
    #[serde(skip)]
    pub report: Option<String>,
}

impl FitResult {
    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.parameter_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}
