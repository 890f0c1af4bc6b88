//! Exposes a chi2 objective to `argmin` in error-scaled coordinates.
//!
//! The solver works on `u`, one entry per free parameter, with
//!
//! ```text
//! p[free[a]] = origin[free[a]] + u[a] · scale[a]
//! ```
//!
//! so a unit step in `u` is about one standard error. Fixed parameters stay
//! at their origin value. The lowest finite objective value seen is kept in a
//! [`BestPoint`], which survives an aborted line search.

use std::cell::RefCell;

use argmin::core::{CostFunction, Error, Gradient};

use crate::error::FitError;
use crate::minimizer::finite_diff::central_gradient;

/// Mapping between solver coordinates and the full parameter vector.
#[derive(Debug, Clone, Copy)]
pub struct ScaledFrame<'a> {
    pub origin: &'a [f64],
    pub free: &'a [usize],
    pub scale: &'a [f64],
}

impl ScaledFrame<'_> {
    pub fn to_external(&self, u: &[f64]) -> Vec<f64> {
        let mut p = self.origin.to_vec();
        for ((&i, &s), &step) in self.free.iter().zip(self.scale).zip(u) {
            p[i] += step * s;
        }
        p
    }
}

/// Lowest finite objective value seen so far, with its solver coordinates.
#[derive(Debug, Default)]
pub struct BestPoint {
    inner: RefCell<Option<(f64, Vec<f64>)>>,
}

impl BestPoint {
    fn offer(&self, value: f64, u: &[f64]) {
        if !value.is_finite() {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        if inner.as_ref().is_none_or(|(best, _)| value < *best) {
            *inner = Some((value, u.to_vec()));
        }
    }

    pub fn take(&self) -> Option<(f64, Vec<f64>)> {
        self.inner.borrow_mut().take()
    }
}

pub struct ScaledObjective<'a> {
    objective: &'a dyn Fn(&[f64]) -> f64,
    frame: ScaledFrame<'a>,
    gradient_step: f64,
    best: &'a BestPoint,
}

impl<'a> ScaledObjective<'a> {
    pub fn new(
        objective: &'a dyn Fn(&[f64]) -> f64,
        frame: ScaledFrame<'a>,
        gradient_step: f64,
        best: &'a BestPoint,
    ) -> Self {
        Self {
            objective,
            frame,
            gradient_step,
            best,
        }
    }

    fn value(&self, u: &[f64]) -> f64 {
        let value = (self.objective)(&self.frame.to_external(u));
        self.best.offer(value, u);
        value
    }
}

impl CostFunction for ScaledObjective<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, u: &Self::Param) -> Result<Self::Output, Error> {
        let value = self.value(u);
        if !value.is_finite() {
            return Err(FitError::NonFiniteObjective { value }.into());
        }
        Ok(value)
    }
}

impl Gradient for ScaledObjective<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, u: &Self::Param) -> Result<Self::Gradient, Error> {
        let gradient = central_gradient(u, self.gradient_step, &|v: &[f64]| self.value(v));
        if let Some(&value) = gradient.iter().find(|g| !g.is_finite()) {
            return Err(FitError::NonFiniteObjective { value }.into());
        }
        Ok(gradient)
    }
}
