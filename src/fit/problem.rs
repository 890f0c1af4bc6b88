//! One (dataset, fit function) pairing and its working covariance matrix.
//!
//! A `Chi2Problem` caches the data arrays and the inverse of the current
//! total covariance, so evaluating the residual chi2 is a single
//! matrix-vector product. The covariance starts as the dataset's y
//! covariance (identity when there are no y errors) and is replaced on every
//! x projection.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::data::Dataset;
use crate::domain::Axis;
use crate::error::FitError;
use crate::math::{invert_or_fallback, outer_product, residual_chi2};
use crate::models::FitFunction;
use crate::observer::{FitEvent, FitObserver};

/// Derivative step used where the current error is zero.
pub const ZERO_STEP_REPLACEMENT: f64 = 1e-7;

/// Step for the x derivative as a fraction of the current point error.
pub const X_STEP_FRACTION: f64 = 0.01;

pub struct Chi2Problem {
    dataset: Arc<dyn Dataset>,
    function: FitFunction,
    x: Vec<f64>,
    y: Vec<f64>,
    cov: DMatrix<f64>,
    cov_inv: DMatrix<f64>,
}

impl Chi2Problem {
    pub fn new(dataset: Arc<dyn Dataset>, function: FitFunction, observer: &dyn FitObserver) -> Self {
        let n = dataset.size();
        let start = if dataset.has_errors(Axis::Y) {
            let cov = dataset.cov_mat(Axis::Y, true);
            if let Some(fallback) = cov.fallback {
                observer.on_event(&FitEvent::SingularCovariance {
                    context: "y".to_string(),
                    fallback,
                });
            }
            cov.matrix
        } else {
            observer.on_event(&FitEvent::NoYErrors);
            DMatrix::identity(n, n)
        };

        let mut problem = Self {
            x: dataset.data(Axis::X).to_vec(),
            y: dataset.data(Axis::Y).to_vec(),
            dataset,
            function,
            cov: DMatrix::zeros(0, 0),
            cov_inv: DMatrix::zeros(0, 0),
        };
        problem.set_cov_mat(start, observer);
        problem
    }

    pub fn dataset(&self) -> &dyn Dataset {
        self.dataset.as_ref()
    }

    pub fn function(&self) -> &FitFunction {
        &self.function
    }

    pub fn size(&self) -> usize {
        self.x.len()
    }

    pub fn has_x_errors(&self) -> bool {
        self.dataset.has_errors(Axis::X)
    }

    pub fn cov_mat(&self) -> &DMatrix<f64> {
        &self.cov
    }

    /// Replace the working covariance and cache its inverse.
    pub fn set_cov_mat(&mut self, cov: DMatrix<f64>, observer: &dyn FitObserver) {
        let inverted = invert_or_fallback(&cov);
        if let Some(fallback) = inverted.fallback {
            observer.on_event(&FitEvent::SingularCovariance {
                context: "total".to_string(),
                fallback,
            });
        }
        self.cov = cov;
        self.cov_inv = inverted.inverse;
    }

    /// `rᵀ C⁻¹ r` at `params` (local parameter order of this problem's function).
    pub fn residual_chi2(&self, params: &[f64]) -> f64 {
        residual_chi2(&self.x, &self.y, &self.cov_inv, |x| self.function.call(x, params))
    }

    /// Fold the x covariance into the working covariance at `params`:
    ///
    /// ```text
    /// C_tot[i][j] = C_y[i][j] + C_x[i][j] · f'(x_i) · f'(x_j)
    /// ```
    pub fn project_x_covariance(&mut self, params: &[f64], observer: &dyn FitObserver) -> Result<(), FitError> {
        let mut steps: Vec<f64> = self
            .cov
            .diagonal()
            .iter()
            .map(|v| X_STEP_FRACTION * v.max(0.0).sqrt())
            .collect();
        let zero_steps = steps.iter().filter(|&&h| h == 0.0).count();
        if zero_steps > 0 {
            observer.on_event(&FitEvent::ZeroDerivativeStep {
                count: zero_steps,
                replacement: ZERO_STEP_REPLACEMENT,
            });
            for h in steps.iter_mut().filter(|h| **h == 0.0) {
                *h = ZERO_STEP_REPLACEMENT;
            }
        }

        let slopes = self.function.derive_by_x(&self.x, &steps, params)?;
        let slopes = DVector::from_vec(slopes);
        let projected = self.dataset.raw_cov_mat(Axis::X).component_mul(&outer_product(&slopes));
        let total = self.dataset.raw_cov_mat(Axis::Y) + projected;
        self.set_cov_mat(total, observer);
        Ok(())
    }
}

impl std::fmt::Debug for Chi2Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chi2Problem")
            .field("function", &self.function.name())
            .field("basename", &self.dataset.basename())
            .field("size", &self.x.len())
            .finish_non_exhaustive()
    }
}
