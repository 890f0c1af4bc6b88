//! Quasi-Newton minimizer: `argmin`'s L-BFGS with a More–Thuente line search.
//!
//! The search runs in coordinates scaled by the current parameter errors (see
//! [`super::adapter`]), with central-difference gradients from `finitediff`.
//! Once L-BFGS stops, the curvature matrix `H` is taken at the minimum and
//! a few full Newton steps polish the result until the estimated distance to
//! minimum is below tolerance.
//!
//! ```text
//! EDM   = ½ gᵀ H⁻¹ g
//! cov   = 2 · UP · H⁻¹
//! error = sqrt(diag(cov))
//! ```
//!
//! A curvature matrix that is not positive definite is made so by Marquardt
//! damping (`H + λ·diag|H|`), and the minimum is flagged with status 1.
//!
//! Status codes: 0 converged, 1 covariance forced positive definite,
//! 2 iteration limit reached, 3 no further decrease possible.

use argmin::core::{Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace, warn};

use crate::error::FitError;
use crate::minimizer::adapter::{BestPoint, ScaledFrame, ScaledObjective};
use crate::minimizer::finite_diff::{central_gradient, central_hessian};
use crate::minimizer::{FitInfo, Minimizer, MinimizerSetup, ParameterInfo};

pub const STATUS_OK: i32 = 0;
pub const STATUS_COVARIANCE_FORCED: i32 = 1;
pub const STATUS_CALL_LIMIT: i32 = 2;
pub const STATUS_STALLED: i32 = 3;

type Lbfgs = LBFGS<MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64>, Vec<f64>, Vec<f64>, f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct QuasiNewtonOptions {
    pub max_iterations: u64,
    pub lbfgs_memory: usize,
    /// L-BFGS stops once the scaled gradient norm drops below this.
    pub gradient_tolerance: f64,
    pub cost_tolerance: f64,
    /// The minimum is accepted once the estimated distance to it drops below this.
    pub edm_tolerance: f64,
    /// Objective change defining one standard error (1 for chi2).
    pub err_def: f64,
    /// Gradient step, in units of the parameter error.
    pub gradient_step: f64,
    /// Curvature step, in units of the parameter error.
    pub curvature_step: f64,
    /// Scale used for free parameters whose error is zero.
    pub fallback_scale: f64,
    pub max_newton_steps: usize,
    pub max_damping_attempts: usize,
}

impl Default for QuasiNewtonOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            lbfgs_memory: 7,
            gradient_tolerance: 1e-8,
            cost_tolerance: f64::EPSILON,
            edm_tolerance: 1e-10,
            err_def: 1.0,
            gradient_step: 1e-4,
            curvature_step: 1e-3,
            fallback_scale: 0.1,
            max_newton_steps: 10,
            max_damping_attempts: 40,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuasiNewtonMinimizer {
    names: Vec<String>,
    values: Vec<f64>,
    errors: Vec<f64>,
    fixed: Vec<bool>,
    error_matrix: DMatrix<f64>,
    info: FitInfo,
    options: QuasiNewtonOptions,
}

/// Where L-BFGS left off.
struct Search {
    values: Vec<f64>,
    status: i32,
    iterations: u64,
}

/// Objective, gradient and inverted curvature at one point, in scaled units.
struct LocalModel {
    fcn: f64,
    gradient: DVector<f64>,
    inverse: DMatrix<f64>,
    scale: Vec<f64>,
    forced: bool,
}

impl LocalModel {
    fn edm(&self) -> f64 {
        0.5 * self.gradient.dot(&(&self.inverse * &self.gradient))
    }
}

fn build_solver(options: &QuasiNewtonOptions) -> Result<Lbfgs, argmin::core::Error> {
    LBFGS::new(MoreThuenteLineSearch::new(), options.lbfgs_memory)
        .with_tolerance_grad(options.gradient_tolerance)?
        .with_tolerance_cost(options.cost_tolerance)
}

impl QuasiNewtonMinimizer {
    pub fn with_options(setup: MinimizerSetup, options: QuasiNewtonOptions) -> Result<Self, FitError> {
        let n = setup.names.len();
        FitError::check_len("minimizer start values", n, setup.values.len())?;
        FitError::check_len("minimizer start errors", n, setup.errors.len())?;
        Ok(Self {
            names: setup.names,
            values: setup.values,
            errors: setup.errors,
            fixed: vec![false; n],
            error_matrix: DMatrix::zeros(n, n),
            info: FitInfo {
                fcn: f64::NAN,
                edm: f64::NAN,
                err_def: options.err_def,
                status_code: STATUS_OK,
            },
            options,
        })
    }

    pub fn options(&self) -> &QuasiNewtonOptions {
        &self.options
    }

    fn free_indices(&self) -> Vec<usize> {
        (0..self.values.len()).filter(|&i| !self.fixed[i]).collect()
    }

    fn scales(&self, free: &[usize]) -> Vec<f64> {
        free.iter()
            .map(|&i| {
                let e = self.errors[i];
                if e > 0.0 && e.is_finite() {
                    e
                } else {
                    self.options.fallback_scale
                }
            })
            .collect()
    }

    fn run_lbfgs(&self, problem: ScaledObjective<'_>, n: usize) -> Result<(i32, u64), argmin::core::Error> {
        let solver = build_solver(&self.options)?;
        let start = vec![0.0; n];
        let result = Executor::new(problem, solver)
            .configure(|state| state.param(start).max_iters(self.options.max_iterations))
            .run()?;
        let state = result.state();
        let status = match state.get_termination_status() {
            TerminationStatus::Terminated(TerminationReason::MaxItersReached) => STATUS_CALL_LIMIT,
            _ => STATUS_OK,
        };
        Ok((status, state.get_iter()))
    }

    fn search(&self, objective: &dyn Fn(&[f64]) -> f64, free: &[usize]) -> Search {
        let scale = self.scales(free);
        let frame = ScaledFrame {
            origin: &self.values,
            free,
            scale: &scale,
        };
        let best = BestPoint::default();
        let problem = ScaledObjective::new(objective, frame, self.options.gradient_step, &best);

        let (status, iterations) = match self.run_lbfgs(problem, free.len()) {
            Ok(outcome) => outcome,
            // the Newton refinement decides whether the best point is a minimum
            Err(err) => {
                debug!(%err, "l-bfgs stopped early");
                (STATUS_OK, 0)
            }
        };
        match best.take() {
            Some((_, u)) => Search {
                values: frame.to_external(&u),
                status,
                iterations,
            },
            None => {
                warn!("objective was never finite; parameters left unchanged");
                Search {
                    values: self.values.clone(),
                    status: STATUS_STALLED,
                    iterations,
                }
            }
        }
    }

    fn local_model(&self, objective: &dyn Fn(&[f64]) -> f64, x: &[f64], free: &[usize]) -> LocalModel {
        let scale = self.scales(free);
        let frame = ScaledFrame {
            origin: x,
            free,
            scale: &scale,
        };
        let scaled = |u: &[f64]| objective(&frame.to_external(u));
        let origin = vec![0.0; free.len()];
        let gradient = central_gradient(&origin, self.options.gradient_step, &scaled);
        let hessian = central_hessian(
            &origin,
            self.options.gradient_step,
            self.options.curvature_step,
            &scaled,
        );
        let (inverse, forced) = self.invert_curvature(&hessian);
        LocalModel {
            fcn: objective(x),
            gradient: DVector::from_vec(gradient),
            inverse,
            scale,
            forced,
        }
    }

    fn invert_curvature(&self, hessian: &DMatrix<f64>) -> (DMatrix<f64>, bool) {
        if let Some(chol) = hessian.clone().cholesky() {
            return (chol.inverse(), false);
        }

        let scale = DMatrix::from_diagonal(&hessian.diagonal().map(|v| v.abs().max(1e-12)));
        let mut lambda = 1e-3;
        for _ in 0..self.options.max_damping_attempts {
            let damped = hessian + &scale * lambda;
            if let Some(chol) = damped.cholesky() {
                return (chol.inverse(), true);
            }
            lambda *= 10.0;
        }

        (DMatrix::from_diagonal(&scale.diagonal().map(|v| 1.0 / v)), true)
    }

    /// Full Newton step from `x`, kept only if it lowers the objective.
    fn newton_point(
        &self,
        objective: &dyn Fn(&[f64]) -> f64,
        x: &[f64],
        free: &[usize],
        model: &LocalModel,
    ) -> Option<Vec<f64>> {
        let step = -(&model.inverse * &model.gradient);
        let mut candidate = x.to_vec();
        for (a, &i) in free.iter().enumerate() {
            candidate[i] += step[a] * model.scale[a];
        }
        (objective(&candidate) < model.fcn).then_some(candidate)
    }

    /// Update errors, and optionally the error matrix, from a local model.
    fn absorb_curvature(&mut self, free: &[usize], model: &LocalModel, store_matrix: bool) {
        let factor = 2.0 * self.options.err_def;
        for (a, &i) in free.iter().enumerate() {
            let var = factor * model.inverse[(a, a)] * model.scale[a] * model.scale[a];
            if var > 0.0 && var.is_finite() {
                self.errors[i] = var.sqrt();
            }
        }
        if store_matrix {
            let n = self.values.len();
            let mut matrix = DMatrix::zeros(n, n);
            for (a, &i) in free.iter().enumerate() {
                for (b, &j) in free.iter().enumerate() {
                    matrix[(i, j)] = factor * model.inverse[(a, b)] * model.scale[a] * model.scale[b];
                }
            }
            self.error_matrix = matrix;
        }
    }
}

impl Minimizer for QuasiNewtonMinimizer {
    fn new(setup: MinimizerSetup) -> Result<Self, FitError> {
        Self::with_options(setup, QuasiNewtonOptions::default())
    }

    fn number_of_parameters(&self) -> usize {
        self.values.len()
    }

    fn set_parameter_values(&mut self, values: &[f64]) -> Result<(), FitError> {
        FitError::check_len("parameter values", self.values.len(), values.len())?;
        self.values.copy_from_slice(values);
        Ok(())
    }

    fn set_parameter_errors(&mut self, errors: &[f64]) -> Result<(), FitError> {
        FitError::check_len("parameter errors", self.errors.len(), errors.len())?;
        self.errors.copy_from_slice(errors);
        Ok(())
    }

    fn fix_parameter(&mut self, id: usize) {
        if let Some(flag) = self.fixed.get_mut(id) {
            *flag = true;
        }
    }

    fn release_parameter(&mut self, id: usize) {
        if let Some(flag) = self.fixed.get_mut(id) {
            *flag = false;
        }
    }

    fn minimize(&mut self, objective: &dyn Fn(&[f64]) -> f64, final_fit: bool, verbosity: u8) {
        let free = self.free_indices();
        let n_total = self.values.len();

        if free.is_empty() {
            self.error_matrix = DMatrix::zeros(n_total, n_total);
            self.info = FitInfo {
                fcn: objective(&self.values),
                edm: 0.0,
                err_def: self.options.err_def,
                status_code: STATUS_OK,
            };
            return;
        }

        let search = self.search(objective, &free);
        let mut x = search.values;
        let mut status = search.status;
        if verbosity >= 3 {
            trace!(iterations = search.iterations, status, "l-bfgs finished");
        }

        let mut edm = f64::NAN;
        let mut converged = false;
        for step in 0..self.options.max_newton_steps {
            let model = self.local_model(objective, &x, &free);
            edm = model.edm();
            self.absorb_curvature(&free, &model, false);
            if verbosity >= 3 {
                trace!(step, fcn = model.fcn, edm, "newton refinement");
            }
            if edm < self.options.edm_tolerance {
                converged = true;
                break;
            }
            match self.newton_point(objective, &x, &free, &model) {
                Some(candidate) => x = candidate,
                None => break,
            }
        }
        if !converged && status == STATUS_OK {
            status = STATUS_STALLED;
        }

        // error analysis at the minimum; a final fit repeats it with steps
        // taken from the refreshed errors
        let passes = if final_fit { 2 } else { 1 };
        let mut forced = false;
        for _ in 0..passes {
            let model = self.local_model(objective, &x, &free);
            forced = model.forced;
            self.absorb_curvature(&free, &model, true);
        }
        if forced && status == STATUS_OK {
            status = STATUS_COVARIANCE_FORCED;
        }

        self.values = x;
        self.info = FitInfo {
            fcn: objective(&self.values),
            edm,
            err_def: self.options.err_def,
            status_code: status,
        };

        if verbosity >= 2 {
            debug!(
                iterations = search.iterations,
                fcn = self.info.fcn,
                edm = self.info.edm,
                status = self.info.status_code,
                "minimization finished"
            );
        }
    }

    fn parameter_values(&self) -> Vec<f64> {
        self.values.clone()
    }

    fn parameter_errors(&self) -> Vec<f64> {
        self.errors
            .iter()
            .zip(&self.fixed)
            .map(|(&e, &fixed)| if fixed { 0.0 } else { e })
            .collect()
    }

    fn parameter_info(&self) -> Vec<ParameterInfo> {
        self.names
            .iter()
            .zip(self.parameter_values())
            .zip(self.parameter_errors())
            .map(|((name, value), error)| ParameterInfo {
                name: name.clone(),
                value,
                error,
            })
            .collect()
    }

    fn error_matrix(&self) -> DMatrix<f64> {
        self.error_matrix.clone()
    }

    fn fit_info(&self) -> FitInfo {
        self.info
    }
}
