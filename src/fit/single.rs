//! Chi2 fit of one fit function to one dataset.
//!
//! A fit runs in one of two modes:
//!
//! - no x errors: a single minimization on the y covariance
//! - x errors: an initial minimization, then up to `max_x_iterations` passes
//!   that fold the x errors into the covariance through the local slope of
//!   the function and minimize again, until the covariance settles
//!
//! The minimizer is created once and warm-started across passes.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::data::Dataset;
use crate::domain::{Constraint, FitConfig, FitResult, ParamRef, ParamSpec, ParameterState};
use crate::error::FitError;
use crate::fit::{Chi2Problem, ProjectionLoop, ProjectionOutcome, ZERO_STEP_REPLACEMENT};
use crate::io::FitLog;
use crate::math::{allclose, constraint_penalty, round_to_significance, to_rows};
use crate::minimizer::{FitInfo, Minimizer, QuasiNewtonMinimizer};
use crate::models::FitFunction;
use crate::observer::{FitEvent, FitObserver, default_observer};
use crate::report::{
    ReportContext, format_constraints_section, format_dataset_section, format_function_section,
    format_result_sections,
};

/// Step for the parameter derivatives of [`Fit::function_error`], as a
/// fraction of the smallest parameter error.
const BAND_STEP_FRACTION: f64 = 0.01;

/// Construction options shared by [`Fit`] and [`crate::fit::Multifit`].
#[derive(Clone)]
pub struct FitOptions {
    pub config: FitConfig,
    pub observer: Arc<dyn FitObserver>,
    /// Free-form name carried into the exported result.
    pub label: Option<String>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            config: FitConfig::default(),
            observer: default_observer(),
            label: None,
        }
    }
}

impl std::fmt::Debug for FitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitOptions")
            .field("config", &self.config)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

pub struct Fit<M: Minimizer = QuasiNewtonMinimizer> {
    problem: Chi2Problem,
    params: ParameterState,
    minimizer: M,
    config: FitConfig,
    observer: Arc<dyn FitObserver>,
    label: Option<String>,
    outcome: Option<ProjectionOutcome>,
    report: Option<String>,
}

impl Fit<QuasiNewtonMinimizer> {
    pub fn new(dataset: Arc<dyn Dataset>, function: FitFunction) -> Result<Self, FitError> {
        Self::create(dataset, function, FitOptions::default())
    }

    pub fn with_options(
        dataset: Arc<dyn Dataset>,
        function: FitFunction,
        options: FitOptions,
    ) -> Result<Self, FitError> {
        Self::create(dataset, function, options)
    }
}

impl<M: Minimizer> Fit<M> {
    /// Build a fit with any minimizer; parameters start at the function defaults.
    pub fn create(dataset: Arc<dyn Dataset>, function: FitFunction, options: FitOptions) -> Result<Self, FitError> {
        options.config.validate()?;
        let params = ParameterState::new(function.parameter_names(), function.parameter_defaults())?;
        let minimizer = M::new(params.minimizer_setup())?;
        let problem = Chi2Problem::new(dataset, function, options.observer.as_ref());
        Ok(Self {
            problem,
            params,
            minimizer,
            config: options.config,
            observer: options.observer,
            label: options.label,
            outcome: None,
            report: None,
        })
    }

    pub fn dataset(&self) -> &dyn Dataset {
        self.problem.dataset()
    }

    pub fn function(&self) -> &FitFunction {
        self.problem.function()
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn parameters(&self) -> &ParameterState {
        &self.params
    }

    /// Working covariance matrix (y covariance, or the projected total after a fit).
    pub fn current_cov_mat(&self) -> &DMatrix<f64> {
        self.problem.cov_mat()
    }

    // ---- parameter lifecycle -------------------------------------------

    /// Set all start values; missing errors default to a tenth of the values
    /// and a warning is emitted.
    pub fn set_parameters(&mut self, values: &[f64], errors: Option<&[f64]>) -> Result<(), FitError> {
        if self.params.set_values(values, errors)? {
            self.observer.on_event(&FitEvent::DefaultParameterErrors {
                parameters: self.params.names(),
            });
        }
        self.sync_minimizer()
    }

    /// Like [`Fit::set_parameters`] without the default-error warning.
    pub fn set_parameters_silently(&mut self, values: &[f64], errors: Option<&[f64]>) -> Result<(), FitError> {
        self.params.set_values(values, errors)?;
        self.sync_minimizer()
    }

    pub fn set_parameter(&mut self, reference: impl Into<ParamRef>, spec: ParamSpec) -> Result<(), FitError> {
        let (id, defaulted) = self.params.set_one(&reference.into(), spec)?;
        if defaulted {
            self.observer.on_event(&FitEvent::DefaultParameterErrors {
                parameters: vec![self.params.get(id).name.clone()],
            });
        }
        self.sync_minimizer()
    }

    pub fn fix_parameters<I, R>(&mut self, references: I) -> Result<(), FitError>
    where
        I: IntoIterator<Item = R>,
        R: Into<ParamRef>,
    {
        let ids = self.params.resolve_all(references)?;
        for id in ids {
            self.params.set_fixed(id, true);
            self.minimizer.fix_parameter(id);
            self.observer.on_event(&FitEvent::ParameterFixed {
                id,
                name: self.params.get(id).name.clone(),
            });
        }
        Ok(())
    }

    /// Release the given parameters; an empty list releases all of them.
    pub fn release_parameters<I, R>(&mut self, references: I) -> Result<(), FitError>
    where
        I: IntoIterator<Item = R>,
        R: Into<ParamRef>,
    {
        let ids = self.params.resolve_all(references)?;
        if ids.is_empty() {
            self.release_all_parameters();
            return Ok(());
        }
        for id in ids {
            self.params.set_fixed(id, false);
            self.minimizer.release_parameter(id);
            self.observer.on_event(&FitEvent::ParameterReleased {
                id,
                name: self.params.get(id).name.clone(),
            });
        }
        Ok(())
    }

    pub fn release_all_parameters(&mut self) {
        for id in 0..self.params.len() {
            self.params.set_fixed(id, false);
            self.minimizer.release_parameter(id);
        }
        self.observer.on_event(&FitEvent::AllParametersReleased);
    }

    /// Gaussian constraints `value ± sigma`; a zero sigma removes the constraint.
    pub fn constrain_parameters<I, R>(&mut self, references: I, values: &[f64], sigmas: &[f64]) -> Result<(), FitError>
    where
        I: IntoIterator<Item = R>,
        R: Into<ParamRef>,
    {
        let ids = self.params.resolve_all(references)?;
        FitError::check_len("constraint values", ids.len(), values.len())?;
        FitError::check_len("constraint sigmas", ids.len(), sigmas.len())?;
        for (k, id) in ids.into_iter().enumerate() {
            self.params.set_constraint(id, Constraint::new(values[k], sigmas[k]));
            self.observer.on_event(&FitEvent::ParameterConstrained {
                id,
                name: self.params.get(id).name.clone(),
                target: values[k],
                sigma: sigmas[k],
            });
        }
        Ok(())
    }

    fn sync_minimizer(&mut self) -> Result<(), FitError> {
        self.minimizer.set_parameter_values(&self.params.values())?;
        self.minimizer.set_parameter_errors(&self.params.errors())
    }

    // ---- queries -------------------------------------------------------

    /// `n_points - n_params + n_fixed + n_constrained`
    pub fn ndf(&self) -> i64 {
        self.problem.size() as i64 - self.params.len() as i64
            + self.params.fixed_count() as i64
            + self.params.constrained_count() as i64
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.params.names()
    }

    /// Current values, optionally rounded to the configured significance of their errors.
    pub fn parameter_values(&self, rounding: bool) -> Vec<f64> {
        self.rounded(rounding).0
    }

    /// Current errors (0 for fixed parameters), optionally rounded.
    pub fn parameter_errors(&self, rounding: bool) -> Vec<f64> {
        self.rounded(rounding).1
    }

    fn rounded(&self, rounding: bool) -> (Vec<f64>, Vec<f64>) {
        let values = self.minimizer.parameter_values();
        let errors = self.minimizer.parameter_errors();
        if !rounding {
            return (values, errors);
        }
        values
            .iter()
            .zip(&errors)
            .map(|(&v, &e)| round_to_significance(v, e, self.config.error_places))
            .unzip()
    }

    pub fn error_matrix(&self) -> DMatrix<f64> {
        self.minimizer.error_matrix()
    }

    pub fn fit_info(&self) -> FitInfo {
        self.minimizer.fit_info()
    }

    pub fn chi2_probability(&self) -> f64 {
        self.minimizer.chi2_probability(self.ndf())
    }

    /// The fit function at the current parameter values.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.problem.function().call(x, &self.params.values())
    }

    /// One-sigma error band of the function at each `x`, from the parameter
    /// error matrix: `sqrt(gᵀ C g)` with `g = df/dp`.
    pub fn function_error(&self, xs: &[f64]) -> Result<Vec<f64>, FitError> {
        let cov = self.minimizer.error_matrix();
        let min_var = cov
            .diagonal()
            .iter()
            .copied()
            .filter(|v| *v > 0.0)
            .fold(f64::INFINITY, f64::min);
        let step = if min_var.is_finite() {
            BAND_STEP_FRACTION * min_var.sqrt()
        } else {
            ZERO_STEP_REPLACEMENT
        };
        let steps = vec![step; self.params.len()];
        let values = self.params.values();

        xs.iter()
            .map(|&x| {
                let g = DVector::from_vec(self.problem.function().derive_by_parameters(x, &steps, &values)?);
                Ok(g.dot(&(&cov * &g)).max(0.0).sqrt())
            })
            .collect()
    }

    /// Passes and convergence of the last x-error projection.
    pub fn projection_outcome(&self) -> Option<ProjectionOutcome> {
        self.outcome
    }

    /// Report text of the last [`Fit::do_fit`].
    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    // ---- fitting -------------------------------------------------------

    fn run_minimizer(&mut self, final_fit: bool, verbosity: u8) {
        self.observer.on_event(&FitEvent::MinimizerCalled { final_fit });
        let constraints = self.params.constraints();
        let problem = &self.problem;
        let objective = |p: &[f64]| problem.residual_chi2(p) + constraint_penalty(p, &constraints);
        self.minimizer.minimize(&objective, final_fit, verbosity);
        self.params
            .update_from(&self.minimizer.parameter_values(), &self.minimizer.parameter_errors());
    }

    /// Run the fit and build its report.
    ///
    /// `quiet` silences minimizer progress; `verbose` adds per-iteration
    /// detail. With a configured log directory the report is also written to
    /// `<log_dir>/<basename>.log`.
    pub fn do_fit(&mut self, quiet: bool, verbose: bool) -> Result<FitResult, FitError> {
        let mut log = match &self.config.log_dir {
            Some(dir) => Some(FitLog::create(dir, self.problem.dataset().basename(), self.observer.as_ref())?),
            None => None,
        };

        let mut report = format_dataset_section(self.problem.dataset());
        report.push_str(&format_function_section(self.problem.function()));
        report.push_str(&format_constraints_section(&self.params.names(), &self.params.constraints()));

        let verbosity = match (quiet, verbose) {
            (true, _) => 0,
            (false, true) => 3,
            (false, false) => 1,
        };

        let outcome = if self.problem.has_x_errors() {
            self.run_minimizer(false, verbosity);
            let projection = ProjectionLoop::from_config(&self.config);
            let observer = Arc::clone(&self.observer);
            projection.run(observer.as_ref(), |iteration| {
                let before = self.problem.cov_mat().clone();
                let values = self.params.values();
                self.problem.project_x_covariance(&values, observer.as_ref())?;
                self.run_minimizer(iteration > 0, verbosity);
                Ok(allclose(&before, self.problem.cov_mat(), projection.rtol, 0.0))
            })?
        } else {
            self.run_minimizer(true, verbosity);
            ProjectionOutcome {
                iterations: 0,
                converged: true,
            }
        };
        self.outcome = Some(outcome);

        let ndf = self.ndf();
        if ndf <= 0 {
            self.observer.on_event(&FitEvent::NonPositiveNdf { ndf });
        }

        let names = self.params.names();
        let values = self.minimizer.parameter_values();
        let errors = self.minimizer.parameter_errors();
        let error_matrix = self.minimizer.error_matrix();
        let info = self.minimizer.fit_info();
        let probability = self.minimizer.chi2_probability(ndf);

        report.push_str(&format_result_sections(&ReportContext {
            names: &names,
            values: &values,
            errors: &errors,
            error_matrix: &error_matrix,
            info,
            ndf,
            chi2_probability: probability,
            config: &self.config,
        }));

        if let Some(log) = log.as_mut() {
            log.write_timestamp("Fit performed on")?;
            log.write_text(&report)?;
        }

        let result = FitResult {
            label: self.label.clone(),
            parameter_names: names,
            values,
            errors,
            fixed: self.params.fixed_flags(),
            error_matrix: to_rows(&error_matrix),
            fcn: info.fcn,
            edm: info.edm,
            status_code: info.status_code,
            ndf,
            chi2_probability: (!probability.is_nan()).then_some(probability),
            x_iterations: outcome.iterations,
            converged: outcome.converged,
            report: Some(report.clone()),
        };
        self.report = Some(report);
        Ok(result)
    }
}

impl<M: Minimizer> std::fmt::Debug for Fit<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fit")
            .field("problem", &self.problem)
            .field("params", &self.params)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Build a fit with a label, start values and constraints in one go.
pub fn build_fit(
    dataset: Arc<dyn Dataset>,
    function: FitFunction,
    label: Option<&str>,
    initial: &[(ParamRef, ParamSpec)],
    constraints: &[(ParamRef, Constraint)],
) -> Result<Fit, FitError> {
    let options = FitOptions {
        label: label.map(str::to_string),
        ..FitOptions::default()
    };
    let mut fit = Fit::with_options(dataset, function, options)?;
    for (reference, spec) in initial {
        fit.set_parameter(reference.clone(), *spec)?;
    }
    for (reference, c) in constraints {
        fit.constrain_parameters([reference.clone()], &[c.target], &[c.sigma])?;
    }
    Ok(fit)
}
