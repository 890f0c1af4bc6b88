//! Joint chi2 fit of several (dataset, fit function) pairs.
//!
//! Every local parameter slot `(pair, local index)` maps to one canonical
//! parameter. Slots start out unlinked; [`Multifit::autolink_parameters`]
//! merges slots sharing a name and [`Multifit::link_parameters`] merges two
//! explicit slots. Canonical parameters are numbered by first appearance
//! (pair order, then local order).
//!
//! The joint objective is the sum of the pairs' residual chi2, each evaluated
//! with the canonical values substituted into its slots, plus the penalties of
//! the canonical constraints. Pairs with x errors are projected one after the
//! other between joint minimizations.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::DMatrix;

use crate::data::Dataset;
use crate::domain::{Constraint, FitConfig, FitResult, ParamRef, Parameter, ParameterState};
use crate::error::FitError;
use crate::fit::{Chi2Problem, FitOptions, ProjectionLoop, ProjectionOutcome};
use crate::io::FitLog;
use crate::math::{allclose, constraint_penalty, to_rows};
use crate::minimizer::{FitInfo, Minimizer, QuasiNewtonMinimizer};
use crate::models::FitFunction;
use crate::observer::{FitEvent, FitObserver};
use crate::report::{
    ReportContext, format_constraints_section, format_dataset_section, format_function_section,
    format_result_sections,
};

/// One local parameter of one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterSlot {
    pub pair: usize,
    pub local: usize,
}

/// Canonical ↔ slot mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTable {
    local_to_canonical: Vec<Vec<usize>>,
    slots: Vec<Vec<ParameterSlot>>,
}

impl LinkTable {
    pub fn canonical_of(&self, slot: ParameterSlot) -> Option<usize> {
        self.local_to_canonical.get(slot.pair)?.get(slot.local).copied()
    }

    /// Slots referencing canonical parameter `id`.
    pub fn slots(&self, id: usize) -> &[ParameterSlot] {
        self.slots.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn canonical_count(&self) -> usize {
        self.slots.len()
    }

    /// Local parameter vector of `pair` taken from canonical `values`.
    fn local_values(&self, pair: usize, values: &[f64]) -> Vec<f64> {
        self.local_to_canonical[pair].iter().map(|&c| values[c]).collect()
    }
}

pub struct Multifit<M: Minimizer = QuasiNewtonMinimizer> {
    problems: Vec<Chi2Problem>,
    links: LinkTable,
    params: ParameterState,
    minimizer: Option<M>,
    config: FitConfig,
    observer: Arc<dyn FitObserver>,
    label: Option<String>,
    outcome: Option<ProjectionOutcome>,
    report: Option<String>,
}

impl Multifit<QuasiNewtonMinimizer> {
    pub fn new() -> Self {
        Self::with_options(FitOptions::default())
    }
}

impl Default for Multifit<QuasiNewtonMinimizer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Minimizer> Multifit<M> {
    pub fn with_options(options: FitOptions) -> Self {
        Self {
            problems: Vec::new(),
            links: LinkTable::default(),
            params: ParameterState::empty(),
            minimizer: None,
            config: options.config,
            observer: options.observer,
            label: options.label,
            outcome: None,
            report: None,
        }
    }

    /// Append a pair; its parameters start out unlinked. Returns the pair index.
    pub fn add_pair(&mut self, dataset: Arc<dyn Dataset>, function: FitFunction) -> Result<usize, FitError> {
        let pair = self.problems.len();
        let mut groups = self.links.local_to_canonical.clone();
        let mut sources: Vec<Parameter> = self.params.iter().cloned().collect();
        let mut row = Vec::with_capacity(function.number_of_parameters());
        for (name, &value) in function.parameter_names().iter().zip(function.parameter_defaults()) {
            row.push(sources.len());
            sources.push(Parameter::new(name.clone(), value));
        }
        groups.push(row);

        self.problems
            .push(Chi2Problem::new(dataset, function, self.observer.as_ref()));
        if let Err(err) = self.relink(&groups, &sources) {
            self.problems.pop();
            return Err(err);
        }
        Ok(pair)
    }

    pub fn pair_count(&self) -> usize {
        self.problems.len()
    }

    pub fn links(&self) -> &LinkTable {
        &self.links
    }

    pub fn parameters(&self) -> &ParameterState {
        &self.params
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    // ---- linking -------------------------------------------------------

    /// Merge every set of slots that share a parameter name.
    pub fn autolink_parameters(&mut self) -> Result<(), FitError> {
        let mut first_by_name: HashMap<&str, usize> = HashMap::new();
        let mut groups = Vec::with_capacity(self.problems.len());
        for (pair, problem) in self.problems.iter().enumerate() {
            let row = problem
                .function()
                .parameter_names()
                .iter()
                .enumerate()
                .map(|(local, name)| {
                    let own = self.links.local_to_canonical[pair][local];
                    *first_by_name.entry(name.as_str()).or_insert(own)
                })
                .collect();
            groups.push(row);
        }
        let sources: Vec<Parameter> = self.params.iter().cloned().collect();
        self.relink(&groups, &sources)
    }

    /// Merge two explicit slots, each given as `(pair, local reference)`.
    ///
    /// The merged parameter keeps the state of the one appearing first.
    pub fn link_parameters(
        &mut self,
        a: (usize, impl Into<ParamRef>),
        b: (usize, impl Into<ParamRef>),
    ) -> Result<(), FitError> {
        let a = self.resolve_slot(a.0, a.1.into())?;
        let b = self.resolve_slot(b.0, b.1.into())?;
        let keep = self.links.local_to_canonical[a.pair][a.local];
        let merge = self.links.local_to_canonical[b.pair][b.local];
        let groups: Vec<Vec<usize>> = self
            .links
            .local_to_canonical
            .iter()
            .map(|row| row.iter().map(|&c| if c == merge { keep } else { c }).collect())
            .collect();
        let sources: Vec<Parameter> = self.params.iter().cloned().collect();
        self.relink(&groups, &sources)
    }

    fn resolve_slot(&self, pair: usize, reference: ParamRef) -> Result<ParameterSlot, FitError> {
        let invalid = || FitError::invalid_parameter(format!("{pair}:{reference}"));
        let names = self.problems.get(pair).ok_or_else(invalid)?.function().parameter_names();
        let local = match &reference {
            ParamRef::Index(i) if *i < names.len() => *i,
            ParamRef::Index(_) => return Err(invalid()),
            ParamRef::Name(name) => names.iter().position(|n| n == name).ok_or_else(invalid)?,
        };
        Ok(ParameterSlot { pair, local })
    }

    /// Rebuild the canonical parameters from a slot → group assignment.
    ///
    /// `groups[pair][local]` indexes `sources`, which supplies value, error,
    /// fixed flag and constraint of each group. The minimizer is dropped and
    /// rebuilt on the next fit.
    fn relink(&mut self, groups: &[Vec<usize>], sources: &[Parameter]) -> Result<(), FitError> {
        let mut canonical_of_group: HashMap<usize, usize> = HashMap::new();
        let mut first_group = Vec::new();
        let mut slots: Vec<Vec<ParameterSlot>> = Vec::new();
        let mut local_to_canonical = Vec::with_capacity(groups.len());

        for (pair, row) in groups.iter().enumerate() {
            let mut mapped = Vec::with_capacity(row.len());
            for (local, &group) in row.iter().enumerate() {
                let id = *canonical_of_group.entry(group).or_insert_with(|| {
                    first_group.push(group);
                    slots.push(Vec::new());
                    slots.len() - 1
                });
                slots[id].push(ParameterSlot { pair, local });
                mapped.push(id);
            }
            local_to_canonical.push(mapped);
        }

        let base_names: Vec<&str> = slots
            .iter()
            .map(|s| self.problems[s[0].pair].function().parameter_names()[s[0].local].as_str())
            .collect();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for name in &base_names {
            *counts.entry(*name).or_default() += 1;
        }

        let params = first_group
            .iter()
            .zip(&slots)
            .zip(&base_names)
            .map(|((&group, slot), &name)| {
                let name = if counts[name] > 1 {
                    format!("{name}[{}]", slot[0].pair)
                } else {
                    name.to_string()
                };
                Parameter {
                    name,
                    ..sources[group].clone()
                }
            })
            .collect();
        let params = ParameterState::from_parameters(params)?;

        for (id, s) in slots.iter().enumerate() {
            if s.len() > 1 {
                self.observer.on_event(&FitEvent::ParametersLinked {
                    canonical: params.get(id).name.clone(),
                    slots: s.len(),
                });
            }
        }

        self.params = params;
        self.links = LinkTable {
            local_to_canonical,
            slots,
        };
        self.minimizer = None;
        Ok(())
    }

    // ---- parameter lifecycle -------------------------------------------

    /// Set all canonical start values. Without a minimizer the values are
    /// kept and applied when it is built.
    pub fn set_parameters(&mut self, values: &[f64], errors: Option<&[f64]>) -> Result<(), FitError> {
        if self.params.set_values(values, errors)? {
            self.observer.on_event(&FitEvent::DefaultParameterErrors {
                parameters: self.params.names(),
            });
        }
        self.sync_minimizer()
    }

    /// Fix canonical parameters in every pair, optionally moving them to `values` first.
    pub fn fix_parameters<I, R>(&mut self, references: I, values: Option<&[f64]>) -> Result<(), FitError>
    where
        I: IntoIterator<Item = R>,
        R: Into<ParamRef>,
    {
        let ids = self.params.resolve_all(references)?;
        if let Some(values) = values {
            FitError::check_len("fixed values", ids.len(), values.len())?;
        }
        for (k, &id) in ids.iter().enumerate() {
            if let Some(values) = values {
                self.params.set_value(id, values[k]);
            }
            self.params.set_fixed(id, true);
            if let Some(minimizer) = self.minimizer.as_mut() {
                minimizer.fix_parameter(id);
            }
            self.observer.on_event(&FitEvent::ParameterFixed {
                id,
                name: self.params.get(id).name.clone(),
            });
        }
        if values.is_some() {
            self.sync_minimizer()?;
        }
        Ok(())
    }

    /// Release canonical parameters; an empty list releases all of them.
    pub fn release_parameters<I, R>(&mut self, references: I) -> Result<(), FitError>
    where
        I: IntoIterator<Item = R>,
        R: Into<ParamRef>,
    {
        let ids = self.params.resolve_all(references)?;
        let release_all = ids.is_empty();
        let ids = if release_all { (0..self.params.len()).collect() } else { ids };
        for id in ids {
            self.params.set_fixed(id, false);
            if let Some(minimizer) = self.minimizer.as_mut() {
                minimizer.release_parameter(id);
            }
            if !release_all {
                self.observer.on_event(&FitEvent::ParameterReleased {
                    id,
                    name: self.params.get(id).name.clone(),
                });
            }
        }
        if release_all {
            self.observer.on_event(&FitEvent::AllParametersReleased);
        }
        Ok(())
    }

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
        match self.minimizer.as_mut() {
            Some(minimizer) => {
                minimizer.set_parameter_values(&self.params.values())?;
                minimizer.set_parameter_errors(&self.params.errors())
            }
            None => {
                self.observer.on_event(&FitEvent::MinimizerNotReady);
                Ok(())
            }
        }
    }

    fn build_minimizer(&self) -> Result<M, FitError> {
        let mut minimizer = M::new(self.params.minimizer_setup())?;
        for (id, p) in self.params.iter().enumerate() {
            if p.fixed {
                minimizer.fix_parameter(id);
            }
        }
        Ok(minimizer)
    }

    // ---- queries -------------------------------------------------------

    /// Degrees of freedom of one pair on its own, counting the fixed and
    /// constrained canonical parameters it references.
    pub fn pair_ndf(&self, pair: usize) -> Option<i64> {
        let problem = self.problems.get(pair)?;
        let locals = &self.links.local_to_canonical[pair];
        let pinned = locals
            .iter()
            .filter(|&&c| {
                let p = self.params.get(c);
                p.fixed || p.is_constrained()
            })
            .count();
        Some(problem.size() as i64 - locals.len() as i64 + pinned as i64)
    }

    /// Joint degrees of freedom over all pairs and canonical parameters.
    pub fn ndf(&self) -> i64 {
        let points: usize = self.problems.iter().map(Chi2Problem::size).sum();
        points as i64 - self.params.len() as i64
            + self.params.fixed_count() as i64
            + self.params.constrained_count() as i64
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.params.names()
    }

    pub fn parameter_values(&self) -> Vec<f64> {
        match &self.minimizer {
            Some(m) => m.parameter_values(),
            None => self.params.values(),
        }
    }

    /// Errors of the canonical parameters; 0 for fixed ones.
    pub fn parameter_errors(&self) -> Vec<f64> {
        match &self.minimizer {
            Some(m) => m.parameter_errors(),
            None => self
                .params
                .iter()
                .map(|p| if p.fixed { 0.0 } else { p.error })
                .collect(),
        }
    }

    pub fn error_matrix(&self) -> DMatrix<f64> {
        match &self.minimizer {
            Some(m) => m.error_matrix(),
            None => DMatrix::zeros(self.params.len(), self.params.len()),
        }
    }

    pub fn fit_info(&self) -> Option<FitInfo> {
        self.minimizer.as_ref().map(M::fit_info)
    }

    /// Passes and convergence of the last x-error projection.
    pub fn projection_outcome(&self) -> Option<ProjectionOutcome> {
        self.outcome
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    // ---- fitting -------------------------------------------------------

    fn run_minimizer(&mut self, final_fit: bool, verbosity: u8) -> Result<(), FitError> {
        let mut minimizer = match self.minimizer.take() {
            Some(m) => m,
            None => self.build_minimizer()?,
        };
        self.observer.on_event(&FitEvent::MinimizerCalled { final_fit });

        let constraints = self.params.constraints();
        let problems = &self.problems;
        let links = &self.links;
        let objective = |p: &[f64]| {
            problems
                .iter()
                .enumerate()
                .map(|(pair, problem)| problem.residual_chi2(&links.local_values(pair, p)))
                .sum::<f64>()
                + constraint_penalty(p, &constraints)
        };
        minimizer.minimize(&objective, final_fit, verbosity);
        self.params
            .update_from(&minimizer.parameter_values(), &minimizer.parameter_errors());
        self.minimizer = Some(minimizer);
        Ok(())
    }

    /// Project the x errors of every pair that has them; returns whether all
    /// working covariances stayed within tolerance.
    fn project_pairs(&mut self, rtol: f64) -> Result<bool, FitError> {
        let values = self.params.values();
        let mut settled = true;
        for (pair, problem) in self.problems.iter_mut().enumerate() {
            if !problem.has_x_errors() {
                continue;
            }
            let before = problem.cov_mat().clone();
            problem.project_x_covariance(&self.links.local_values(pair, &values), self.observer.as_ref())?;
            settled &= allclose(&before, problem.cov_mat(), rtol, 0.0);
        }
        Ok(settled)
    }

    /// Run the joint fit and build its report.
    pub fn do_fit(&mut self, quiet: bool, verbose: bool) -> Result<FitResult, FitError> {
        self.config.validate()?;
        if self.problems.is_empty() {
            return Err(FitError::InvalidDataset("multifit has no dataset/function pairs".to_string()));
        }

        let basename = self
            .label
            .clone()
            .or_else(|| self.problems[0].dataset().basename().map(str::to_string));
        let mut log = match &self.config.log_dir {
            Some(dir) => Some(FitLog::create(dir, basename.as_deref(), self.observer.as_ref())?),
            None => None,
        };

        let mut report = String::new();
        for problem in &self.problems {
            report.push_str(&format_dataset_section(problem.dataset()));
            report.push_str(&format_function_section(problem.function()));
        }
        report.push_str(&format_constraints_section(&self.params.names(), &self.params.constraints()));

        let verbosity = match (quiet, verbose) {
            (true, _) => 0,
            (false, true) => 3,
            (false, false) => 1,
        };

        let outcome = if self.problems.iter().any(Chi2Problem::has_x_errors) {
            self.run_minimizer(false, verbosity)?;
            let projection = ProjectionLoop::from_config(&self.config);
            let observer = Arc::clone(&self.observer);
            projection.run(observer.as_ref(), |iteration| {
                let settled = self.project_pairs(projection.rtol)?;
                self.run_minimizer(iteration > 0, verbosity)?;
                Ok(settled)
            })?
        } else {
            self.run_minimizer(true, verbosity)?;
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
        let values = self.parameter_values();
        let errors = self.parameter_errors();
        let error_matrix = self.error_matrix();
        let (info, probability) = match &self.minimizer {
            Some(m) => (m.fit_info(), m.chi2_probability(ndf)),
            None => return Err(FitError::InvalidConfig("minimizer was not built".to_string())),
        };

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

impl<M: Minimizer> std::fmt::Debug for Multifit<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multifit")
            .field("problems", &self.problems)
            .field("links", &self.links)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::XYDataset;
    use crate::domain::Axis;
    use crate::models::{constant_1par, linear_2par};
    use crate::observer::RecordingObserver;

    fn data(x: &[f64], y: &[f64], y_error: f64) -> Arc<dyn Dataset> {
        let mut d = XYDataset::new(x.to_vec(), y.to_vec()).unwrap();
        d.add_simple_error(Axis::Y, y_error).unwrap();
        Arc::new(d)
    }

    fn two_lines(rec: &Arc<RecordingObserver>) -> Multifit {
        let mut mf = Multifit::with_options(FitOptions {
            observer: rec.clone(),
            ..FitOptions::default()
        });
        mf.add_pair(data(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0], 0.1), linear_2par())
            .unwrap();
        mf.add_pair(data(&[0.0, 1.0, 2.0, 3.0], &[2.0, 4.0, 6.0, 8.0], 0.1), linear_2par())
            .unwrap();
        mf
    }

    #[test]
    fn singular_pair_covariance_is_reported_and_fit_finishes() {
        let rec = RecordingObserver::new();
        let mut correlated = XYDataset::new(vec![0.0, 1.0, 2.0, 3.0], vec![1.0, 3.0, 5.0, 7.0]).unwrap();
        correlated.add_correlated_error(Axis::Y, 0.1).unwrap();
        let mut mf: Multifit = Multifit::with_options(FitOptions {
            observer: rec.clone(),
            ..FitOptions::default()
        });
        mf.add_pair(Arc::new(correlated), linear_2par()).unwrap();
        mf.add_pair(data(&[0.0, 1.0, 2.0, 3.0], &[2.0, 4.0, 6.0, 8.0], 0.1), linear_2par())
            .unwrap();
        mf.autolink_parameters().unwrap();
        assert!(rec
            .warnings()
            .iter()
            .any(|e| matches!(e, FitEvent::SingularCovariance { context, .. } if context == "y")));

        // both pairs end up with 0.01 on the diagonal: the shared intercept
        // settles halfway between 1 and 2
        let result = mf.do_fit(true, false).unwrap();
        assert!((result.values[0] - 2.0).abs() < 1e-6);
        assert!((result.values[1] - 1.5).abs() < 1e-6);
        assert!(result.errors.iter().all(|e| e.is_finite() && *e > 0.0));
    }

    #[test]
    fn unlinked_duplicates_get_pair_suffixes() {
        let rec = RecordingObserver::new();
        let mf = two_lines(&rec);
        assert_eq!(
            mf.parameter_names(),
            vec!["slope[0]", "y_intercept[0]", "slope[1]", "y_intercept[1]"]
        );
        assert_eq!(mf.ndf(), 8 - 4);
    }

    #[test]
    fn autolink_merges_by_name_in_first_appearance_order() {
        let rec = RecordingObserver::new();
        let mut mf = two_lines(&rec);
        mf.add_pair(data(&[0.0, 1.0], &[5.0, 5.0], 0.1), constant_1par()).unwrap();
        mf.autolink_parameters().unwrap();

        assert_eq!(mf.parameter_names(), vec!["slope", "y_intercept", "constant"]);
        assert_eq!(
            mf.links().slots(0),
            &[ParameterSlot { pair: 0, local: 0 }, ParameterSlot { pair: 1, local: 0 }]
        );
        assert_eq!(mf.links().canonical_of(ParameterSlot { pair: 2, local: 0 }), Some(2));
        assert_eq!(mf.ndf(), 10 - 3);
        assert_eq!(mf.pair_ndf(2), Some(1));
        assert!(rec
            .events()
            .iter()
            .any(|e| matches!(e, FitEvent::ParametersLinked { slots: 2, .. })));
    }

    #[test]
    fn explicit_link_merges_two_slots() {
        let rec = RecordingObserver::new();
        let mut mf = two_lines(&rec);
        mf.link_parameters((0, "slope"), (1, 0usize)).unwrap();
        assert_eq!(mf.parameter_names(), vec!["slope", "y_intercept[0]", "y_intercept[1]"]);
        assert!(mf.link_parameters((3, "slope"), (1, "slope")).is_err());
        assert!(matches!(
            mf.link_parameters((0, "offset"), (1, "slope")),
            Err(FitError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn shared_slope_fit_matches_both_lines() {
        let rec = RecordingObserver::new();
        let mut mf = two_lines(&rec);
        mf.link_parameters((0, "slope"), (1, "slope")).unwrap();
        let result = mf.do_fit(true, false).unwrap();
        assert!(result.fcn < 1e-10);
        assert!((result.value_of("slope").unwrap_or_default() - 2.0).abs() < 1e-6);
        assert!((result.value_of("y_intercept[0]").unwrap_or_default() - 1.0).abs() < 1e-6);
        assert!((result.value_of("y_intercept[1]").unwrap_or_default() - 2.0).abs() < 1e-6);
        assert_eq!(result.ndf, 8 - 3);
    }

    #[test]
    fn setting_parameters_before_the_minimizer_exists_warns() {
        let rec = RecordingObserver::new();
        let mut mf = two_lines(&rec);
        mf.autolink_parameters().unwrap();
        mf.set_parameters(&[1.5, 0.5], Some(&[0.1, 0.1])).unwrap();
        assert!(rec.warnings().contains(&FitEvent::MinimizerNotReady));
        assert_eq!(mf.parameter_values(), vec![1.5, 0.5]);
    }

    #[test]
    fn fixing_with_values_reduces_every_pair() {
        let rec = RecordingObserver::new();
        let mut mf = two_lines(&rec);
        mf.autolink_parameters().unwrap();
        mf.fix_parameters(["slope"], Some(&[2.5])).unwrap();
        assert_eq!(mf.pair_ndf(0), Some(3));
        assert_eq!(mf.pair_ndf(1), Some(3));

        let result = mf.do_fit(true, false).unwrap();
        assert_eq!(result.value_of("slope"), Some(2.5));
        assert_eq!(result.errors[0], 0.0);

        mf.release_parameters(Vec::<usize>::new()).unwrap();
        assert_eq!(mf.parameters().fixed_count(), 0);
        assert!(matches!(
            mf.fix_parameters(["slope"], Some(&[1.0, 2.0])),
            Err(FitError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn constraints_survive_relinking() {
        let rec = RecordingObserver::new();
        let mut mf = two_lines(&rec);
        mf.constrain_parameters(["slope[0]"], &[2.0], &[0.1]).unwrap();
        mf.autolink_parameters().unwrap();
        assert_eq!(mf.parameters().constrained_count(), 1);
        assert!(mf.parameters().get(0).is_constrained());
    }

    #[test]
    fn empty_multifit_cannot_fit() {
        let mut mf = Multifit::new();
        assert!(matches!(mf.do_fit(true, false), Err(FitError::InvalidDataset(_))));
    }
}
