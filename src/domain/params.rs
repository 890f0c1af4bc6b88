//! Parameter state shared by single and joint fits.
//!
//! A `ParameterState` is an ordered, fixed-size list of parameters with a
//! name → index map built once at construction. All lifecycle operations
//! (set / fix / release / constrain) go through it, and every reference is
//! resolved before anything is mutated, so a bad reference never leaves the
//! state half-updated.

use std::collections::HashMap;

use crate::domain::{Constraint, ParamRef, ParamSpec};
use crate::error::FitError;
use crate::minimizer::MinimizerSetup;

/// Start error used when the caller does not supply one.
pub fn default_error(value: f64) -> f64 {
    if value == 0.0 { 0.1 } else { value.abs() / 10.0 }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    pub error: f64,
    pub fixed: bool,
    pub constraint: Option<Constraint>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            error: default_error(value),
            fixed: false,
            constraint: None,
        }
    }

    pub fn is_constrained(&self) -> bool {
        self.constraint.is_some_and(|c| c.is_active())
    }
}

#[derive(Debug, Clone)]
pub struct ParameterState {
    params: Vec<Parameter>,
    index: HashMap<String, usize>,
}

impl ParameterState {
    /// Build a state from names and start values; errors use [`default_error`].
    pub fn new(names: &[String], values: &[f64]) -> Result<Self, FitError> {
        FitError::check_len("parameter values", names.len(), values.len())?;
        let params = names
            .iter()
            .zip(values)
            .map(|(name, &value)| Parameter::new(name.clone(), value))
            .collect();
        Self::from_parameters(params)
    }

    pub fn empty() -> Self {
        Self {
            params: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn from_parameters(params: Vec<Parameter>) -> Result<Self, FitError> {
        let mut index = HashMap::with_capacity(params.len());
        for (i, p) in params.iter().enumerate() {
            if index.insert(p.name.clone(), i).is_some() {
                return Err(FitError::DuplicateParameter(p.name.clone()));
            }
        }
        Ok(Self { params, index })
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, id: usize) -> &Parameter {
        &self.params[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    pub fn errors(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.error).collect()
    }

    pub fn fixed_flags(&self) -> Vec<bool> {
        self.params.iter().map(|p| p.fixed).collect()
    }

    pub fn constraints(&self) -> Vec<Option<Constraint>> {
        self.params.iter().map(|p| p.constraint).collect()
    }

    pub fn fixed_count(&self) -> usize {
        self.params.iter().filter(|p| p.fixed).count()
    }

    pub fn constrained_count(&self) -> usize {
        self.params.iter().filter(|p| p.is_constrained()).count()
    }

    pub fn free_count(&self) -> usize {
        self.len() - self.fixed_count()
    }

    /// Resolve a reference to an index.
    pub fn resolve(&self, reference: &ParamRef) -> Result<usize, FitError> {
        match reference {
            ParamRef::Index(i) if *i < self.params.len() => Ok(*i),
            ParamRef::Index(_) => Err(FitError::invalid_parameter(reference)),
            ParamRef::Name(name) => self
                .index
                .get(name)
                .copied()
                .ok_or_else(|| FitError::invalid_parameter(reference)),
        }
    }

    pub fn resolve_all<I, R>(&self, references: I) -> Result<Vec<usize>, FitError>
    where
        I: IntoIterator<Item = R>,
        R: Into<ParamRef>,
    {
        references
            .into_iter()
            .map(|r| self.resolve(&r.into()))
            .collect()
    }

    /// Set all values (and optionally errors) at once.
    ///
    /// Returns `true` when the errors were filled in with defaults.
    pub fn set_values(&mut self, values: &[f64], errors: Option<&[f64]>) -> Result<bool, FitError> {
        FitError::check_len("parameter values", self.len(), values.len())?;
        if let Some(errors) = errors {
            FitError::check_len("parameter errors", self.len(), errors.len())?;
        }
        for (i, p) in self.params.iter_mut().enumerate() {
            p.value = values[i];
            p.error = match errors {
                Some(errors) => errors[i],
                None => default_error(values[i]),
            };
        }
        Ok(errors.is_none())
    }

    /// Set one parameter; returns its index and whether the error was defaulted.
    pub fn set_one(&mut self, reference: &ParamRef, spec: ParamSpec) -> Result<(usize, bool), FitError> {
        let id = self.resolve(reference)?;
        let p = &mut self.params[id];
        p.value = spec.value();
        p.error = spec.error().unwrap_or_else(|| default_error(spec.value()));
        Ok((id, spec.error().is_none()))
    }

    pub fn set_fixed(&mut self, id: usize, fixed: bool) {
        self.params[id].fixed = fixed;
    }

    pub fn set_value(&mut self, id: usize, value: f64) {
        self.params[id].value = value;
    }

    pub fn set_constraint(&mut self, id: usize, constraint: Constraint) {
        self.params[id].constraint = Some(constraint);
    }

    /// Copy values and errors reported by a minimizer.
    ///
    /// Fixed parameters keep their start error so it can be reused on release.
    pub fn update_from(&mut self, values: &[f64], errors: &[f64]) {
        for (p, (&v, &e)) in self.params.iter_mut().zip(values.iter().zip(errors)) {
            p.value = v;
            if !p.fixed {
                p.error = e;
            }
        }
    }

    pub fn minimizer_setup(&self) -> MinimizerSetup {
        MinimizerSetup {
            names: self.names(),
            values: self.values(),
            errors: self.errors(),
        }
    }
}
