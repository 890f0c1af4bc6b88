//! Fit functions `f(x; p1..pn)` with parameter metadata.
//!
//! A `FitFunction` is cheap to clone (the callable is reference counted) so the
//! same function can be shared by several fits.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::FitError;

pub type ModelFn = dyn Fn(f64, &[f64]) -> f64 + Send + Sync;

#[derive(Clone)]
pub struct FitFunction {
    name: String,
    parameter_names: Vec<String>,
    parameter_defaults: Vec<f64>,
    equation: Option<String>,
    func: Arc<ModelFn>,
}

impl FitFunction {
    /// Wrap a callable together with its parameter names and start values.
    ///
    /// Fails when names and defaults disagree in length or a name repeats.
    pub fn new<F>(name: impl Into<String>, names: &[&str], defaults: &[f64], func: F) -> Result<Self, FitError>
    where
        F: Fn(f64, &[f64]) -> f64 + Send + Sync + 'static,
    {
        let name = name.into();
        if names.len() != defaults.len() {
            return Err(FitError::ArityMismatch {
                function: name,
                declared: names.len(),
                recorded: defaults.len(),
            });
        }
        let mut seen = HashSet::new();
        for n in names {
            if !seen.insert(*n) {
                return Err(FitError::DuplicateParameter((*n).to_string()));
            }
        }
        Ok(Self {
            name,
            parameter_names: names.iter().map(|s| s.to_string()).collect(),
            parameter_defaults: defaults.to_vec(),
            equation: None,
            func: Arc::new(func),
        })
    }

    /// Construct from metadata already known to be consistent.
    pub(crate) fn builtin(
        name: &str,
        names: &[&str],
        defaults: &[f64],
        equation: &str,
        func: fn(f64, &[f64]) -> f64,
    ) -> Self {
        debug_assert_eq!(names.len(), defaults.len());
        Self {
            name: name.to_string(),
            parameter_names: names.iter().map(|s| s.to_string()).collect(),
            parameter_defaults: defaults.to_vec(),
            equation: Some(equation.to_string()),
            func: Arc::new(func),
        }
    }

    pub fn with_equation(mut self, equation: impl Into<String>) -> Self {
        self.equation = Some(equation.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number_of_parameters(&self) -> usize {
        self.parameter_names.len()
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    pub fn parameter_defaults(&self) -> &[f64] {
        &self.parameter_defaults
    }

    pub fn equation(&self) -> Option<&str> {
        self.equation.as_deref()
    }

    /// Unchecked evaluation; `params` must have the function's arity.
    #[inline]
    pub fn call(&self, x: f64, params: &[f64]) -> f64 {
        (self.func)(x, params)
    }

    pub fn evaluate(&self, x: f64, params: &[f64]) -> Result<f64, FitError> {
        FitError::check_len("parameter values", self.number_of_parameters(), params.len())?;
        Ok(self.call(x, params))
    }

    /// Gradient of `f` with respect to each parameter at `x`, by central
    /// differences with one step per parameter.
    pub fn derive_by_parameters(&self, x: f64, steps: &[f64], values: &[f64]) -> Result<Vec<f64>, FitError> {
        let n = self.number_of_parameters();
        FitError::check_len("parameter values", n, values.len())?;
        FitError::check_len("derivative steps", n, steps.len())?;

        let mut shifted = values.to_vec();
        let mut gradient = Vec::with_capacity(n);
        for (i, &h) in steps.iter().enumerate() {
            shifted[i] = values[i] + h;
            let up = self.call(x, &shifted);
            shifted[i] = values[i] - h;
            let down = self.call(x, &shifted);
            shifted[i] = values[i];
            gradient.push((up - down) / (2.0 * h));
        }
        Ok(gradient)
    }

    /// `df/dx` at every sample, by central differences with one step per sample.
    pub fn derive_by_x(&self, xs: &[f64], steps: &[f64], values: &[f64]) -> Result<Vec<f64>, FitError> {
        FitError::check_len("parameter values", self.number_of_parameters(), values.len())?;
        FitError::check_len("derivative steps", xs.len(), steps.len())?;
        Ok(xs
            .iter()
            .zip(steps)
            .map(|(&x, &h)| (self.call(x + h, values) - self.call(x - h, values)) / (2.0 * h))
            .collect())
    }

    /// `name(x; a, b, c)`
    pub fn signature(&self) -> String {
        format!("{}(x; {})", self.name, self.parameter_names.join(", "))
    }
}

impl fmt::Debug for FitFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitFunction")
            .field("name", &self.name)
            .field("parameter_names", &self.parameter_names)
            .field("parameter_defaults", &self.parameter_defaults)
            .field("equation", &self.equation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic() -> FitFunction {
        FitFunction::new("quadratic", &["a", "b", "c"], &[1.0, 0.0, 0.0], |x, p| {
            p[0] * x * x + p[1] * x + p[2]
        })
        .unwrap()
    }

    #[test]
    fn metadata_is_exposed() {
        let f = quadratic();
        assert_eq!(f.name(), "quadratic");
        assert_eq!(f.number_of_parameters(), 3);
        assert_eq!(f.parameter_defaults(), &[1.0, 0.0, 0.0]);
        assert_eq!(f.signature(), "quadratic(x; a, b, c)");
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let err = FitFunction::new("bad", &["a", "b"], &[1.0], |x, p| p[0] * x).unwrap_err();
        assert!(matches!(err, FitError::ArityMismatch { declared: 2, recorded: 1, .. }));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = FitFunction::new("bad", &["a", "a"], &[1.0, 2.0], |x, p| p[0] * x + p[1]).unwrap_err();
        assert!(matches!(err, FitError::DuplicateParameter(_)));
    }

    #[test]
    fn parameter_gradient_of_quadratic() {
        let f = quadratic();
        let g = f.derive_by_parameters(2.0, &[1e-3; 3], &[1.0, 2.0, 3.0]).unwrap();
        assert!((g[0] - 4.0).abs() < 1e-9);
        assert!((g[1] - 2.0).abs() < 1e-9);
        assert!((g[2] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn x_derivative_of_quadratic() {
        let f = quadratic();
        let d = f.derive_by_x(&[0.0, 1.0, 3.0], &[1e-3, 1e-2, 1e-1], &[1.0, 2.0, 3.0]).unwrap();
        // 2x + 2
        assert!((d[0] - 2.0).abs() < 1e-9);
        assert!((d[1] - 4.0).abs() < 1e-9);
        assert!((d[2] - 8.0).abs() < 1e-9);
    }

    #[test]
    fn wrong_value_count_is_an_error() {
        let f = quadratic();
        assert!(matches!(
            f.evaluate(1.0, &[1.0]),
            Err(FitError::ShapeMismatch { expected: 3, found: 1, .. })
        ));
        assert!(f.derive_by_x(&[1.0, 2.0], &[0.1], &[1.0, 0.0, 0.0]).is_err());
    }
}
