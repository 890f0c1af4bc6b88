//! Commonly used fit functions, selectable by name.

use crate::error::FitError;
use crate::models::FitFunction;

pub const MODEL_NAMES: [&str; 5] = [
    "constant_1par",
    "linear_2par",
    "quadratic_3par",
    "exp_2par",
    "gauss_3par",
];

/// `f(x) = constant`
pub fn constant_1par() -> FitFunction {
    builtin("constant_1par", &["constant"], &[1.0], |_, p| p[0], "constant")
}

/// `f(x) = slope * x + y_intercept`
pub fn linear_2par() -> FitFunction {
    builtin(
        "linear_2par",
        &["slope", "y_intercept"],
        &[1.0, 0.0],
        |x, p| p[0] * x + p[1],
        "slope * x + y_intercept",
    )
}

/// `f(x) = quad_coeff * x^2 + lin_coeff * x + const_coeff`
pub fn quadratic_3par() -> FitFunction {
    builtin(
        "quadratic_3par",
        &["quad_coeff", "lin_coeff", "const_coeff"],
        &[1.0, 0.0, 0.0],
        |x, p| p[0] * x * x + p[1] * x + p[2],
        "quad_coeff * x^2 + lin_coeff * x + const_coeff",
    )
}

/// `f(x) = constant_factor * exp(growth * x)`
pub fn exp_2par() -> FitFunction {
    builtin(
        "exp_2par",
        &["growth", "constant_factor"],
        &[0.1, 1.0],
        |x, p| p[1] * (p[0] * x).exp(),
        "constant_factor * exp(growth * x)",
    )
}

/// Normal density scaled by `scale`.
pub fn gauss_3par() -> FitFunction {
    builtin(
        "gauss_3par",
        &["mean", "sigma", "scale"],
        &[0.0, 1.0, 1.0],
        |x, p| {
            let z = (x - p[0]) / p[1];
            p[2] / ((2.0 * std::f64::consts::PI).sqrt() * p[1]) * (-0.5 * z * z).exp()
        },
        "scale / (sqrt(2 pi) sigma) * exp(-(x - mean)^2 / (2 sigma^2))",
    )
}

pub fn by_name(name: &str) -> Result<FitFunction, FitError> {
    match name {
        "constant_1par" => Ok(constant_1par()),
        "linear_2par" => Ok(linear_2par()),
        "quadratic_3par" => Ok(quadratic_3par()),
        "exp_2par" => Ok(exp_2par()),
        "gauss_3par" => Ok(gauss_3par()),
        other => Err(FitError::UnknownModel(other.to_string())),
    }
}

fn builtin(
    name: &str,
    names: &[&str],
    defaults: &[f64],
    func: fn(f64, &[f64]) -> f64,
    equation: &str,
) -> FitFunction {
    FitFunction::builtin(name, names, defaults, equation, func)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_model_resolves() {
        for name in MODEL_NAMES {
            let f = by_name(name).unwrap();
            assert_eq!(f.name(), name);
            assert_eq!(f.parameter_names().len(), f.parameter_defaults().len());
            assert!(f.equation().is_some());
        }
    }

    #[test]
    fn unknown_model_is_an_error() {
        assert!(matches!(by_name("cubic_4par"), Err(FitError::UnknownModel(n)) if n == "cubic_4par"));
    }

    #[test]
    fn gauss_peaks_at_mean() {
        let f = gauss_3par();
        let p = [1.5, 0.5, 2.0];
        let peak = f.call(1.5, &p);
        assert!((peak - 2.0 / ((2.0 * std::f64::consts::PI).sqrt() * 0.5)).abs() < 1e-12);
        assert!(f.call(2.0, &p) < peak);
    }
}
