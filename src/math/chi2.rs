//! The weighted least-squares objective and its goodness-of-fit probability.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::domain::Constraint;

/// `rᵀ C⁻¹ r` with `r = y - f(x; p)`.
pub fn residual_chi2<F>(x: &[f64], y: &[f64], cov_inv: &DMatrix<f64>, model: F) -> f64
where
    F: Fn(f64) -> f64,
{
    let r = DVector::from_iterator(y.len(), x.iter().zip(y).map(|(&xi, &yi)| yi - model(xi)));
    r.dot(&(cov_inv * &r))
}

/// Sum of the Gaussian penalties of all active constraints.
pub fn constraint_penalty(values: &[f64], constraints: &[Option<Constraint>]) -> f64 {
    values
        .iter()
        .zip(constraints)
        .filter_map(|(&v, c)| c.map(|c| c.penalty(v)))
        .sum()
}

/// Full objective: residual part plus constraint penalties.
pub fn chi2<F>(
    x: &[f64],
    y: &[f64],
    cov_inv: &DMatrix<f64>,
    values: &[f64],
    constraints: &[Option<Constraint>],
    model: F,
) -> f64
where
    F: Fn(f64) -> f64,
{
    residual_chi2(x, y, cov_inv, model) + constraint_penalty(values, constraints)
}

/// Upper-tail probability `P(χ² > chi2)` for `ndf` degrees of freedom.
///
/// NaN when `ndf <= 0` or the input is not finite.
pub fn chi2_probability(chi2: f64, ndf: i64) -> f64 {
    if ndf <= 0 || !chi2.is_finite() {
        return f64::NAN;
    }
    match ChiSquared::new(ndf as f64) {
        Ok(dist) => 1.0 - dist.cdf(chi2.max(0.0)),
        Err(_) => f64::NAN,
    }
}
