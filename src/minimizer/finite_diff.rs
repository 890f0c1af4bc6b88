//! Finite-difference gradients and curvature matrices built on `finitediff`.
//!
//! `finitediff` differentiates with a fixed step of `sqrt(ε)` per coordinate.
//! The helpers here stretch the coordinates before handing them over, so the
//! caller chooses the step actually taken on the objective.

use finitediff::FiniteDiff;
use nalgebra::DMatrix;

/// Step `finitediff` takes on each coordinate it is given.
fn crate_step() -> f64 {
    f64::EPSILON.sqrt()
}

fn stretched(at: &[f64], offset: &[f64], stretch: f64) -> Vec<f64> {
    at.iter().zip(offset).map(|(a, d)| a + d * stretch).collect()
}

/// Central-difference gradient of `f` at `at`, stepping `step` along every axis.
pub fn central_gradient(at: &[f64], step: f64, f: &dyn Fn(&[f64]) -> f64) -> Vec<f64> {
    let stretch = step / crate_step();
    let zoomed = |z: &Vec<f64>| f(&stretched(at, z, stretch));
    vec![0.0_f64; at.len()]
        .central_diff(&zoomed)
        .into_iter()
        .map(|g| g / stretch)
        .collect()
}

/// Symmetric matrix of second derivatives of `f` at `at`.
///
/// Rows come from central differences of [`central_gradient`] (taken with
/// `gradient_step`) over `curvature_step`.
pub fn central_hessian(
    at: &[f64],
    gradient_step: f64,
    curvature_step: f64,
    f: &dyn Fn(&[f64]) -> f64,
) -> DMatrix<f64> {
    let n = at.len();
    let stretch = curvature_step / crate_step();
    let zoomed = |z: &Vec<f64>| central_gradient(&stretched(at, z, stretch), gradient_step, f);
    let rows = vec![0.0_f64; n].central_hessian(&zoomed);
    let mut hessian = DMatrix::from_fn(n, n, |i, j| rows[i][j] / stretch);
    symmetrize(&mut hessian);
    hessian
}

fn symmetrize(hessian: &mut DMatrix<f64>) {
    for i in 0..hessian.nrows() {
        for j in 0..i {
            let avg = 0.5 * (hessian[(i, j)] + hessian[(j, i)]);
            hessian[(i, j)] = avg;
            hessian[(j, i)] = avg;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(p: &[f64]) -> f64 {
        p[0].powi(3) + 2.0 * p[0] * p[1] + 0.5 * p[1] * p[1]
    }

    #[test]
    fn gradient_of_cubic() {
        let g = central_gradient(&[2.0, -1.0], 1e-4, &cubic);
        // (3x² + 2y, 2x + y)
        assert!((g[0] - 10.0).abs() < 1e-6, "{g:?}");
        assert!((g[1] - 3.0).abs() < 1e-6, "{g:?}");
    }

    #[test]
    fn hessian_of_cubic_is_symmetric() {
        let h = central_hessian(&[2.0, -1.0], 1e-4, 1e-3, &cubic);
        // [[6x, 2], [2, 1]]
        assert!((h[(0, 0)] - 12.0).abs() < 1e-5, "{h}");
        assert!((h[(0, 1)] - 2.0).abs() < 1e-5, "{h}");
        assert_eq!(h[(0, 1)], h[(1, 0)]);
        assert!((h[(1, 1)] - 1.0).abs() < 1e-5, "{h}");
    }

    #[test]
    fn steps_follow_the_requested_size() {
        // a narrow well sampled with steps far below the position itself
        let narrow = |p: &[f64]| 1e6 * p[0] * p[0];
        let h = central_hessian(&[1e-4], 1e-7, 1e-6, &narrow);
        assert!((h[(0, 0)] - 2e6).abs() < 1.0, "{h}");
    }
}
