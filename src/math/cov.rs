//! Covariance matrix helpers.
//!
//! Everything here works on small dense `nalgebra` matrices (one row per data
//! point, or one row per parameter). Inversion never fails: a singular matrix
//! is replaced by a fallback and the caller is told which one was used.

use nalgebra::{DMatrix, DVector};

/// Which substitute was used for a singular matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CovFallback {
    /// Off-diagonal elements dropped.
    Diagonal,
    /// Moore-Penrose pseudo-inverse.
    PseudoInverse,
}

impl std::fmt::Display for CovFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CovFallback::Diagonal => write!(f, "diagonal-only matrix"),
            CovFallback::PseudoInverse => write!(f, "pseudo-inverse"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvertedCov {
    pub inverse: DMatrix<f64>,
    pub fallback: Option<CovFallback>,
}

/// Invert a covariance matrix, falling back when it is singular.
///
/// Order of attempts: Cholesky, LU, diagonal-only, SVD pseudo-inverse.
pub fn invert_or_fallback(cov: &DMatrix<f64>) -> InvertedCov {
    if let Some(inverse) = try_invert(cov) {
        return InvertedCov {
            inverse,
            fallback: None,
        };
    }

    let diagonal = diagonal_fallback(cov);
    if let Some(inverse) = try_invert(&diagonal) {
        return InvertedCov {
            inverse,
            fallback: Some(CovFallback::Diagonal),
        };
    }

    InvertedCov {
        inverse: pseudo_inverse(cov),
        fallback: Some(CovFallback::PseudoInverse),
    }
}

/// Smallest singular value, relative to the largest, below which a matrix
/// counts as singular.
pub const SINGULAR_RTOL: f64 = 1e-12;

/// Plain inverse, `None` when the matrix is singular or the result is not finite.
pub fn try_invert(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if m.nrows() != m.ncols() {
        return None;
    }
    if m.nrows() == 0 {
        return Some(DMatrix::zeros(0, 0));
    }
    if is_singular(m) {
        return None;
    }
    let inverse = match m.clone().cholesky() {
        Some(chol) => chol.inverse(),
        None => m.clone().try_inverse()?,
    };
    inverse.iter().all(|v| v.is_finite()).then_some(inverse)
}

/// Rank test on the singular values.
pub fn is_singular(m: &DMatrix<f64>) -> bool {
    if m.is_empty() {
        return false;
    }
    let sv = m.clone().singular_values();
    let largest = sv.max();
    !(largest > 0.0) || sv.min() <= SINGULAR_RTOL * largest
}

/// Copy of `m` with every off-diagonal element set to zero.
pub fn diagonal_fallback(m: &DMatrix<f64>) -> DMatrix<f64> {
    DMatrix::from_diagonal(&m.diagonal())
}

/// SVD pseudo-inverse with progressively looser cut-offs.
pub fn pseudo_inverse(m: &DMatrix<f64>) -> DMatrix<f64> {
    let scale = m.amax().max(f64::MIN_POSITIVE);
    let svd = m.clone().svd(true, true);
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(pinv) = svd.clone().pseudo_inverse(tol * scale) {
            if pinv.iter().all(|v| v.is_finite()) {
                return pinv;
            }
        }
    }
    DMatrix::zeros(m.ncols(), m.nrows())
}

/// Element-wise `|a - b| <= atol + rtol * |b|` (same convention as numpy).
pub fn allclose(a: &DMatrix<f64>, b: &DMatrix<f64>, rtol: f64, atol: f64) -> bool {
    a.shape() == b.shape()
        && a
            .iter()
            .zip(b.iter())
            .all(|(x, y)| (x - y).abs() <= atol + rtol * y.abs())
}

pub fn outer_product(v: &DVector<f64>) -> DMatrix<f64> {
    v * v.transpose()
}

/// Square roots of the diagonal; negative entries give 0.
pub fn errors_from_cov(cov: &DMatrix<f64>) -> Vec<f64> {
    cov.diagonal().iter().map(|v| v.max(0.0).sqrt()).collect()
}

/// Correlation matrix of a covariance matrix.
///
/// Rows and columns with a zero variance (fixed parameters) stay zero instead
/// of becoming NaN.
pub fn cov_to_cor(cov: &DMatrix<f64>) -> DMatrix<f64> {
    let sigma = errors_from_cov(cov);
    DMatrix::from_fn(cov.nrows(), cov.ncols(), |i, j| {
        let denom = sigma[i] * sigma[j];
        if denom > 0.0 { cov[(i, j)] / denom } else { 0.0 }
    })
}

pub fn to_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|row| row.iter().copied().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_matrix_inverts_without_fallback() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let inv = invert_or_fallback(&m);
        assert!(inv.fallback.is_none());
        let id = &m * &inv.inverse;
        assert!((id[(0, 0)] - 1.0).abs() < 1e-12);
        assert!(id[(0, 1)].abs() < 1e-12);
    }

    #[test]
    fn fully_correlated_matrix_falls_back_to_diagonal() {
        let m = DMatrix::from_element(3, 3, 0.04);
        assert!(is_singular(&m));
        let inv = invert_or_fallback(&m);
        assert_eq!(inv.fallback, Some(CovFallback::Diagonal));
        assert!((inv.inverse[(1, 1)] - 25.0).abs() < 1e-9);
        assert!(inv.inverse[(0, 1)].abs() < 1e-15);
    }

    #[test]
    fn zero_matrix_ends_with_pseudo_inverse() {
        let m = DMatrix::<f64>::zeros(2, 2);
        let inv = invert_or_fallback(&m);
        assert_eq!(inv.fallback, Some(CovFallback::PseudoInverse));
        assert!(inv.inverse.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn allclose_uses_relative_tolerance_only() {
        let a = DMatrix::from_row_slice(1, 2, &[1.0, 100.0]);
        let b = DMatrix::from_row_slice(1, 2, &[1.00005, 100.005]);
        assert!(allclose(&a, &b, 1e-4, 0.0));
        let c = DMatrix::from_row_slice(1, 2, &[1.0, 100.02]);
        assert!(!allclose(&a, &c, 1e-4, 0.0));
        let zero = DMatrix::<f64>::zeros(1, 2);
        assert!(allclose(&zero, &zero, 1e-4, 0.0));
    }

    #[test]
    fn correlation_ignores_zero_rows() {
        let cov = DMatrix::from_row_slice(3, 3, &[4.0, 2.0, 0.0, 2.0, 9.0, 0.0, 0.0, 0.0, 0.0]);
        let cor = cov_to_cor(&cov);
        assert!((cor[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((cor[(0, 1)] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(cor[(2, 2)], 0.0);
        assert_eq!(cor[(0, 2)], 0.0);
    }
}
