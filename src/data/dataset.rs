//! Measurement data with per-axis covariance matrices.
//!
//! The fitting engine only ever reads from a dataset:
//!
//! - the ordered x and y arrays
//! - the covariance matrix of each axis (with a singular-matrix fallback)
//! - whether an axis carries any uncertainty at all
//!
//! `XYDataset` is the in-memory implementation. Errors are accumulated into
//! one covariance matrix per axis as they are added.

use nalgebra::{DMatrix, DVector};

use crate::domain::Axis;
use crate::error::FitError;
use crate::math::{CovFallback, diagonal_fallback, is_singular};
use crate::math::rounding::format_g;

/// Covariance matrix of one axis, with the substitute used when it was singular.
#[derive(Debug, Clone)]
pub struct AxisCovariance {
    pub matrix: DMatrix<f64>,
    pub fallback: Option<CovFallback>,
}

pub trait Dataset {
    /// Name used for log files; `None` means "untitled".
    fn basename(&self) -> Option<&str>;

    fn size(&self) -> usize;

    fn data(&self, axis: Axis) -> &[f64];

    fn has_errors(&self, axis: Axis) -> bool;

    /// Raw covariance matrix of `axis` (all zeros when it has no errors).
    fn raw_cov_mat(&self, axis: Axis) -> &DMatrix<f64>;

    /// Covariance matrix of `axis`.
    ///
    /// With `fallback_on_singular`, a singular matrix is replaced by its
    /// diagonal and the substitution is reported back.
    fn cov_mat(&self, axis: Axis, fallback_on_singular: bool) -> AxisCovariance {
        let raw = self.raw_cov_mat(axis);
        if fallback_on_singular && self.has_errors(axis) && is_singular(raw) {
            return AxisCovariance {
                matrix: diagonal_fallback(raw),
                fallback: Some(CovFallback::Diagonal),
            };
        }
        AxisCovariance {
            matrix: raw.clone(),
            fallback: None,
        }
    }

    /// Plain-text table of the data points and their total errors.
    fn formatted(&self) -> String {
        let x = self.data(Axis::X);
        let y = self.data(Axis::Y);
        let x_err: Vec<f64> = self.raw_cov_mat(Axis::X).diagonal().iter().map(|v| v.max(0.0).sqrt()).collect();
        let y_err: Vec<f64> = self.raw_cov_mat(Axis::Y).diagonal().iter().map(|v| v.max(0.0).sqrt()).collect();

        let mut out = String::new();
        out.push_str(&format!("{:<14}{:<14}{:<14}{:<14}\n", "x", "x error", "y", "y error"));
        for i in 0..self.size() {
            out.push_str(&format!(
                "{:<14}{:<14}{:<14}{:<14}\n",
                format_g(x[i]),
                format_g(x_err[i]),
                format_g(y[i]),
                format_g(y_err[i])
            ));
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct XYDataset {
    basename: Option<String>,
    x: Vec<f64>,
    y: Vec<f64>,
    cov_x: DMatrix<f64>,
    cov_y: DMatrix<f64>,
    has_x_errors: bool,
    has_y_errors: bool,
}

impl XYDataset {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, FitError> {
        if x.len() != y.len() {
            return Err(FitError::InvalidDataset(format!(
                "x has {} points but y has {}",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(FitError::InvalidDataset("dataset has no points".to_string()));
        }
        if let Some(bad) = x.iter().chain(&y).find(|v| !v.is_finite()) {
            return Err(FitError::InvalidDataset(format!("non-finite data value {bad}")));
        }
        let n = x.len();
        Ok(Self {
            basename: None,
            x,
            y,
            cov_x: DMatrix::zeros(n, n),
            cov_y: DMatrix::zeros(n, n),
            has_x_errors: false,
            has_y_errors: false,
        })
    }

    pub fn with_basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = Some(basename.into());
        self
    }

    /// Same uncorrelated error on every point of `axis`.
    pub fn add_simple_error(&mut self, axis: Axis, sigma: f64) -> Result<(), FitError> {
        let errors = vec![sigma; self.x.len()];
        self.add_point_errors(axis, &errors)
    }

    /// Uncorrelated per-point errors.
    pub fn add_point_errors(&mut self, axis: Axis, errors: &[f64]) -> Result<(), FitError> {
        FitError::check_len("point errors", self.x.len(), errors.len())?;
        check_errors(errors)?;
        let squared = DVector::from_iterator(errors.len(), errors.iter().map(|e| e * e));
        self.add_cov_mat(axis, DMatrix::from_diagonal(&squared))
    }

    /// Error fully correlated between all points (e.g. a common scale offset).
    pub fn add_correlated_error(&mut self, axis: Axis, sigma: f64) -> Result<(), FitError> {
        check_errors(&[sigma])?;
        let n = self.x.len();
        self.add_cov_mat(axis, DMatrix::from_element(n, n, sigma * sigma))
    }

    /// Add an arbitrary symmetric covariance matrix to `axis`.
    pub fn add_cov_mat(&mut self, axis: Axis, cov: DMatrix<f64>) -> Result<(), FitError> {
        let n = self.x.len();
        if cov.shape() != (n, n) {
            return Err(FitError::InvalidDataset(format!(
                "{} covariance matrix is {}x{}, expected {n}x{n}",
                axis.label(),
                cov.nrows(),
                cov.ncols()
            )));
        }
        if cov.iter().any(|v| !v.is_finite()) {
            return Err(FitError::InvalidDataset(format!(
                "{} covariance matrix has non-finite entries",
                axis.label()
            )));
        }
        let asymmetric = (0..n).any(|i| {
            (0..i).any(|j| (cov[(i, j)] - cov[(j, i)]).abs() > 1e-12 * cov[(i, j)].abs().max(cov[(j, i)].abs()).max(1.0))
        });
        if asymmetric {
            return Err(FitError::InvalidDataset(format!(
                "{} covariance matrix is not symmetric",
                axis.label()
            )));
        }
        let nonzero = cov.iter().any(|&v| v != 0.0);
        match axis {
            Axis::X => {
                self.cov_x += cov;
                self.has_x_errors |= nonzero;
            }
            Axis::Y => {
                self.cov_y += cov;
                self.has_y_errors |= nonzero;
            }
        }
        Ok(())
    }
}

impl Dataset for XYDataset {
    fn basename(&self) -> Option<&str> {
        self.basename.as_deref()
    }

    fn size(&self) -> usize {
        self.x.len()
    }

    fn data(&self, axis: Axis) -> &[f64] {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }

    fn has_errors(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.has_x_errors,
            Axis::Y => self.has_y_errors,
        }
    }

    fn raw_cov_mat(&self, axis: Axis) -> &DMatrix<f64> {
        match axis {
            Axis::X => &self.cov_x,
            Axis::Y => &self.cov_y,
        }
    }
}

fn check_errors(errors: &[f64]) -> Result<(), FitError> {
    match errors.iter().find(|e| !(e.is_finite() && **e >= 0.0)) {
        Some(bad) => Err(FitError::InvalidDataset(format!(
            "errors must be finite and non-negative, got {bad}"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> XYDataset {
        XYDataset::new(vec![1.0, 2.0, 3.0], vec![2.0, 4.1, 5.9]).unwrap()
    }

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(matches!(
            XYDataset::new(vec![1.0, 2.0], vec![1.0]),
            Err(FitError::InvalidDataset(_))
        ));
        assert!(XYDataset::new(vec![], vec![]).is_err());
    }

    #[test]
    fn errors_accumulate_into_covariance() {
        let mut d = dataset();
        assert!(!d.has_errors(Axis::Y));
        d.add_simple_error(Axis::Y, 0.1).unwrap();
        d.add_correlated_error(Axis::Y, 0.2).unwrap();
        assert!(d.has_errors(Axis::Y));
        assert!(!d.has_errors(Axis::X));

        let cov = d.cov_mat(Axis::Y, false).matrix;
        assert!((cov[(0, 0)] - 0.05).abs() < 1e-12);
        assert!((cov[(0, 2)] - 0.04).abs() < 1e-12);
    }

    #[test]
    fn singular_covariance_falls_back_to_diagonal() {
        let mut d = dataset();
        d.add_correlated_error(Axis::Y, 0.3).unwrap();
        let plain = d.cov_mat(Axis::Y, false);
        assert!(plain.fallback.is_none());
        let cov = d.cov_mat(Axis::Y, true);
        assert_eq!(cov.fallback, Some(CovFallback::Diagonal));
        assert_eq!(cov.matrix[(0, 1)], 0.0);
        assert!((cov.matrix[(1, 1)] - 0.09).abs() < 1e-12);
    }

    #[test]
    fn point_errors_validate_shape_and_sign() {
        let mut d = dataset();
        assert!(matches!(
            d.add_point_errors(Axis::X, &[0.1, 0.1]),
            Err(FitError::ShapeMismatch { .. })
        ));
        assert!(d.add_point_errors(Axis::X, &[0.1, -0.1, 0.1]).is_err());
        d.add_point_errors(Axis::X, &[0.1, 0.2, 0.3]).unwrap();
        assert!((d.raw_cov_mat(Axis::X)[(2, 2)] - 0.09).abs() < 1e-12);
    }

    #[test]
    fn zero_errors_do_not_count_as_errors() {
        let mut d = dataset();
        d.add_simple_error(Axis::X, 0.0).unwrap();
        assert!(!d.has_errors(Axis::X));
    }

    #[test]
    fn formatted_table_lists_every_point() {
        let mut d = dataset().with_basename("demo");
        d.add_simple_error(Axis::Y, 0.5).unwrap();
        let table = d.formatted();
        assert_eq!(table.lines().count(), 4);
        assert!(table.contains("4.1"));
        assert!(table.contains("0.5"));
        assert_eq!(d.basename(), Some("demo"));
    }
}
