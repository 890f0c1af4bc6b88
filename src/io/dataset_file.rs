//! Dataset JSON files.
//!
//! ```json
//! {
//!   "name": "iu",
//!   "x": [0.5, 1.0],
//!   "y": [0.5, 0.89],
//!   "x_errors": 0.1,
//!   "y_errors": [0.1, 0.12],
//!   "y_correlated_error": 0.05
//! }
//! ```
//!
//! Every error field is optional. Errors of the same axis add up.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::data::{Dataset, XYDataset};
use crate::domain::Axis;
use crate::error::FitError;

/// A single uncorrelated error for every point, or one per point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorSpec {
    Constant(f64),
    PerPoint(Vec<f64>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_errors: Option<ErrorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_errors: Option<ErrorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_correlated_error: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_correlated_error: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_cov: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_cov: Option<Vec<Vec<f64>>>,
}

impl DatasetFile {
    pub fn into_dataset(self) -> Result<XYDataset, FitError> {
        let mut dataset = XYDataset::new(self.x, self.y)?;
        if let Some(name) = self.name {
            dataset = dataset.with_basename(name);
        }
        apply_axis(&mut dataset, Axis::X, self.x_errors, self.x_correlated_error, self.x_cov)?;
        apply_axis(&mut dataset, Axis::Y, self.y_errors, self.y_correlated_error, self.y_cov)?;
        Ok(dataset)
    }

    /// Diagonal-only description of a dataset (point errors from the covariance diagonal).
    pub fn from_dataset(dataset: &dyn Dataset) -> Self {
        let errors = |axis| {
            dataset.has_errors(axis).then(|| {
                ErrorSpec::PerPoint(
                    dataset
                        .raw_cov_mat(axis)
                        .diagonal()
                        .iter()
                        .map(|v| v.max(0.0).sqrt())
                        .collect(),
                )
            })
        };
        Self {
            name: dataset.basename().map(str::to_string),
            x: dataset.data(Axis::X).to_vec(),
            y: dataset.data(Axis::Y).to_vec(),
            x_errors: errors(Axis::X),
            y_errors: errors(Axis::Y),
            ..Self::default()
        }
    }
}

fn apply_axis(
    dataset: &mut XYDataset,
    axis: Axis,
    errors: Option<ErrorSpec>,
    correlated: Option<f64>,
    cov: Option<Vec<Vec<f64>>>,
) -> Result<(), FitError> {
    match errors {
        Some(ErrorSpec::Constant(sigma)) => dataset.add_simple_error(axis, sigma)?,
        Some(ErrorSpec::PerPoint(sigmas)) => dataset.add_point_errors(axis, &sigmas)?,
        None => {}
    }
    if let Some(sigma) = correlated {
        dataset.add_correlated_error(axis, sigma)?;
    }
    if let Some(rows) = cov {
        let n = rows.len();
        if rows.iter().any(|r| r.len() != n) {
            return Err(FitError::InvalidDataset(format!(
                "{} covariance matrix rows must all have {n} entries",
                axis.label()
            )));
        }
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        dataset.add_cov_mat(axis, DMatrix::from_row_slice(n, n, &flat))?;
    }
    Ok(())
}

pub fn read_dataset(path: &Path) -> Result<XYDataset, FitError> {
    let file = File::open(path).map_err(|source| FitError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: DatasetFile = serde_json::from_reader(BufReader::new(file)).map_err(|source| FitError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let mut dataset = raw.into_dataset()?;
    if dataset.basename().is_none() {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            dataset = dataset.with_basename(stem);
        }
    }
    Ok(dataset)
}

pub fn write_dataset_file(path: &Path, dataset: &dyn Dataset) -> Result<(), FitError> {
    let file = File::create(path).map_err(|source| FitError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(file, &DatasetFile::from_dataset(dataset)).map_err(|source| FitError::Json {
        path: path.to_path_buf(),
        source,
    })
}
