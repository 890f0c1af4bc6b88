//! Synthetic datasets drawn around a known model.
//!
//! Points are placed on an even grid of true x values. Both coordinates are
//! then smeared with independent Gaussian noise and the smearing widths are
//! recorded as the dataset's x and y errors.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::XYDataset;
use crate::domain::Axis;
use crate::error::FitError;
use crate::models::FitFunction;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleSpec {
    pub x_min: f64,
    pub x_max: f64,
    pub points: usize,
    pub x_error: f64,
    pub y_error: f64,
    pub seed: u64,
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            x_min: 0.0,
            x_max: 10.0,
            points: 20,
            x_error: 0.0,
            y_error: 0.1,
            seed: 42,
        }
    }
}

pub fn generate_sample(function: &FitFunction, params: &[f64], spec: &SampleSpec) -> Result<XYDataset, FitError> {
    FitError::check_len("model parameters", function.number_of_parameters(), params.len())?;
    if spec.points < 2 {
        return Err(FitError::InvalidDataset("a sample needs at least 2 points".to_string()));
    }
    if !(spec.x_min.is_finite() && spec.x_max.is_finite() && spec.x_max > spec.x_min) {
        return Err(FitError::InvalidDataset(format!(
            "invalid x range [{}, {}]",
            spec.x_min, spec.x_max
        )));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let x_noise = noise(spec.x_error)?;
    let y_noise = noise(spec.y_error)?;

    let step = (spec.x_max - spec.x_min) / (spec.points - 1) as f64;
    let mut xs = Vec::with_capacity(spec.points);
    let mut ys = Vec::with_capacity(spec.points);
    for i in 0..spec.points {
        let x_true = spec.x_min + step * i as f64;
        let y_true = function.call(x_true, params);
        xs.push(x_true + x_noise.map_or(0.0, |n| n.sample(&mut rng)));
        ys.push(y_true + y_noise.map_or(0.0, |n| n.sample(&mut rng)));
    }

    let mut dataset = XYDataset::new(xs, ys)?.with_basename(format!("{}_sample", function.name()));
    if spec.x_error > 0.0 {
        dataset.add_simple_error(Axis::X, spec.x_error)?;
    }
    if spec.y_error > 0.0 {
        dataset.add_simple_error(Axis::Y, spec.y_error)?;
    }
    Ok(dataset)
}

/// `None` for a zero width (no smearing on that axis).
fn noise(sigma: f64) -> Result<Option<Normal<f64>>, FitError> {
    if sigma == 0.0 {
        return Ok(None);
    }
    Normal::new(0.0, sigma)
        .map(Some)
        .map_err(|e| FitError::InvalidDataset(format!("noise width {sigma}: {e}")))
}
