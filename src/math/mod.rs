//! Mathematical utilities: covariance handling, the chi2 objective and
//! number rounding/formatting.

pub mod chi2;
pub mod cov;
pub mod rounding;

pub use chi2::*;
pub use cov::*;
pub use rounding::*;
