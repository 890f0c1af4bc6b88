//! Chi2 fitting engines.
//!
//! Responsibilities:
//!
//! - hold one (dataset, function) pairing and its working covariance (`problem`)
//! - bound the x-uncertainty projection loop (`projection`)
//! - fit a single pairing (`single`)
//! - fit several pairings with linked parameters (`multifit`)

pub mod multifit;
pub mod problem;
pub mod projection;
pub mod single;

pub use multifit::*;
pub use problem::*;
pub use projection::*;
pub use single::*;
