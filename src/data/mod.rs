//! Measurement data: the `Dataset` contract, the in-memory `XYDataset` and a
//! seeded synthetic sample generator.

pub mod dataset;
pub mod sample;

pub use dataset::*;
pub use sample::*;
