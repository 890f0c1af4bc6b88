//! `chi2fit` library crate.
//!
//! Chi2 fits of models to data with uncertainties on both axes. The binary
//! (`chi2fit`) is a thin wrapper around this library so that:
//!
//! - the fitting engines are testable without spawning processes
//! - other front-ends can drive [`fit::Fit`] and [`fit::Multifit`] directly
//!
//! Layout:
//!
//! - `data`: the `Dataset` contract, `XYDataset`, synthetic samples
//! - `models`: `FitFunction` and a small library of common functions
//! - `minimizer`: the `Minimizer` trait and an L-BFGS implementation on `argmin`
//! - `fit`: single and joint fits, including the x-error projection
//! - `report` / `io`: report text, log files, JSON input and export
//! - `observer`: structured fit events forwarded to `tracing`

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod minimizer;
pub mod models;
pub mod observer;
pub mod report;
