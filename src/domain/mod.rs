//! Domain types used throughout the fitting engine.
//!
//! This module defines:
//!
//! - parameter references and specs (`ParamRef`, `ParamSpec`, `Constraint`)
//! - the ordered parameter state (`ParameterState`)
//! - run configuration (`FitConfig`)
//! - fit outputs (`FitResult`)

pub mod config;
pub mod params;
pub mod types;

pub use config::*;
pub use params::*;
pub use types::*;
