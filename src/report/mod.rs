//! Reporting utilities: banner sections and the fit summary text.

pub mod format;

pub use format::*;
