//! Fit functions and a small library of common models.
//!
//! Models are plain callables with metadata so that the fitting code can stay
//! generic over them.

pub mod function;
pub mod library;

pub use function::*;
pub use library::*;
