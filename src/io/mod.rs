//! Input/output helpers.
//!
//! - dataset JSON read/write (`dataset_file`)
//! - fit result export (`export`)
//! - per-fit log files with rotation (`logfile`)

pub mod dataset_file;
pub mod export;
pub mod logfile;

pub use dataset_file::*;
pub use export::*;
pub use logfile::*;
