//! Per-fit log files.
//!
//! Each fit writes its report to `<dir>/<basename>.log`. A log left over from
//! an earlier run is never overwritten or deleted: it is moved to the first
//! free `<basename>.<n>.log` and a warning is emitted.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::FitError;
use crate::observer::{FitEvent, FitObserver};

pub const DEFAULT_BASENAME: &str = "untitled";

#[derive(Debug)]
pub struct FitLog {
    path: PathBuf,
    file: File,
}

impl FitLog {
    /// Create `<dir>/<basename>.log`, rotating an existing one out of the way.
    pub fn create(dir: &Path, basename: Option<&str>, observer: &dyn FitObserver) -> Result<Self, FitError> {
        fs::create_dir_all(dir).map_err(|source| FitError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let basename = basename.unwrap_or(DEFAULT_BASENAME);
        if let Some((from, to)) = rotate_old_log(dir, basename)? {
            observer.on_event(&FitEvent::OldLogRotated { from, to });
        }
        let path = log_path(dir, basename);
        let file = File::create(&path).map_err(|source| FitError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<label> <local timestamp>` line.
    pub fn write_timestamp(&mut self, label: &str) -> Result<(), FitError> {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        self.write_text(&format!("{label} {stamp}\n\n"))
    }

    pub fn write_text(&mut self, text: &str) -> Result<(), FitError> {
        self.file.write_all(text.as_bytes()).map_err(|source| FitError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

pub fn log_path(dir: &Path, basename: &str) -> PathBuf {
    dir.join(format!("{basename}.log"))
}

/// Move an existing `<basename>.log` to the first free `<basename>.<n>.log`.
///
/// Returns the `(from, to)` paths when a file was moved.
pub fn rotate_old_log(dir: &Path, basename: &str) -> Result<Option<(PathBuf, PathBuf)>, FitError> {
    let current = log_path(dir, basename);
    if !current.exists() {
        return Ok(None);
    }
    let mut id = 1usize;
    let target = loop {
        let candidate = dir.join(format!("{basename}.{id}.log"));
        if !candidate.exists() {
            break candidate;
        }
        id += 1;
    };
    fs::rename(&current, &target).map_err(|source| FitError::Io {
        path: current.clone(),
        source,
    })?;
    Ok(Some((current, target)))
}
