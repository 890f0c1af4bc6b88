use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the fitting library.
///
/// Numerical edge cases (singular matrices, zero derivative steps, missing
/// start errors, ...) never show up here; they are recovered locally and
/// reported through the fit observer instead.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("`{reference}` is not a valid parameter ID or name")]
    InvalidParameter { reference: String },

    #[error("{what}: expected {expected} entries, got {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("fit function `{function}` declares {declared} parameters but {recorded} defaults were recorded")]
    ArityMismatch {
        function: String,
        declared: usize,
        recorded: usize,
    },

    #[error("parameter name `{0}` is used more than once")]
    DuplicateParameter(String),

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("unknown model `{0}`")]
    UnknownModel(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("objective is not finite ({value}) at the requested parameters")]
    NonFiniteObjective { value: f64 },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FitError {
    pub fn invalid_parameter(reference: impl ToString) -> Self {
        FitError::InvalidParameter {
            reference: reference.to_string(),
        }
    }

    pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), Self> {
        if expected == found {
            Ok(())
        } else {
            Err(FitError::ShapeMismatch {
                what,
                expected,
                found,
            })
        }
    }
}

/// Error surfaced by the `chi2fit` binary, carrying its process exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match &err {
            FitError::Io { .. } | FitError::Json { .. } => 2,
            FitError::InvalidConfig(_) | FitError::UnknownModel(_) => 2,
            FitError::InvalidDataset(_) => 3,
            _ => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_errors_map_to_exit_codes() {
        let app: AppError = FitError::UnknownModel("cubic".to_string()).into();
        assert_eq!(app.exit_code(), 2);
        assert_eq!(app.to_string(), "unknown model `cubic`");

        let app: AppError = FitError::invalid_parameter("p9").into();
        assert_eq!(app.exit_code(), 4);
        assert!(app.to_string().contains("p9"));
    }

    #[test]
    fn check_len_reports_both_counts() {
        assert!(FitError::check_len("values", 3, 3).is_ok());
        let err = FitError::check_len("values", 3, 2).unwrap_err();
        assert_eq!(err.to_string(), "values: expected 3 entries, got 2");
    }
}
