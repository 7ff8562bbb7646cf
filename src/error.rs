//! Error types for the pipeline search engine

use thiserror::Error;

/// Result type alias for sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Main error type for the sweep engine
#[derive(Error, Debug)]
pub enum SweepError {
    /// Empty or invalid candidate space, unknown identifiers
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single candidate's model fitting failed
    #[error("Fit error: {0}")]
    Fit(String),

    /// A single candidate's metric computation failed
    #[error("Evaluation error in {metric}: {reason}")]
    Evaluation { metric: String, reason: String },

    /// Report row does not match the header written by the first row
    #[error("Report schema mismatch: expected columns {expected:?}, got {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    ModelNotFitted,
}

impl SweepError {
    /// Shorthand for an evaluation failure of a named metric
    pub fn evaluation(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        SweepError::Evaluation {
            metric: metric.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts the whole run rather than a single candidate.
    ///
    /// Fit and evaluation failures (and the model-level errors that surface as them)
    /// are recovered locally by skipping the candidate.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SweepError::Fit(_)
                | SweepError::Evaluation { .. }
                | SweepError::Shape { .. }
                | SweepError::InvalidParameter { .. }
                | SweepError::ModelNotFitted
        )
    }
}

impl From<polars::error::PolarsError> for SweepError {
    fn from(err: polars::error::PolarsError) -> Self {
        SweepError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for SweepError {
    fn from(err: serde_json::Error) -> Self {
        SweepError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for SweepError {
    fn from(err: csv::Error) -> Self {
        SweepError::Csv(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SweepError {
    fn from(err: ndarray::ShapeError) -> Self {
        SweepError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SweepError::Configuration("no candidates".to_string());
        assert_eq!(err.to_string(), "Configuration error: no candidates");

        let err = SweepError::evaluation("roc", "single class");
        assert_eq!(err.to_string(), "Evaluation error in roc: single class");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SweepError = io_err.into();
        assert!(matches!(err, SweepError::Io(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_candidate_errors_are_recoverable() {
        assert!(!SweepError::Fit("degenerate input".into()).is_fatal());
        assert!(!SweepError::evaluation("reliability", "empty split").is_fatal());
        assert!(!SweepError::ModelNotFitted.is_fatal());
        assert!(SweepError::SchemaMismatch { expected: vec![], actual: vec![] }.is_fatal());
        assert!(SweepError::Configuration("x".into()).is_fatal());
    }
}
