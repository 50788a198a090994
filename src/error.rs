//! Error types for the tabular AutoML pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AutomlError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum AutomlError {
    /// A required field could not be converted (percent columns)
    #[error("Parse error in column '{column}': cannot read '{value}' as a number")]
    ParseError { column: String, value: String },

    /// Feature set at transform/inference time differs from the fitted one
    #[error("Schema mismatch: expected features {expected:?}, got {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Nothing has been persisted yet at this location
    #[error("No trained artifact at '{location}'")]
    ArtifactNotFound { location: String },

    #[error("No model could be trained")]
    NoTrainedModels,

    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    #[error("Unknown category '{value}' for column '{column}'")]
    UnknownCategory { column: String, value: String },

    #[error("Training cancelled")]
    Cancelled,

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AutomlError {
    /// `true` for the "nothing saved yet" condition callers are expected to recover from.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, AutomlError::ArtifactNotFound { .. })
    }
}

impl From<polars::error::PolarsError> for AutomlError {
    fn from(err: polars::error::PolarsError) -> Self {
        AutomlError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for AutomlError {
    fn from(err: serde_json::Error) -> Self {
        AutomlError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for AutomlError {
    fn from(err: bincode::Error) -> Self {
        AutomlError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AutomlError {
    fn from(err: ndarray::ShapeError) -> Self {
        AutomlError::ShapeError {
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
        let err = AutomlError::ParseError {
            column: "sale".to_string(),
            value: "abc%".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Parse error in column 'sale': cannot read 'abc%' as a number"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AutomlError = io_err.into();
        assert!(matches!(err, AutomlError::IoError(_)));
        assert!(!err.is_not_ready());
    }

    #[test]
    fn test_artifact_not_found_is_recoverable() {
        let err = AutomlError::ArtifactNotFound {
            location: "best_model.bin".to_string(),
        };
        assert!(err.is_not_ready());
    }
}
