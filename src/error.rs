//! Error types for the mlsense pipeline

use thiserror::Error;

/// Result type alias for mlsense operations
pub type Result<T> = std::result::Result<T, MlSenseError>;

/// Main error type for the mlsense pipeline
#[derive(Error, Debug)]
pub enum MlSenseError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unsupported method {method}: requires {requirement}")]
    UnsupportedMethod {
        method: String,
        requirement: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for MlSenseError {
    fn from(err: serde_json::Error) -> Self {
        MlSenseError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MlSenseError {
    fn from(err: ndarray::ShapeError) -> Self {
        MlSenseError::ShapeError {
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
        let err = MlSenseError::ValidationError("bad metric".to_string());
        assert_eq!(err.to_string(), "Validation error: bad metric");
    }

    #[test]
    fn test_unsupported_method_names_offender() {
        let err = MlSenseError::UnsupportedMethod {
            method: "Olden".to_string(),
            requirement: "a fitted neural network".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Olden"));
        assert!(msg.contains("neural network"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MlSenseError = io_err.into();
        assert!(matches!(err, MlSenseError::IoError(_)));
    }
}
