use serde::{Deserialize, Serialize};

/// Machine-readable error categories exposed to callers of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input field
    Validation,
    /// Operation requires a fitted model
    NotTrained,
    /// Training data lacks the required diversity or volume
    InsufficientData,
    /// Configuration names an algorithm that is not implemented
    UnsupportedAlgorithm,
    /// Persisted state could not be encoded or decoded
    Serialization,
    /// Filesystem failure while persisting state
    Io,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Model not trained: {0}")]
    NotTrained(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(
        #[from]
        #[serde(skip)]
        std::io::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the stable category for this error.
    /// This is the single source of truth for error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) => ErrorKind::Validation,
            Self::NotTrained(_) => ErrorKind::NotTrained,
            Self::InsufficientData(_) => ErrorKind::InsufficientData,
            Self::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Self::SerializationError(_) => ErrorKind::Serialization,
            Self::IoError(_) => ErrorKind::Io,
        }
    }

    /// True when the caller can fix the failure by changing its input or call order.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::NotTrained | ErrorKind::InsufficientData
        )
    }

    /// Convenience constructor for a validation failure on a named field.
    pub fn invalid_field(field: &str, message: impl std::fmt::Display) -> Self {
        ServiceError::ValidationError(format!("{}: {}", field, message))
    }
}

// Type aliases for the individual engine components
pub type DispositionError = ServiceError;
pub type ForecastError = ServiceError;
pub type AnomalyError = ServiceError;
pub type PersistenceError = ServiceError;

// Result extensions for easier error handling
pub trait ResultExt<T> {
    fn map_err_to_service(self) -> Result<T, ServiceError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<ServiceError>,
{
    fn map_err_to_service(self) -> Result<T, ServiceError> {
        self.map_err(|e| e.into())
    }
}
