//! Domain-specific error types for uplan

use thiserror::Error;

use crate::clients::ProviderError;

/// Main error type for plan and todo generation
#[derive(Error, Debug)]
pub enum UplanError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Provider error: {message}")]
    Provider { message: String },

    #[error("Extraction error: {message}")]
    Extraction { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Review error: {message}")]
    Review { message: String },

    #[error("Document rejected: {message}")]
    Rejected { message: String },

    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<UplanError>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl UplanError {
    /// Whether the workflow absorbs this error and moves on to the next attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UplanError::Provider { .. }
                | UplanError::Extraction { .. }
                | UplanError::Validation { .. }
                | UplanError::Serialization { .. }
                | UplanError::Rejected { .. }
        )
    }
}

impl From<serde_json::Error> for UplanError {
    fn from(err: serde_json::Error) -> Self {
        UplanError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for UplanError {
    fn from(err: toml::ser::Error) -> Self {
        UplanError::Serialization {
            message: format!("TOML encoding failed: {}", err),
        }
    }
}

impl From<toml::de::Error> for UplanError {
    fn from(err: toml::de::Error) -> Self {
        UplanError::Serialization {
            message: format!("TOML parsing failed: {}", err),
        }
    }
}

impl From<std::io::Error> for UplanError {
    fn from(err: std::io::Error) -> Self {
        UplanError::Storage {
            message: err.to_string(),
        }
    }
}

impl From<ProviderError> for UplanError {
    fn from(err: ProviderError) -> Self {
        UplanError::Provider {
            message: err.to_string(),
        }
    }
}

/// Result type alias for uplan operations
pub type Result<T> = std::result::Result<T, UplanError>;
