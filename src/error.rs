//! Error taxonomy shared by every remote call and form handler.
//!
//! Nothing here is fatal to the process: callers either log and fall back to a
//! safe default, or show the `Display` text to the user as an inline message.

use thiserror::Error;

/// Application-wide error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Transport failure or an error reported by the identity provider / backend.
    #[error("{0}")]
    Provider(String),

    /// Input rejected locally before any network call.
    #[error("{0}")]
    Validation(String),

    /// A row or profile that was expected to exist is absent.
    #[error("{0}")]
    NotFound(String),

    /// The operation conflicts with existing data.
    #[error("{0}")]
    Conflict(String),

    /// Invalid configuration detected at startup.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Stable label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Provider(_) => "provider",
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Config(_) => "config",
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        AppError::Provider(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Provider(format!("Error sending request: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Provider(format!("Error parsing JSON: {}", err))
    }
}
