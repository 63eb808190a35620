use thiserror::Error;

use crate::config::ConfigError;
use crate::logger::LoggerError;
use crate::repositories::RepositoryError;
use crate::store::StoreError;

/// Application-level error used by the web layer and at start-up.
///
/// Repository and store errors are folded into these variants so handlers can
/// return them with `?` and let [`axum::response::IntoResponse`] pick the
/// status code.
#[derive(Error, Debug)]
pub enum AppError {
    /// The requested resource does not exist
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Bad request error with descriptive message
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Missing, malformed or rejected credentials
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Authenticated caller lacks access to a specific resource.
    ///
    /// The middleware never produces this (a missing role is 401). Handlers
    /// return it after checking the caller against the resource they load.
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Document store failure
    #[error("Document store error")]
    Store {
        #[source]
        source: StoreError,
    },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            message: message.into(),
        }
    }

    /// Per-resource authorization failure, answered with 403.
    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        AppError::Store { source: error }
    }
}

impl From<RepositoryError> for AppError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::EntityNotFound => AppError::NotFound {
                message: error.to_string(),
            },
            RepositoryError::InvalidArgument { .. } | RepositoryError::InvalidId(_) => {
                AppError::BadRequest {
                    message: error.to_string(),
                }
            }
            RepositoryError::Store(source) => AppError::Store { source },
            other => AppError::Internal {
                source: anyhow::Error::new(other),
            },
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        let key = error.key().unwrap_or("settings").to_string();
        AppError::Configuration {
            key,
            source: anyhow::Error::new(error),
        }
    }
}

impl From<LoggerError> for AppError {
    fn from(error: LoggerError) -> Self {
        AppError::Configuration {
            key: "logger".to_string(),
            source: anyhow::Error::new(error),
        }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;
