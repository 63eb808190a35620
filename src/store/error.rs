//! Store collaborator error types

use thiserror::Error;

/// Errors raised by a document store backend.
///
/// The repository passes these through unchanged; it adds no retry or
/// translation on top of them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error reported by the MongoDB driver
    #[error("Document store driver error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// The store's "nothing matched" signal for find-and-modify operations
    #[error("No documents matched the filter")]
    NoDocuments,

    /// Query, update or pipeline used an operator the backend does not know
    #[error("Unsupported operator: {operator}")]
    UnsupportedOperator { operator: String },

    /// Query, update or pipeline is structurally invalid
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    /// Cursor failed while being drained
    #[error("Cursor failed after {position} documents")]
    CursorFault { position: usize },
}

impl StoreError {
    pub fn unsupported(operator: impl Into<String>) -> Self {
        Self::UnsupportedOperator {
            operator: operator.into(),
        }
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }
}

/// Type alias for results produced by store backends
pub type StoreResult<T> = Result<T, StoreError>;
