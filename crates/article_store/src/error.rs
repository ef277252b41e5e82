//! Article store error types.

use thiserror::Error;

/// Errors that can occur during article store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The request was rejected before reaching the record layer.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The current user may not perform the operation.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The host answered with a JSON-RPC error.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store is temporarily unable to serve requests.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Creates a not found error.
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns true for errors caused by missing records.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for article store operations.
pub type StoreResult<T> = Result<T, StoreError>;
