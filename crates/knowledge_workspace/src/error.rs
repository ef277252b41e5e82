//! Workspace error types.

use article_store::StoreError;
use entities::ArticleId;
use thiserror::Error;

/// Errors that can occur during workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The record store rejected or failed the request.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Entity not found in the loaded collection.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The operation needs an open article.
    #[error("No article is open")]
    NoActiveArticle,

    /// The current user may not perform the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Moving an article under itself or one of its descendants.
    #[error("Cannot move article {id} under {parent_id}")]
    InvalidMove { id: ArticleId, parent_id: ArticleId },

    /// Invalid user input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Preference file error.
    #[error("Preferences error: {0}")]
    Preferences(String),
}

impl WorkspaceError {
    /// Creates a not found error.
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }
}

/// Result type for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
