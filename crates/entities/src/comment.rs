//! Comment entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a comment message.
pub type CommentId = i64;

/// A comment posted on an article, optionally replying to another comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier.
    pub id: CommentId,
    /// Comment this one replies to.
    pub parent_id: Option<CommentId>,
    /// Author display name.
    pub author: String,
    /// Comment body.
    pub body: String,
    /// When the comment was posted.
    pub date: DateTime<Utc>,
}

impl Comment {
    /// Creates a new top-level comment posted now.
    pub fn new(id: CommentId, author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            parent_id: None,
            author: author.into(),
            body: body.into(),
            date: Utc::now(),
        }
    }

    /// Marks this comment as a reply.
    pub fn replying_to(mut self, parent_id: CommentId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}
