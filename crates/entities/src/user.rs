//! Current-user context.

use serde::{Deserialize, Serialize};

/// Identifier of a user record.
pub type UserId = i64;

/// The user the workspace acts for.
///
/// Passed explicitly into the workspace instead of being read from ambient
/// session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// Identifier of the current user.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
}

impl UserContext {
    /// Creates a new user context.
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
        }
    }
}
