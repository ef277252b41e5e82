//! Tag entity definitions.

use serde::{Deserialize, Serialize};

/// Identifier of a tag record.
pub type TagId = i64;

/// A label attached to articles and used for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Unique identifier.
    pub id: TagId,
    /// Display name.
    pub name: String,
}

impl Tag {
    /// Creates a new tag.
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Returns true when the tag name contains `query`, ignoring case.
    pub fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(&query.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_matches_case_insensitive() {
        let tag = Tag::new(1, "Onboarding");

        assert!(tag.matches("board"));
        assert!(tag.matches("ONB"));
        assert!(tag.matches(""));
        assert!(!tag.matches("billing"));
    }
}
