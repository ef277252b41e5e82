//! Article entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{TagId, UserId};

/// Identifier of an article record.
pub type ArticleId = i64;

/// Default vertical position of a cover image, in percent.
pub const DEFAULT_COVER_POSITION: u8 = 50;

/// Source of an article's cover image.
///
/// The three kinds are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CoverImage {
    /// No cover.
    #[default]
    None,
    /// Cover loaded from an external URL.
    Url(String),
    /// Uploaded cover, base64 encoded.
    Binary(String),
}

impl CoverImage {
    /// Returns true when the article has a cover of any kind.
    pub fn is_set(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// A hierarchical knowledge article as listed by the remote store.
///
/// The HTML body is not part of the listed row; it is fetched lazily per id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier.
    pub id: ArticleId,
    /// Display name.
    pub name: String,
    /// Parent article, `None` for roots.
    pub parent_id: Option<ArticleId>,
    /// Emoji or icon identifier.
    pub icon: Option<String>,
    /// False once archived.
    pub active: bool,
    /// Whether the article is visible to everyone.
    pub is_published: bool,
    /// Author of the article.
    pub author_id: UserId,
    /// User that created the record.
    pub create_uid: UserId,
    /// User that last wrote the record.
    pub write_uid: UserId,
    /// Number of recorded views.
    pub views_count: u64,
    /// Number of likes.
    pub likes_count: u64,
    /// Users that liked the article.
    pub liked_by_ids: Vec<UserId>,
    /// Users that marked the article as favorite.
    pub favorite_user_ids: Vec<UserId>,
    /// Attached tags.
    pub tag_ids: Vec<TagId>,
    /// Cover image.
    #[serde(default)]
    pub cover: CoverImage,
    /// Vertical crop position of the cover, 0..=100.
    #[serde(default = "default_cover_position")]
    pub cover_position: u8,
    /// Current version number.
    pub version: u32,
    /// Token used to build public share links.
    pub share_token: String,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

fn default_cover_position() -> u8 {
    DEFAULT_COVER_POSITION
}

impl Article {
    /// Creates a new published, active root article.
    pub fn new(id: ArticleId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            parent_id: None,
            icon: None,
            active: true,
            is_published: true,
            author_id: 0,
            create_uid: 0,
            write_uid: 0,
            views_count: 0,
            likes_count: 0,
            liked_by_ids: Vec::new(),
            favorite_user_ids: Vec::new(),
            tag_ids: Vec::new(),
            cover: CoverImage::None,
            cover_position: DEFAULT_COVER_POSITION,
            version: 1,
            share_token: Uuid::new_v4().simple().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the parent article.
    pub fn with_parent(mut self, parent_id: ArticleId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the author, which is also recorded as creator and last writer.
    pub fn with_author(mut self, author_id: UserId) -> Self {
        self.author_id = author_id;
        self.create_uid = author_id;
        self.write_uid = author_id;
        self
    }

    /// Sets the tags.
    pub fn with_tags(mut self, tag_ids: impl IntoIterator<Item = TagId>) -> Self {
        self.tag_ids = tag_ids.into_iter().collect();
        self
    }

    /// Sets the icon.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Marks the article as archived.
    pub fn archived(mut self) -> Self {
        self.active = false;
        self
    }

    /// Marks the article as unpublished.
    pub fn unpublished(mut self) -> Self {
        self.is_published = false;
        self
    }

    /// Marks the article as a favorite of the given user.
    pub fn favorite_of(mut self, user_id: UserId) -> Self {
        if !self.favorite_user_ids.contains(&user_id) {
            self.favorite_user_ids.push(user_id);
        }
        self
    }

    /// Returns true when the given user marked this article as favorite.
    pub fn is_favorite_of(&self, user_id: UserId) -> bool {
        self.favorite_user_ids.contains(&user_id)
    }

    /// Returns true when the given user liked this article.
    pub fn is_liked_by(&self, user_id: UserId) -> bool {
        self.liked_by_ids.contains(&user_id)
    }

    /// Returns true when the given user authored this article.
    pub fn is_authored_by(&self, user_id: UserId) -> bool {
        self.author_id == user_id
    }

    /// Returns true when the article belongs to the user's private section:
    /// authored by them and not published.
    pub fn is_private_to(&self, user_id: UserId) -> bool {
        self.is_authored_by(user_id) && !self.is_published
    }

    /// Returns true when the article shares at least one tag with `tags`.
    pub fn has_any_tag(&self, tags: &[TagId]) -> bool {
        self.tag_ids.iter().any(|tag| tags.contains(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_creation() {
        let article = Article::new(7, "Onboarding")
            .with_parent(3)
            .with_author(2)
            .with_tags([1, 4]);

        assert_eq!(article.name, "Onboarding");
        assert_eq!(article.parent_id, Some(3));
        assert_eq!(article.create_uid, 2);
        assert!(article.active);
        assert!(article.is_published);
        assert_eq!(article.cover_position, DEFAULT_COVER_POSITION);
        assert_eq!(article.share_token.len(), 32);
    }

    #[test]
    fn test_private_section_membership() {
        let article = Article::new(1, "Draft").with_author(5).unpublished();

        assert!(article.is_private_to(5));
        assert!(!article.is_private_to(6));
    }

    #[test]
    fn test_tag_overlap() {
        let article = Article::new(1, "Tagged").with_tags([2, 3]);

        assert!(article.has_any_tag(&[3, 9]));
        assert!(!article.has_any_tag(&[9]));
        assert!(!article.has_any_tag(&[]));
    }

    #[test]
    fn test_cover_serialization() {
        let cover = CoverImage::Url("https://example.com/a.png".to_string());
        let json = serde_json::to_value(&cover).unwrap();

        assert_eq!(json["type"], "url");
        assert_eq!(json["value"], "https://example.com/a.png");
        assert!(cover.is_set());
        assert!(!CoverImage::None.is_set());
    }
}
