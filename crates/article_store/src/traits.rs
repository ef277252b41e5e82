//! Article store trait definitions.

use async_trait::async_trait;
use entities::{
    Article, ArticleId, ArticleVersion, Comment, CommentId, CoverImage, Tag, TagId, UserId,
    VersionId, VersionSummary,
};
use serde::{Deserialize, Serialize};

use crate::StoreResult;

/// Filter options for listing articles.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    /// Also return archived articles.
    pub include_archived: bool,
    /// Restrict to these ids.
    pub ids: Option<Vec<ArticleId>>,
    /// Restrict to direct children of this article.
    pub parent_id: Option<ArticleId>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

impl ArticleFilter {
    /// Every article, archived or not. The workspace loads this set once and
    /// filters locally.
    pub fn everything() -> Self {
        Self {
            include_archived: true,
            ..Default::default()
        }
    }

    /// Restricts the filter to the given ids.
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = ArticleId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }
}

/// Values for a new article record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArticle {
    pub name: String,
    pub parent_id: Option<ArticleId>,
    pub content: String,
    pub tag_ids: Vec<TagId>,
    pub is_published: bool,
    pub icon: Option<String>,
    pub cover: CoverImage,
    pub cover_position: u8,
}

impl NewArticle {
    /// Creates values for a published, empty root article.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: None,
            content: String::new(),
            tag_ids: Vec::new(),
            is_published: true,
            icon: None,
            cover: CoverImage::None,
            cover_position: entities::DEFAULT_COVER_POSITION,
        }
    }

    /// Sets the parent article.
    pub fn with_parent(mut self, parent_id: Option<ArticleId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Sets the initial HTML content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Sets the tags.
    pub fn with_tags(mut self, tag_ids: impl IntoIterator<Item = TagId>) -> Self {
        self.tag_ids = tag_ids.into_iter().collect();
        self
    }

    /// Sets the published flag.
    pub fn published(mut self, is_published: bool) -> Self {
        self.is_published = is_published;
        self
    }
}

/// Partial update of an article record. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleUpdate {
    pub name: Option<String>,
    /// `Some(None)` moves the article to the root.
    pub parent_id: Option<Option<ArticleId>>,
    pub content: Option<String>,
    pub tag_ids: Option<Vec<TagId>>,
    /// `Some(None)` removes the icon.
    pub icon: Option<Option<String>>,
    pub cover: Option<CoverImage>,
    pub cover_position: Option<u8>,
    pub is_published: Option<bool>,
    pub active: Option<bool>,
}

impl ArticleUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn parent(mut self, parent_id: Option<ArticleId>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn tags(mut self, tag_ids: impl IntoIterator<Item = TagId>) -> Self {
        self.tag_ids = Some(tag_ids.into_iter().collect());
        self
    }

    pub fn icon(mut self, icon: Option<String>) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn cover(mut self, cover: CoverImage) -> Self {
        self.cover = Some(cover);
        self
    }

    /// Sets the cover position, clamped to 0..=100.
    pub fn cover_position(mut self, position: u8) -> Self {
        self.cover_position = Some(position.min(100));
        self
    }

    pub fn published(mut self, is_published: bool) -> Self {
        self.is_published = Some(is_published);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Returns true when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns true when the update touches a field tracked by version
    /// snapshots.
    pub fn touches_versioned_fields(&self) -> bool {
        self.name.is_some()
            || self.content.is_some()
            || self.icon.is_some()
            || self.cover.is_some()
            || self.cover_position.is_some()
    }

    /// Applies the metadata part of this update to a local article row.
    /// Content is not part of the row and is ignored.
    pub fn apply_to(&self, article: &mut Article) {
        if let Some(name) = &self.name {
            article.name = name.clone();
        }
        if let Some(parent_id) = self.parent_id {
            article.parent_id = parent_id;
        }
        if let Some(tag_ids) = &self.tag_ids {
            article.tag_ids = tag_ids.clone();
        }
        if let Some(icon) = &self.icon {
            article.icon = icon.clone();
        }
        if let Some(cover) = &self.cover {
            article.cover = cover.clone();
        }
        if let Some(position) = self.cover_position {
            article.cover_position = position;
        }
        if let Some(is_published) = self.is_published {
            article.is_published = is_published;
        }
        if let Some(active) = self.active {
            article.active = active;
        }
    }
}

/// HTML body of one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleContent {
    pub id: ArticleId,
    pub content: String,
}

/// Like state returned by the host after toggling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    /// Whether the current user now likes the article.
    pub you_liked: bool,
    /// Every user that likes the article.
    pub liked_by_ids: Vec<UserId>,
    /// Number of likes.
    pub likes_count: u64,
}

/// Favorite state returned by the host after toggling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteState {
    /// Whether the article is now a favorite of the current user.
    pub favorite: bool,
}

/// A comment to post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub body: String,
    pub parent_id: Option<CommentId>,
}

impl NewComment {
    /// A top-level comment.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            parent_id: None,
        }
    }

    /// A reply to another comment.
    pub fn reply(parent_id: CommentId, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            parent_id: Some(parent_id),
        }
    }
}

/// Trait for article storage operations.
///
/// Implementations act on behalf of a single session user.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    // =========================================================================
    // Read operations
    // =========================================================================

    /// Lists article rows (without content).
    async fn list_articles(&self, filter: ArticleFilter) -> StoreResult<Vec<Article>>;

    /// Reads a single article row, archived or not.
    async fn read_article(&self, id: ArticleId) -> StoreResult<Option<Article>>;

    /// Reads the HTML body of the given articles. Unknown ids are skipped.
    async fn read_content(&self, ids: &[ArticleId]) -> StoreResult<Vec<ArticleContent>>;

    /// Lists every tag.
    async fn list_tags(&self) -> StoreResult<Vec<Tag>>;

    /// Lists the version snapshots of an article, newest first.
    async fn list_versions(&self, article_id: ArticleId) -> StoreResult<Vec<VersionSummary>>;

    /// Reads a version snapshot.
    async fn read_version(&self, version_id: VersionId) -> StoreResult<Option<ArticleVersion>>;

    /// Lists the comments of an article, oldest first.
    async fn list_comments(&self, article_id: ArticleId) -> StoreResult<Vec<Comment>>;

    // =========================================================================
    // Write operations
    // =========================================================================

    /// Creates an article and returns the stored row.
    async fn create_article(&self, article: NewArticle) -> StoreResult<Article>;

    /// Writes fields of an article and returns the stored row.
    async fn write_article(&self, id: ArticleId, update: ArticleUpdate) -> StoreResult<Article>;

    // =========================================================================
    // Remote procedures
    // =========================================================================

    /// Records a view of the article.
    async fn increment_view(&self, id: ArticleId) -> StoreResult<()>;

    /// Toggles the article in the current user's favorites.
    async fn toggle_favorite(&self, id: ArticleId) -> StoreResult<FavoriteState>;

    /// Toggles the current user's like on the article.
    async fn toggle_like(&self, id: ArticleId) -> StoreResult<LikeState>;

    /// Posts a comment on the article.
    async fn post_comment(&self, article_id: ArticleId, comment: NewComment)
        -> StoreResult<CommentId>;

    /// Computes an HTML diff from `old_version_id` to either
    /// `current_version_id` or, when `None`, the live article content.
    async fn diff_versions(
        &self,
        article_id: ArticleId,
        old_version_id: VersionId,
        current_version_id: Option<VersionId>,
    ) -> StoreResult<String>;

    /// Restores a version. The current state is snapshotted first. Returns
    /// the updated row.
    async fn restore_version(
        &self,
        article_id: ArticleId,
        version_id: VersionId,
    ) -> StoreResult<Article>;

    /// Publishes or unpublishes an article and all its descendants.
    async fn publish_tree(&self, id: ArticleId, publish: bool) -> StoreResult<()>;

    /// Returns true when the current user is an administrator.
    async fn is_admin(&self) -> StoreResult<bool>;
}
