//! In-memory article store implementation for tests and demos.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use entities::{
    Article, ArticleId, ArticleVersion, Comment, CommentId, Tag, TagId, UserContext, UserId,
    VersionId, VersionSummary,
};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    html_word_diff, ArticleContent, ArticleFilter, ArticleStore, ArticleUpdate, FavoriteState,
    LikeState, NewArticle, NewComment, StoreError, StoreResult,
};

/// One article of a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedArticle {
    pub id: ArticleId,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<ArticleId>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub is_published: bool,
    /// Defaults to the store's session user.
    #[serde(default)]
    pub author_id: Option<UserId>,
    #[serde(default)]
    pub favorite: bool,
}

fn default_true() -> bool {
    true
}

/// Initial content of a [`MemoryArticleStore`], usually read from JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub articles: Vec<SeedArticle>,
}

/// In-memory article store.
///
/// Every trait call is counted so tests can assert on remote traffic, and
/// writes can be slowed down or made to fail.
#[derive(Debug)]
pub struct MemoryArticleStore {
    user: UserContext,
    admin: AtomicBool,
    articles: Arc<RwLock<HashMap<ArticleId, Article>>>,
    contents: Arc<RwLock<HashMap<ArticleId, String>>>,
    tags: Arc<RwLock<HashMap<TagId, Tag>>>,
    versions: Arc<RwLock<HashMap<VersionId, ArticleVersion>>>,
    comments: Arc<RwLock<HashMap<ArticleId, Vec<Comment>>>>,
    next_id: AtomicI64,
    calls: Mutex<HashMap<&'static str, usize>>,
    fetched_content: Mutex<Vec<ArticleId>>,
    read_delay_ms: AtomicU64,
    write_delay_ms: AtomicU64,
    failing_writes: AtomicBool,
    failing_reads: AtomicBool,
    failing_view_counter: AtomicBool,
}

impl Default for MemoryArticleStore {
    fn default() -> Self {
        Self::new(UserContext::new(1, "Administrator"))
    }
}

impl MemoryArticleStore {
    /// Creates an empty store acting for `user`.
    pub fn new(user: UserContext) -> Self {
        Self {
            user,
            admin: AtomicBool::new(false),
            articles: Arc::default(),
            contents: Arc::default(),
            tags: Arc::default(),
            versions: Arc::default(),
            comments: Arc::default(),
            next_id: AtomicI64::new(1),
            calls: Mutex::default(),
            fetched_content: Mutex::default(),
            read_delay_ms: AtomicU64::new(0),
            write_delay_ms: AtomicU64::new(0),
            failing_writes: AtomicBool::new(false),
            failing_reads: AtomicBool::new(false),
            failing_view_counter: AtomicBool::new(false),
        }
    }

    /// Creates a store populated from a seed.
    pub async fn from_seed(user: UserContext, seed: StoreSeed) -> Self {
        let store = Self::new(user);
        for tag in seed.tags {
            store.insert_tag(tag).await;
        }
        for seeded in seed.articles {
            let author = seeded.author_id.unwrap_or(store.user.user_id);
            let mut article = Article::new(seeded.id, seeded.name)
                .with_author(author)
                .with_tags(seeded.tag_ids);
            article.parent_id = seeded.parent_id;
            article.icon = seeded.icon;
            article.active = seeded.active;
            article.is_published = seeded.is_published;
            if seeded.favorite {
                article = article.favorite_of(store.user.user_id);
            }
            store.insert_article(article, seeded.content).await;
        }
        store
    }

    /// Grants or revokes administrator rights for the session user.
    pub fn set_admin(&self, admin: bool) {
        self.admin.store(admin, Ordering::SeqCst);
    }

    /// Makes every following content read and diff sleep for `delay` first.
    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Makes every following write sleep for `delay` before completing.
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Makes every following write fail until reset.
    pub fn set_failing_writes(&self, failing: bool) {
        self.failing_writes.store(failing, Ordering::SeqCst);
    }

    /// Makes content reads fail with [`StoreError::Unavailable`].
    pub fn set_failing_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    /// Makes view counter increments fail.
    pub fn set_failing_view_counter(&self, failing: bool) {
        self.failing_view_counter.store(failing, Ordering::SeqCst);
    }

    /// Inserts an article row with its content, bypassing versioning.
    pub async fn insert_article(&self, article: Article, content: impl Into<String>) {
        self.next_id.fetch_max(article.id + 1, Ordering::SeqCst);
        self.contents.write().await.insert(article.id, content.into());
        self.articles.write().await.insert(article.id, article);
    }

    /// Inserts a tag.
    pub async fn insert_tag(&self, tag: Tag) {
        self.next_id.fetch_max(tag.id + 1, Ordering::SeqCst);
        self.tags.write().await.insert(tag.id, tag);
    }

    /// Returns the stored content of an article without counting a fetch.
    pub async fn content_of(&self, id: ArticleId) -> Option<String> {
        self.contents.read().await.get(&id).cloned()
    }

    /// Number of times the given trait method was called.
    pub fn call_count(&self, method: &str) -> usize {
        let calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.get(method).copied().unwrap_or(0)
    }

    /// Every id whose content was requested, in request order.
    pub fn fetched_content_ids(&self) -> Vec<ArticleId> {
        self.fetched_content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, method: &'static str) {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        *calls.entry(method).or_default() += 1;
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn before_write(&self) -> StoreResult<()> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes are disabled".to_string()));
        }
        Ok(())
    }

    fn snapshot(&self, article: &Article, content: &str) -> ArticleVersion {
        ArticleVersion {
            id: self.next_id(),
            article_id: article.id,
            version_number: article.version,
            name: article.name.clone(),
            content: content.to_string(),
            icon: article.icon.clone(),
            cover: article.cover.clone(),
            cover_position: article.cover_position,
            user_id: Some(self.user.user_id),
            created_at: Utc::now(),
        }
    }
}

/// Returns true when `candidate` is `id` or lies below it.
fn is_self_or_descendant(
    articles: &HashMap<ArticleId, Article>,
    id: ArticleId,
    candidate: ArticleId,
) -> bool {
    let mut visited = HashSet::new();
    let mut current = Some(candidate);
    while let Some(node) = current {
        if node == id {
            return true;
        }
        if !visited.insert(node) {
            return false;
        }
        current = articles.get(&node).and_then(|a| a.parent_id);
    }
    false
}

fn descendants_of(articles: &HashMap<ArticleId, Article>, id: ArticleId) -> Vec<ArticleId> {
    articles
        .values()
        .filter(|a| a.id != id && is_self_or_descendant(articles, id, a.id))
        .map(|a| a.id)
        .collect()
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    // =========================================================================
    // Read operations
    // =========================================================================

    async fn list_articles(&self, filter: ArticleFilter) -> StoreResult<Vec<Article>> {
        self.record("list_articles");
        let articles = self.articles.read().await;
        let mut result: Vec<Article> = articles
            .values()
            .filter(|a| filter.include_archived || a.active)
            .filter(|a| {
                filter
                    .ids
                    .as_ref()
                    .map(|ids| ids.contains(&a.id))
                    .unwrap_or(true)
            })
            .filter(|a| {
                filter
                    .parent_id
                    .map(|parent| a.parent_id == Some(parent))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        result.sort_by_key(|a| a.id);

        if let Some(offset) = filter.offset {
            result = result.into_iter().skip(offset as usize).collect();
        }
        if let Some(limit) = filter.limit {
            result.truncate(limit as usize);
        }

        Ok(result)
    }

    async fn read_article(&self, id: ArticleId) -> StoreResult<Option<Article>> {
        self.record("read_article");
        let articles = self.articles.read().await;
        Ok(articles.get(&id).cloned())
    }

    async fn read_content(&self, ids: &[ArticleId]) -> StoreResult<Vec<ArticleContent>> {
        self.record("read_content");
        self.fetched_content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(ids);

        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads are disabled".to_string()));
        }

        let contents = self.contents.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                contents.get(id).map(|content| ArticleContent {
                    id: *id,
                    content: content.clone(),
                })
            })
            .collect())
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        self.record("list_tags");
        let tags = self.tags.read().await;
        let mut result: Vec<Tag> = tags.values().cloned().collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn list_versions(&self, article_id: ArticleId) -> StoreResult<Vec<VersionSummary>> {
        self.record("list_versions");
        let versions = self.versions.read().await;
        let mut result: Vec<VersionSummary> = versions
            .values()
            .filter(|v| v.article_id == article_id)
            .map(VersionSummary::from)
            .collect();
        result.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(result)
    }

    async fn read_version(&self, version_id: VersionId) -> StoreResult<Option<ArticleVersion>> {
        self.record("read_version");
        let versions = self.versions.read().await;
        Ok(versions.get(&version_id).cloned())
    }

    async fn list_comments(&self, article_id: ArticleId) -> StoreResult<Vec<Comment>> {
        self.record("list_comments");
        let comments = self.comments.read().await;
        let Some(thread) = comments.get(&article_id) else {
            return Ok(Vec::new());
        };

        let ids: HashSet<CommentId> = thread.iter().map(|c| c.id).collect();
        let mut result: Vec<Comment> = thread
            .iter()
            .cloned()
            .map(|mut c| {
                c.parent_id = c.parent_id.filter(|parent| ids.contains(parent));
                c
            })
            .collect();
        result.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    // =========================================================================
    // Write operations
    // =========================================================================

    async fn create_article(&self, new: NewArticle) -> StoreResult<Article> {
        self.record("create_article");
        self.before_write().await?;

        let mut articles = self.articles.write().await;
        if let Some(parent_id) = new.parent_id {
            if !articles.contains_key(&parent_id) {
                return Err(StoreError::not_found("Article", parent_id));
            }
        }

        let mut article = Article::new(self.next_id(), new.name)
            .with_author(self.user.user_id)
            .with_tags(new.tag_ids);
        article.parent_id = new.parent_id;
        article.is_published = new.is_published;
        article.icon = new.icon;
        article.cover = new.cover;
        article.cover_position = new.cover_position.min(100);

        debug!(article_id = article.id, parent_id = ?article.parent_id, "Created article");
        self.contents.write().await.insert(article.id, new.content);
        articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn write_article(&self, id: ArticleId, update: ArticleUpdate) -> StoreResult<Article> {
        self.record("write_article");
        self.before_write().await?;

        let mut articles = self.articles.write().await;
        if let Some(Some(parent_id)) = update.parent_id {
            if !articles.contains_key(&parent_id) {
                return Err(StoreError::not_found("Article", parent_id));
            }
            if is_self_or_descendant(&articles, id, parent_id) {
                return Err(StoreError::invalid_input(
                    "an article cannot be moved under itself or one of its descendants",
                ));
            }
        }

        let article = articles
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Article", id))?;
        let mut contents = self.contents.write().await;
        let current_content = contents.get(&id).cloned().unwrap_or_default();

        let changed = update.name.as_ref().is_some_and(|n| *n != article.name)
            || update
                .content
                .as_ref()
                .is_some_and(|c| *c != current_content)
            || update.icon.as_ref().is_some_and(|i| *i != article.icon)
            || update.cover.as_ref().is_some_and(|c| *c != article.cover)
            || update
                .cover_position
                .is_some_and(|p| p != article.cover_position);

        if changed {
            let snapshot = self.snapshot(article, &current_content);
            debug!(
                article_id = id,
                version = snapshot.version_number,
                "Recorded version snapshot"
            );
            self.versions.write().await.insert(snapshot.id, snapshot);
            article.version += 1;
        }

        update.apply_to(article);
        if let Some(content) = update.content {
            contents.insert(id, content);
        }
        article.write_uid = self.user.user_id;
        article.updated_at = Utc::now();

        Ok(article.clone())
    }

    // =========================================================================
    // Remote procedures
    // =========================================================================

    async fn increment_view(&self, id: ArticleId) -> StoreResult<()> {
        self.record("increment_view");
        if self.failing_view_counter.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("view counter is disabled".to_string()));
        }
        let mut articles = self.articles.write().await;
        if let Some(article) = articles.get_mut(&id) {
            article.views_count += 1;
        }
        Ok(())
    }

    async fn toggle_favorite(&self, id: ArticleId) -> StoreResult<FavoriteState> {
        self.record("toggle_favorite");
        self.before_write().await?;

        let uid = self.user.user_id;
        let mut articles = self.articles.write().await;
        let article = articles
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Article", id))?;

        let favorite = if article.is_favorite_of(uid) {
            article.favorite_user_ids.retain(|u| *u != uid);
            false
        } else {
            article.favorite_user_ids.push(uid);
            true
        };
        Ok(FavoriteState { favorite })
    }

    async fn toggle_like(&self, id: ArticleId) -> StoreResult<LikeState> {
        self.record("toggle_like");
        self.before_write().await?;

        let uid = self.user.user_id;
        let mut articles = self.articles.write().await;
        let article = articles
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Article", id))?;

        let you_liked = !article.is_liked_by(uid);
        if you_liked {
            article.liked_by_ids.push(uid);
        } else {
            article.liked_by_ids.retain(|u| *u != uid);
        }
        article.likes_count = article.liked_by_ids.len() as u64;

        Ok(LikeState {
            you_liked,
            liked_by_ids: article.liked_by_ids.clone(),
            likes_count: article.likes_count,
        })
    }

    async fn post_comment(
        &self,
        article_id: ArticleId,
        comment: NewComment,
    ) -> StoreResult<CommentId> {
        self.record("post_comment");
        self.before_write().await?;

        if comment.body.trim().is_empty() {
            return Err(StoreError::invalid_input("comment body is empty"));
        }
        if !self.articles.read().await.contains_key(&article_id) {
            return Err(StoreError::not_found("Article", article_id));
        }

        let mut comments = self.comments.write().await;
        let thread = comments.entry(article_id).or_default();
        let mut posted = Comment::new(self.next_id(), self.user.name.clone(), comment.body);
        if let Some(parent_id) = comment.parent_id {
            if thread.iter().any(|c| c.id == parent_id) {
                posted = posted.replying_to(parent_id);
            }
        }

        let id = posted.id;
        thread.push(posted);
        Ok(id)
    }

    async fn diff_versions(
        &self,
        article_id: ArticleId,
        old_version_id: VersionId,
        current_version_id: Option<VersionId>,
    ) -> StoreResult<String> {
        self.record("diff_versions");
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let live_content = match current_version_id {
            Some(_) => None,
            None => Some(
                self.contents
                    .read()
                    .await
                    .get(&article_id)
                    .cloned()
                    .unwrap_or_default(),
            ),
        };
        let versions = self.versions.read().await;
        let old = versions
            .get(&old_version_id)
            .filter(|v| v.article_id == article_id)
            .ok_or_else(|| StoreError::not_found("Version", old_version_id))?;

        let new_content = match (current_version_id, live_content) {
            (Some(current_id), _) => versions
                .get(&current_id)
                .filter(|v| v.article_id == article_id)
                .map(|v| v.content.clone())
                .ok_or_else(|| StoreError::not_found("Version", current_id))?,
            (None, live) => live.unwrap_or_default(),
        };

        Ok(html_word_diff(&old.content, &new_content))
    }

    async fn restore_version(
        &self,
        article_id: ArticleId,
        version_id: VersionId,
    ) -> StoreResult<Article> {
        self.record("restore_version");
        self.before_write().await?;

        let mut articles = self.articles.write().await;
        let article = articles
            .get_mut(&article_id)
            .ok_or_else(|| StoreError::not_found("Article", article_id))?;
        let mut contents = self.contents.write().await;
        let mut versions = self.versions.write().await;

        let version = versions
            .get(&version_id)
            .filter(|v| v.article_id == article_id)
            .cloned()
            .ok_or_else(|| StoreError::invalid_input("invalid version specified"))?;

        let current_content = contents.get(&article_id).cloned().unwrap_or_default();
        let snapshot = self.snapshot(article, &current_content);
        versions.insert(snapshot.id, snapshot);

        article.name = version.name;
        article.icon = version.icon;
        article.cover = version.cover;
        article.cover_position = version.cover_position;
        article.version += 1;
        article.write_uid = self.user.user_id;
        article.updated_at = Utc::now();
        contents.insert(article_id, version.content);

        debug!(article_id, version_id, "Restored version");
        Ok(article.clone())
    }

    async fn publish_tree(&self, id: ArticleId, publish: bool) -> StoreResult<()> {
        self.record("publish_tree");
        self.before_write().await?;

        let mut articles = self.articles.write().await;
        if !articles.contains_key(&id) {
            return Err(StoreError::not_found("Article", id));
        }
        let mut targets = descendants_of(&articles, id);
        targets.push(id);
        for target in targets {
            if let Some(article) = articles.get_mut(&target) {
                article.is_published = publish;
            }
        }
        Ok(())
    }

    async fn is_admin(&self) -> StoreResult<bool> {
        self.record("is_admin");
        Ok(self.admin.load(Ordering::SeqCst))
    }
}
