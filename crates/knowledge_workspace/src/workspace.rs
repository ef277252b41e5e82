//! The workspace facade.
//!
//! [`KnowledgeWorkspace`] wires the tree, the document controller, search,
//! comments and version history to one [`ArticleStore`]. Every mutation is
//! written remotely first and applied to the local collection only after
//! the store confirmed it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use article_store::{ArticleFilter, ArticleStore, ArticleUpdate, LikeState, NewArticle};
use entities::{Article, ArticleId, CommentId, CoverImage, SortOrder, Tag, TagId, UserContext, VersionId};
use futures_util::future::try_join;
use rpc_protocol::routes;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    autosave::{AutoSaver, SaveStatus},
    cache::ContentCache,
    comments::{CommentThread, Comments},
    config::WorkspaceConfig,
    controller::{DocumentController, DocumentView, OpenOutcome},
    notify::Notifier,
    permissions::PermissionGuard,
    preferences::{PreferenceStore, Preferences},
    search::{Search, SearchHit},
    tree::{ArticleTree, Crumb, FilterSpec, SectionKind, Sections, TreeRow},
    versions::{DiffOutcome, VersionEntry, VersionHistory, VersionKey, VersionPreview},
    WorkspaceError, WorkspaceResult,
};

/// Title of articles created without one.
pub const DEFAULT_TITLE: &str = "Untitled";

/// A standalone HTML export of one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedArticle {
    pub file_name: String,
    pub html: String,
}

/// Client-side state of a knowledge workspace bound to one store.
pub struct KnowledgeWorkspace {
    config: WorkspaceConfig,
    user: UserContext,
    store: Arc<dyn ArticleStore>,
    notifier: Arc<dyn Notifier>,
    preference_store: Arc<dyn PreferenceStore>,
    cache: Arc<ContentCache>,
    tree: Arc<Mutex<ArticleTree>>,
    tags: Mutex<Vec<Tag>>,
    filter: Mutex<FilterSpec>,
    preferences: Mutex<Preferences>,
    controller: DocumentController,
    search: Search,
    comments: Comments,
    versions: VersionHistory,
    permissions: PermissionGuard,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl KnowledgeWorkspace {
    /// Creates a workspace and restores persisted preferences. Nothing is
    /// loaded until [`load`](Self::load).
    pub fn new(
        config: WorkspaceConfig,
        user: UserContext,
        store: Arc<dyn ArticleStore>,
        notifier: Arc<dyn Notifier>,
        preference_store: Arc<dyn PreferenceStore>,
    ) -> Self {
        let cache = Arc::new(ContentCache::new());
        let preferences = preference_store.load();
        let filter = preferences.filter();

        let mut tree = ArticleTree::new();
        tree.restore_expanded(preferences.expanded_ids.iter().copied());
        let tree = Arc::new(Mutex::new(tree));

        let saver = AutoSaver::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::clone(&notifier),
            config.autosave_debounce(),
        );
        let saved_rows = Arc::clone(&tree);
        saver.set_saved_hook(Arc::new(move |article: &Article| {
            lock(&saved_rows).upsert(article.clone());
        }));

        let controller = DocumentController::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            saver,
            Arc::clone(&notifier),
        );
        let search = Search::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            config.search_batch_cap,
            config.snippet_radius,
        );
        let comments = Comments::new(Arc::clone(&store), Arc::clone(&notifier));
        let versions = VersionHistory::new(Arc::clone(&store), Arc::clone(&notifier));
        let permissions = PermissionGuard::new(Arc::clone(&store), user.user_id);

        Self {
            config,
            user,
            store,
            notifier,
            preference_store,
            cache,
            tree,
            tags: Mutex::default(),
            filter: Mutex::new(filter),
            preferences: Mutex::new(preferences),
            controller,
            search,
            comments,
            versions,
            permissions,
        }
    }

    fn tree(&self) -> MutexGuard<'_, ArticleTree> {
        lock(&self.tree)
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn user(&self) -> &UserContext {
        &self.user
    }

    // =========================================================================
    // Loading and filtering
    // =========================================================================

    /// Loads every article and tag, filters and opens the last article (or
    /// the first visible one). A failed load leaves the current state as is.
    pub async fn load(&self) -> WorkspaceResult<Option<OpenOutcome>> {
        let loaded = try_join(
            self.store.list_articles(ArticleFilter::everything()),
            self.store.list_tags(),
        )
        .await;
        let (articles, tags) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "Failed to load articles");
                self.notifier.error("Failed to load articles");
                return Err(e.into());
            }
        };

        info!(articles = articles.len(), tags = tags.len(), "Loaded workspace");
        self.tree().replace_all(articles);
        *lock(&self.tags) = tags;

        let last_opened = lock(&self.preferences).last_article_id;
        self.refresh(last_opened).await
    }

    /// Re-applies the filter and fixes the selection: the open article stays
    /// when still visible, otherwise the first visible article opens, or
    /// nothing when the visible set is empty.
    async fn refresh(&self, preferred: Option<ArticleId>) -> WorkspaceResult<Option<OpenOutcome>> {
        let spec = lock(&self.filter).clone();
        if spec.search_in_content && spec.normalized_query().is_some() {
            self.cache.extract_all().await;
        }
        let current = self.controller.current();
        let (next, expanded) = {
            let mut tree = self.tree();
            tree.apply_filter(&spec, self.user.user_id, |id| self.cache.text(id));
            (tree.fix_selection(current.or(preferred)), tree.expanded_ids())
        };
        self.persist(|prefs| {
            prefs.remember_filter(&spec);
            prefs.expanded_ids = expanded;
        });

        if next == current {
            return Ok(None);
        }
        match next {
            Some(id) => self.open(id).await.map(Some),
            None => {
                self.controller.close().await?;
                Ok(None)
            }
        }
    }

    fn persist(&self, update: impl FnOnce(&mut Preferences)) {
        let snapshot = {
            let mut prefs = lock(&self.preferences);
            update(&mut prefs);
            prefs.clone()
        };
        if let Err(e) = self.preference_store.save(&snapshot) {
            warn!(error = %e, "Failed to persist preferences");
        }
    }

    /// Current filter.
    pub fn filter(&self) -> FilterSpec {
        lock(&self.filter).clone()
    }

    /// Every loaded tag.
    pub fn tags(&self) -> Vec<Tag> {
        lock(&self.tags).clone()
    }

    pub async fn set_query(&self, query: impl Into<String>) -> WorkspaceResult<Option<OpenOutcome>> {
        lock(&self.filter).query = query.into();
        self.refresh(None).await
    }

    /// Selects or deselects a tag filter.
    pub async fn toggle_tag(&self, tag_id: TagId) -> WorkspaceResult<Option<OpenOutcome>> {
        lock(&self.filter).toggle_tag(tag_id);
        self.refresh(None).await
    }

    pub async fn set_favorites_only(&self, favorites_only: bool) -> WorkspaceResult<Option<OpenOutcome>> {
        lock(&self.filter).favorites_only = favorites_only;
        self.refresh(None).await
    }

    pub async fn set_show_archived(&self, show_archived: bool) -> WorkspaceResult<Option<OpenOutcome>> {
        lock(&self.filter).show_archived = show_archived;
        self.refresh(None).await
    }

    pub async fn set_search_in_content(&self, enabled: bool) -> WorkspaceResult<Option<OpenOutcome>> {
        lock(&self.filter).search_in_content = enabled;
        self.refresh(None).await
    }

    pub async fn set_sort(&self, sort: SortOrder) -> WorkspaceResult<Option<OpenOutcome>> {
        lock(&self.filter).sort = sort;
        self.refresh(None).await
    }

    // =========================================================================
    // Tree
    // =========================================================================

    /// Visible articles in display order.
    pub fn visible_articles(&self) -> Vec<Article> {
        self.tree().visible_articles().into_iter().cloned().collect()
    }

    pub fn sections(&self) -> Sections {
        self.tree().sections(self.user.user_id)
    }

    /// Rows of one sidebar section.
    pub fn rows(&self, kind: SectionKind) -> Vec<TreeRow> {
        let query = lock(&self.filter).query.clone();
        let selected = self.controller.current();
        let tree = self.tree();
        let sections = tree.sections(self.user.user_id);
        let section = match kind {
            SectionKind::Favorites => &sections.favorites,
            SectionKind::Workspace => &sections.workspace,
            SectionKind::Private => &sections.private,
        };
        tree.rows(section, &query, selected)
    }

    pub fn breadcrumbs(&self, id: ArticleId) -> Vec<Crumb> {
        self.tree().breadcrumbs(id, self.config.breadcrumb_max_depth)
    }

    pub fn expand_all(&self) {
        let expanded = {
            let mut tree = self.tree();
            tree.expand_all();
            tree.expanded_ids()
        };
        self.persist(|prefs| prefs.expanded_ids = expanded);
    }

    pub fn collapse_all(&self) {
        let expanded = {
            let mut tree = self.tree();
            tree.collapse_all();
            tree.expanded_ids()
        };
        self.persist(|prefs| prefs.expanded_ids = expanded);
    }

    /// Flips one node. Returns the new state.
    pub fn toggle_expanded(&self, id: ArticleId) -> bool {
        let (expanded, ids) = {
            let mut tree = self.tree();
            let expanded = tree.toggle_expanded(id);
            (expanded, tree.expanded_ids())
        };
        self.persist(|prefs| prefs.expanded_ids = ids);
        expanded
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    pub fn preferences(&self) -> Preferences {
        lock(&self.preferences).clone()
    }

    /// Stores the sidebar width. Widths outside 150..=600 are ignored.
    pub fn set_sidebar_width(&self, width: u16) -> bool {
        let mut accepted = false;
        self.persist(|prefs| accepted = prefs.set_sidebar_width(width));
        accepted
    }

    /// Flips the collapsed sidebar flag. Returns the new state.
    pub fn toggle_sidebar(&self) -> bool {
        let mut collapsed = false;
        self.persist(|prefs| {
            prefs.sidebar_collapsed = !prefs.sidebar_collapsed;
            collapsed = prefs.sidebar_collapsed;
        });
        collapsed
    }

    // =========================================================================
    // Document
    // =========================================================================

    async fn article_row(&self, id: ArticleId) -> WorkspaceResult<Article> {
        let known = self.tree().get(id).cloned();
        if let Some(article) = known {
            return Ok(article);
        }
        let article = self
            .store
            .read_article(id)
            .await?
            .ok_or_else(|| WorkspaceError::not_found("Article", id))?;
        self.tree().upsert(article.clone());
        Ok(article)
    }

    /// Opens an article, flushing unsaved edits of the previous one first.
    pub async fn open(&self, id: ArticleId) -> WorkspaceResult<OpenOutcome> {
        let article = self.article_row(id).await?;
        let show_archived = lock(&self.filter).show_archived;
        let outcome = self.controller.open(article, show_archived).await?;
        if outcome.is_opened() {
            self.versions.close();
            self.persist(|prefs| prefs.last_article_id = Some(id));
        }
        Ok(outcome)
    }

    /// Opens the previous entry of the browsing history.
    pub async fn back(&self) -> WorkspaceResult<Option<OpenOutcome>> {
        match self.controller.step_back() {
            Some(id) => self.revisit(id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Opens the next entry of the browsing history.
    pub async fn forward(&self) -> WorkspaceResult<Option<OpenOutcome>> {
        match self.controller.step_forward() {
            Some(id) => self.revisit(id).await.map(Some),
            None => Ok(None),
        }
    }

    async fn revisit(&self, id: ArticleId) -> WorkspaceResult<OpenOutcome> {
        let article = self.article_row(id).await?;
        let show_archived = lock(&self.filter).show_archived;
        self.controller.revisit(article, show_archived).await
    }

    /// Selected article id.
    pub fn current(&self) -> Option<ArticleId> {
        self.controller.current()
    }

    /// Selected article row.
    pub fn current_article(&self) -> Option<Article> {
        let id = self.controller.current()?;
        let row = self.tree().get(id).cloned();
        row.or_else(|| self.controller.current_article())
    }

    pub fn document(&self) -> DocumentView {
        self.controller.view()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.controller.saver().status()
    }

    pub fn subscribe_save_status(&self) -> tokio::sync::watch::Receiver<SaveStatus> {
        self.controller.saver().subscribe()
    }

    /// Records an edit of the open document; it is saved after the debounce.
    pub fn edit(&self, content: impl Into<String>) -> WorkspaceResult<()> {
        self.controller.edit(content)
    }

    /// Saves the open document now.
    pub async fn save(&self) -> WorkspaceResult<()> {
        self.controller.save().await
    }

    /// Waits until every pending edit is written.
    pub async fn flush(&self) -> WorkspaceResult<()> {
        self.controller.flush().await
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Searches the visible articles by name and, when content search is on,
    /// by text.
    pub async fn search(&self, query: &str) -> Vec<SearchHit> {
        let candidates = self.visible_articles();
        let in_content = lock(&self.filter).search_in_content;
        self.search.search(&candidates, query, in_content).await
    }

    // =========================================================================
    // Article mutations
    // =========================================================================

    async fn write(&self, id: ArticleId, update: ArticleUpdate, success: &str) -> WorkspaceResult<Article> {
        match self.store.write_article(id, update).await {
            Ok(article) => {
                self.tree().upsert(article.clone());
                self.controller.refresh_metadata(&article);
                if !success.is_empty() {
                    self.notifier.success(success);
                }
                Ok(article)
            }
            Err(e) => {
                warn!(article_id = id, error = %e, "Failed to update article");
                self.notifier.error(&format!("Failed to update article: {}", e));
                Err(e.into())
            }
        }
    }

    /// Renames an article. Blank or unchanged names are ignored and return
    /// false.
    pub async fn rename(&self, id: ArticleId, name: &str) -> WorkspaceResult<bool> {
        let name = name.trim();
        let article = self.article_row(id).await?;
        if name.is_empty() || name == article.name {
            return Ok(false);
        }
        self.write(id, ArticleUpdate::new().name(name), "Article renamed")
            .await?;
        self.refresh(None).await?;
        Ok(true)
    }

    /// Moves an article under `parent_id`, or to the root.
    pub async fn move_article(&self, id: ArticleId, parent_id: Option<ArticleId>) -> WorkspaceResult<Article> {
        if let Some(parent) = parent_id {
            let tree = self.tree();
            if tree.get(parent).is_none() {
                return Err(WorkspaceError::not_found("Article", parent));
            }
            if tree.is_self_or_descendant(id, parent) {
                return Err(WorkspaceError::InvalidMove {
                    id,
                    parent_id: parent,
                });
            }
        }

        let article = self
            .write(id, ArticleUpdate::new().parent(parent_id), "Article moved")
            .await?;
        if let Some(parent) = parent_id {
            self.tree().set_expanded(parent, true);
        }
        self.refresh(None).await?;
        Ok(article)
    }

    /// Replaces the tags of an article.
    pub async fn set_tags(&self, id: ArticleId, tag_ids: Vec<TagId>) -> WorkspaceResult<Article> {
        let article = self
            .write(id, ArticleUpdate::new().tags(tag_ids), "Tags updated")
            .await?;
        self.refresh(None).await?;
        Ok(article)
    }

    /// Sets or, with `None` or a blank value, removes the icon.
    pub async fn set_icon(&self, id: ArticleId, icon: Option<&str>) -> WorkspaceResult<Article> {
        let icon = icon.map(str::trim).filter(|i| !i.is_empty()).map(str::to_string);
        let message = if icon.is_some() { "Icon updated" } else { "Icon removed" };
        self.write(id, ArticleUpdate::new().icon(icon), message).await
    }

    pub async fn set_cover(&self, id: ArticleId, cover: CoverImage) -> WorkspaceResult<Article> {
        let message = if cover.is_set() { "Cover updated" } else { "Cover removed" };
        self.write(id, ArticleUpdate::new().cover(cover), message).await
    }

    pub async fn remove_cover(&self, id: ArticleId) -> WorkspaceResult<Article> {
        self.set_cover(id, CoverImage::None).await
    }

    /// Sets the vertical cover position, clamped to 0..=100.
    pub async fn set_cover_position(&self, id: ArticleId, position: u8) -> WorkspaceResult<Article> {
        self.write(id, ArticleUpdate::new().cover_position(position), "")
            .await
    }

    /// Creates an article and opens it. Blank titles become
    /// [`DEFAULT_TITLE`].
    pub async fn create_article(
        &self,
        title: Option<&str>,
        parent_id: Option<ArticleId>,
        is_published: bool,
    ) -> WorkspaceResult<Article> {
        let name = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE);
        let new = NewArticle::new(name)
            .with_parent(parent_id)
            .published(is_published);

        let created = match self.store.create_article(new).await {
            Ok(created) => created,
            Err(e) => {
                warn!(parent_id = ?parent_id, error = %e, "Failed to create article");
                self.notifier.error(&format!("Failed to create article: {}", e));
                return Err(e.into());
            }
        };
        info!(article_id = created.id, parent_id = ?parent_id, "Created article");

        {
            let mut tree = self.tree();
            tree.upsert(created.clone());
            if let Some(parent) = parent_id {
                tree.set_expanded(parent, true);
            }
        }
        self.refresh(None).await?;
        self.open(created.id).await?;
        self.notifier
            .success(&format!("Article \"{}\" created", created.name));
        Ok(created)
    }

    /// Creates a published article under the open one, or at the root.
    pub async fn quick_create(&self, title: Option<&str>) -> WorkspaceResult<Article> {
        let parent = self.controller.current();
        self.create_article(title, parent, true).await
    }

    /// Copies an article with its content, tags, parent and publish state.
    /// The name defaults to `"<name> (copy)"`.
    pub async fn copy(&self, id: ArticleId, name: Option<&str>) -> WorkspaceResult<Article> {
        self.controller.flush().await?;
        let source = self
            .store
            .read_article(id)
            .await?
            .ok_or_else(|| WorkspaceError::not_found("Article", id))?;

        let name = match name.map(str::trim) {
            Some("") => return Err(WorkspaceError::InvalidInput("name cannot be empty".to_string())),
            Some(name) => name.to_string(),
            None => format!("{} (copy)", source.name),
        };

        let content = self
            .store
            .read_content(&[id])
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .map(|c| c.content)
            .unwrap_or_default();

        let new = NewArticle::new(name)
            .with_parent(source.parent_id)
            .with_content(content.clone())
            .with_tags(source.tag_ids.clone())
            .published(source.is_published);
        let created = match self.store.create_article(new).await {
            Ok(created) => created,
            Err(e) => {
                warn!(article_id = id, error = %e, "Failed to copy article");
                self.notifier.error("Failed to copy article");
                return Err(e.into());
            }
        };
        debug!(source_id = id, article_id = created.id, "Copied article");

        self.cache.insert(created.id, content);
        self.cache.schedule_extract(created.id);
        self.tree().upsert(created.clone());
        self.refresh(None).await?;
        self.open(created.id).await?;
        self.notifier.success("Article copied");
        Ok(created)
    }

    /// Publishes or unpublishes an article, with `recursive` also its
    /// descendants.
    pub async fn set_published(&self, id: ArticleId, publish: bool, recursive: bool) -> WorkspaceResult<()> {
        let status = if publish { "published" } else { "unpublished" };
        if recursive {
            if let Err(e) = self.store.publish_tree(id, publish).await {
                warn!(article_id = id, error = %e, "Failed to publish article tree");
                self.notifier.error(&format!("Failed to update article: {}", e));
                return Err(e.into());
            }
            let article = {
                let mut tree = self.tree();
                let mut targets = tree.descendants(id);
                targets.push(id);
                for target in targets {
                    tree.update(target, |a| a.is_published = publish);
                }
                tree.get(id).cloned()
            };
            if let Some(article) = article {
                self.controller.refresh_metadata(&article);
            }
            self.notifier
                .success(&format!("Article {} (recursive)", status));
        } else {
            self.write(
                id,
                ArticleUpdate::new().published(publish),
                &format!("Article {}", status),
            )
            .await?;
        }
        self.refresh(None).await?;
        Ok(())
    }

    /// Toggles the article in the user's favorites. Returns the state the
    /// store reports.
    pub async fn toggle_favorite(&self, id: ArticleId) -> WorkspaceResult<bool> {
        let state = match self.store.toggle_favorite(id).await {
            Ok(state) => state,
            Err(e) => {
                warn!(article_id = id, error = %e, "Failed to toggle favorite");
                self.notifier.error("Could not update favorite");
                return Err(e.into());
            }
        };

        let user_id = self.user.user_id;
        self.tree().update(id, |a| {
            a.favorite_user_ids.retain(|u| *u != user_id);
            if state.favorite {
                a.favorite_user_ids.push(user_id);
            }
        });
        self.refresh(None).await?;
        Ok(state.favorite)
    }

    /// Toggles the user's like. The store's counts replace the local ones.
    pub async fn toggle_like(&self, id: ArticleId) -> WorkspaceResult<LikeState> {
        let state = match self.store.toggle_like(id).await {
            Ok(state) => state,
            Err(e) => {
                warn!(article_id = id, error = %e, "Failed to toggle like");
                self.notifier.error("Could not update like");
                return Err(e.into());
            }
        };

        let article = {
            let mut tree = self.tree();
            tree.update(id, |a| {
                a.liked_by_ids = state.liked_by_ids.clone();
                a.likes_count = state.likes_count;
            });
            tree.get(id).cloned()
        };
        if let Some(article) = article {
            self.controller.refresh_metadata(&article);
        }
        Ok(state)
    }

    async fn guard_archive(&self, id: ArticleId, action: &str) -> WorkspaceResult<()> {
        let row = self
            .store
            .read_article(id)
            .await?
            .ok_or_else(|| WorkspaceError::not_found("Article", id))?;
        if let Err(e) = self.permissions.ensure_can_archive(&row).await {
            self.notifier.warning(&format!(
                "Only the article owner or an administrator can {} this article",
                action
            ));
            return Err(e);
        }
        Ok(())
    }

    /// Archives an article. Only its owner or an administrator may.
    pub async fn archive(&self, id: ArticleId) -> WorkspaceResult<()> {
        self.guard_archive(id, "archive").await?;
        let is_current = self.controller.current() == Some(id);
        if is_current {
            self.controller.flush().await?;
        }

        self.write(id, ArticleUpdate::new().active(false), "Article archived")
            .await?;
        self.cache.invalidate(id);

        let show_archived = lock(&self.filter).show_archived;
        if is_current && !show_archived {
            self.controller.close().await?;
        }
        self.refresh(None).await?;
        Ok(())
    }

    /// Restores an archived article. Only its owner or an administrator may.
    pub async fn unarchive(&self, id: ArticleId) -> WorkspaceResult<()> {
        self.guard_archive(id, "unarchive").await?;
        self.write(id, ArticleUpdate::new().active(true), "Article unarchived")
            .await?;
        self.refresh(None).await?;
        let visible = self.tree().is_visible(id);
        if visible {
            self.open(id).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Comments
    // =========================================================================

    pub async fn comments(&self, article_id: ArticleId) -> WorkspaceResult<Vec<CommentThread>> {
        self.comments.load(article_id).await
    }

    /// Posts a comment or reply and returns the refreshed threads.
    pub async fn post_comment(
        &self,
        article_id: ArticleId,
        body: &str,
        reply_to: Option<CommentId>,
    ) -> WorkspaceResult<Vec<CommentThread>> {
        self.comments.post(article_id, body, reply_to).await
    }

    // =========================================================================
    // Version history
    // =========================================================================

    /// History of the open article, the live state first.
    pub async fn version_history(&self) -> WorkspaceResult<Vec<VersionEntry>> {
        let article = self
            .current_article()
            .ok_or(WorkspaceError::NoActiveArticle)?;
        self.versions.load(&article).await
    }

    /// Previews a history entry of the open article.
    pub async fn select_version(&self, key: VersionKey) -> WorkspaceResult<VersionPreview> {
        let article = self
            .current_article()
            .ok_or(WorkspaceError::NoActiveArticle)?;
        let live = self.controller.content().unwrap_or_default();
        self.versions.select(&article, &live, key).await
    }

    /// Diffs the selected entry against the live content. Pending edits are
    /// saved first so the comparison sees what the editor shows.
    pub async fn version_diff(&self) -> WorkspaceResult<DiffOutcome> {
        self.controller.flush().await?;
        let outcome = self.versions.diff().await?;
        if outcome == DiffOutcome::CurrentSelected {
            self.notifier
                .info("Select a previous version to compare with the current one");
        }
        Ok(outcome)
    }

    /// Restores a version of the open article and reloads it.
    pub async fn restore_version(&self, version_id: VersionId) -> WorkspaceResult<OpenOutcome> {
        let id = self
            .controller
            .current()
            .ok_or(WorkspaceError::NoActiveArticle)?;
        self.controller.flush().await?;

        let article = self.versions.restore(id, version_id).await?;
        self.tree().upsert(article.clone());
        let show_archived = lock(&self.filter).show_archived;
        let outcome = self.controller.reload(article, show_archived).await?;
        self.refresh(None).await?;
        Ok(outcome)
    }

    // =========================================================================
    // Sharing and export
    // =========================================================================

    /// Public link of an article.
    pub async fn share_link(&self, id: ArticleId) -> WorkspaceResult<String> {
        let article = self.article_row(id).await?;
        Ok(format!(
            "{}{}",
            self.config.share_base_url.trim_end_matches('/'),
            routes::share_page(&article.share_token)
        ))
    }

    /// Standalone HTML document of an article.
    pub async fn export_html(&self, id: ArticleId) -> WorkspaceResult<ExportedArticle> {
        if self.controller.current() == Some(id) {
            self.controller.flush().await?;
        }
        let article = self.article_row(id).await?;
        let content = match self.cache.get(id) {
            Some(content) => content,
            None => self
                .store
                .read_content(&[id])
                .await?
                .into_iter()
                .find(|c| c.id == id)
                .map(|c| c.content)
                .unwrap_or_default(),
        };

        let title = escape_html(&article.name);
        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n<p class=\"meta\">Created {} · Last edited {}</p>\n<hr>\n{}\n</body>\n</html>\n",
            article.created_at.format("%Y-%m-%d %H:%M"),
            article.updated_at.format("%Y-%m-%d %H:%M"),
            content,
        );
        let stem: String = article
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Ok(ExportedArticle {
            file_name: format!("{}.html", stem),
            html,
        })
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use article_store::MemoryArticleStore;

    use super::*;
    use crate::{
        notify::{CollectingNotifier, ToastLevel},
        preferences::MemoryPreferenceStore,
    };

    const ME: i64 = 2;

    struct Fixture {
        store: Arc<MemoryArticleStore>,
        notifier: Arc<CollectingNotifier>,
        preferences: Arc<MemoryPreferenceStore>,
        workspace: KnowledgeWorkspace,
    }

    async fn seeded_store() -> Arc<MemoryArticleStore> {
        let store = Arc::new(MemoryArticleStore::new(UserContext::new(ME, "Marc Demo")));
        store.insert_tag(Tag::new(10, "HR")).await;
        store
            .insert_article(
                Article::new(1, "Handbook").with_author(ME),
                "<p>Welcome to the handbook</p>",
            )
            .await;
        store
            .insert_article(
                Article::new(2, "Policies").with_author(ME).with_parent(1).with_tags([10]),
                "<p>Leave policy and remote work</p>",
            )
            .await;
        store
            .insert_article(
                Article::new(3, "Leave").with_author(ME).with_parent(2),
                "<p>Annual leave rules</p>",
            )
            .await;
        store
            .insert_article(Article::new(4, "Archive box").with_author(ME).archived(), "")
            .await;
        store
            .insert_article(
                Article::new(5, "Old notes").with_author(ME).with_parent(4),
                "<p>Stale</p>",
            )
            .await;
        store
            .insert_article(
                Article::new(6, "Roadmap").with_author(9),
                "<p>Quarterly goals</p>",
            )
            .await;
        store
    }

    fn workspace_for(
        store: Arc<MemoryArticleStore>,
        preferences: Arc<MemoryPreferenceStore>,
    ) -> (Arc<CollectingNotifier>, KnowledgeWorkspace) {
        let notifier = Arc::new(CollectingNotifier::new());
        let workspace = KnowledgeWorkspace::new(
            WorkspaceConfig::default(),
            UserContext::new(ME, "Marc Demo"),
            store,
            notifier.clone(),
            preferences,
        );
        (notifier, workspace)
    }

    async fn fixture() -> Fixture {
        let store = seeded_store().await;
        let preferences = Arc::new(MemoryPreferenceStore::new());
        let (notifier, workspace) = workspace_for(store.clone(), preferences.clone());
        workspace.load().await.unwrap();
        Fixture {
            store,
            notifier,
            preferences,
            workspace,
        }
    }

    fn visible_ids(workspace: &KnowledgeWorkspace) -> Vec<ArticleId> {
        let mut ids: Vec<ArticleId> = workspace.visible_articles().iter().map(|a| a.id).collect();
        ids.sort_unstable();
        ids
    }

    #[tokio::test]
    async fn test_load_opens_first_visible_article() {
        let f = fixture().await;

        assert_eq!(visible_ids(&f.workspace), vec![1, 2, 3, 6]);
        assert_eq!(f.workspace.current(), Some(1));
        assert_eq!(
            f.workspace.document().content.as_deref(),
            Some("<p>Welcome to the handbook</p>")
        );
        assert_eq!(f.workspace.tags().len(), 1);
    }

    #[tokio::test]
    async fn test_last_opened_article_is_restored() {
        let f = fixture().await;
        f.workspace.open(6).await.unwrap();
        assert_eq!(f.preferences.load().last_article_id, Some(6));

        let (_, reopened) = workspace_for(f.store.clone(), f.preferences.clone());
        reopened.load().await.unwrap();
        assert_eq!(reopened.current(), Some(6));
    }

    #[tokio::test]
    async fn test_show_archived_reveals_archived_branch() {
        let f = fixture().await;

        f.workspace.set_show_archived(true).await.unwrap();
        assert_eq!(visible_ids(&f.workspace), vec![1, 2, 3, 4, 6]);
        assert!(f.preferences.load().show_archived);

        let outcome = f.workspace.open(4).await.unwrap();
        assert!(outcome.is_opened());
    }

    #[tokio::test]
    async fn test_filter_moves_selection_to_first_visible() {
        let f = fixture().await;
        f.workspace.open(6).await.unwrap();

        let outcome = f.workspace.toggle_tag(10).await.unwrap();
        assert!(matches!(outcome, Some(OpenOutcome::Opened { article_id: 1, .. })));
        assert_eq!(visible_ids(&f.workspace), vec![1, 2]);

        let rows = f.workspace.rows(SectionKind::Workspace);
        assert!(rows.iter().any(|r| r.id == 2 && r.tag_match));

        f.workspace.set_query("nothing like this").await.unwrap();
        assert_eq!(f.workspace.current(), None);
    }

    #[tokio::test]
    async fn test_query_filters_by_cached_content() {
        let f = fixture().await;
        f.workspace.set_search_in_content(true).await.unwrap();

        let hits = f.workspace.search("quarterly").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].article_id, 6);
        assert_eq!(hits[0].snippet, "... quarterly goals ...");

        f.workspace.set_query("quarterly").await.unwrap();
        assert_eq!(visible_ids(&f.workspace), vec![6]);
    }

    #[tokio::test]
    async fn test_rename_trims_and_ignores_noops() {
        let f = fixture().await;

        assert!(!f.workspace.rename(1, "   ").await.unwrap());
        assert!(!f.workspace.rename(1, "Handbook").await.unwrap());
        assert!(f.workspace.rename(1, "  Team handbook ").await.unwrap());

        assert_eq!(f.store.call_count("write_article"), 1);
        assert_eq!(
            f.workspace.current_article().unwrap().name,
            "Team handbook"
        );
    }

    #[tokio::test]
    async fn test_move_rejects_descendants() {
        let f = fixture().await;

        assert!(matches!(
            f.workspace.move_article(1, Some(3)).await,
            Err(WorkspaceError::InvalidMove { id: 1, parent_id: 3 })
        ));
        assert!(matches!(
            f.workspace.move_article(1, Some(1)).await,
            Err(WorkspaceError::InvalidMove { .. })
        ));

        let moved = f.workspace.move_article(3, None).await.unwrap();
        assert_eq!(moved.parent_id, None);
        assert_eq!(f.workspace.breadcrumbs(3).len(), 1);
    }

    #[tokio::test]
    async fn test_quick_create_under_current() {
        let f = fixture().await;

        let created = f.workspace.quick_create(Some("   ")).await.unwrap();
        assert_eq!(created.name, DEFAULT_TITLE);
        assert_eq!(created.parent_id, Some(1));
        assert!(created.is_published);
        assert_eq!(f.workspace.current(), Some(created.id));
        assert_eq!(f.notifier.count(ToastLevel::Success), 1);

        let private = f
            .workspace
            .create_article(Some("Draft"), None, false)
            .await
            .unwrap();
        assert!(f.workspace.sections().private.roots.contains(&private.id));
    }

    #[tokio::test]
    async fn test_copy_keeps_content_tags_and_parent() {
        let f = fixture().await;

        let copy = f.workspace.copy(2, None).await.unwrap();
        assert_eq!(copy.name, "Policies (copy)");
        assert_eq!(copy.parent_id, Some(1));
        assert_eq!(copy.tag_ids, vec![10]);
        assert_eq!(
            f.store.content_of(copy.id).await.as_deref(),
            Some("<p>Leave policy and remote work</p>")
        );
        assert_eq!(f.workspace.current(), Some(copy.id));

        assert!(matches!(
            f.workspace.copy(2, Some("  ")).await,
            Err(WorkspaceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_icon_and_cover() {
        let f = fixture().await;

        let article = f.workspace.set_icon(1, Some("📘")).await.unwrap();
        assert_eq!(article.icon.as_deref(), Some("📘"));
        let article = f.workspace.set_icon(1, Some("  ")).await.unwrap();
        assert_eq!(article.icon, None);

        let cover = CoverImage::Url("https://example.com/c.png".to_string());
        f.workspace.set_cover(1, cover.clone()).await.unwrap();
        let article = f.workspace.set_cover_position(1, 250).await.unwrap();
        assert_eq!(article.cover, cover);
        assert_eq!(article.cover_position, 100);
        assert_eq!(f.workspace.document().article.unwrap().cover_position, 100);

        let article = f.workspace.remove_cover(1).await.unwrap();
        assert!(!article.cover.is_set());
    }

    #[tokio::test]
    async fn test_recursive_unpublish_moves_branch_to_private() {
        let f = fixture().await;

        f.workspace.set_published(1, false, true).await.unwrap();
        let sections = f.workspace.sections();
        assert_eq!(sections.private.roots, vec![1]);
        assert!(sections.private.contains(3));
        assert!(!f.store.read_article(3).await.unwrap().unwrap().is_published);

        f.workspace.set_published(1, true, false).await.unwrap();
        assert!(f.store.read_article(1).await.unwrap().unwrap().is_published);
        assert!(!f.store.read_article(2).await.unwrap().unwrap().is_published);
    }

    #[tokio::test]
    async fn test_favorite_and_like_follow_the_store() {
        let f = fixture().await;

        assert!(f.workspace.toggle_favorite(6).await.unwrap());
        assert_eq!(f.workspace.sections().favorites.roots, vec![6]);
        f.workspace.set_favorites_only(true).await.unwrap();
        assert_eq!(visible_ids(&f.workspace), vec![6]);
        assert!(!f.workspace.toggle_favorite(6).await.unwrap());

        let like = f.workspace.toggle_like(6).await.unwrap();
        assert!(like.you_liked);
        assert_eq!(like.likes_count, 1);
    }

    #[tokio::test]
    async fn test_favorite_failure_changes_nothing() {
        let f = fixture().await;
        f.store.set_failing_writes(true);

        assert!(f.workspace.toggle_favorite(6).await.is_err());
        assert!(f.workspace.sections().favorites.is_empty());
        assert_eq!(f.notifier.count(ToastLevel::Error), 1);
    }

    #[tokio::test]
    async fn test_archive_guard_and_selection() {
        let f = fixture().await;

        assert!(matches!(
            f.workspace.archive(6).await,
            Err(WorkspaceError::PermissionDenied(_))
        ));
        assert_eq!(f.notifier.count(ToastLevel::Warning), 1);

        f.workspace.open(3).await.unwrap();
        f.workspace.archive(3).await.unwrap();
        assert!(!visible_ids(&f.workspace).contains(&3));
        assert_eq!(f.workspace.current(), Some(1));

        f.workspace.unarchive(3).await.unwrap();
        assert_eq!(f.workspace.current(), Some(3));
    }

    #[tokio::test]
    async fn test_admin_may_archive_others() {
        let f = fixture().await;
        f.store.set_admin(true);

        f.workspace.archive(6).await.unwrap();
        assert!(!f.store.read_article(6).await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_history_restore_reloads_content() {
        let f = fixture().await;
        f.workspace.edit("<p>Rewritten</p>").unwrap();
        f.workspace.save().await.unwrap();

        let entries = f.workspace.version_history().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, VersionKey::Current);

        let preview = f.workspace.select_version(entries[1].key).await.unwrap();
        assert_eq!(preview.content, "<p>Welcome to the handbook</p>");
        assert!(matches!(
            f.workspace.version_diff().await.unwrap(),
            DiffOutcome::Diff(_)
        ));

        let VersionKey::Snapshot(version_id) = entries[1].key else {
            panic!("expected a snapshot");
        };
        let outcome = f.workspace.restore_version(version_id).await.unwrap();
        assert!(matches!(outcome, OpenOutcome::Opened { from_cache: false, .. }));
        assert_eq!(
            f.workspace.document().content.as_deref(),
            Some("<p>Welcome to the handbook</p>")
        );
        assert_eq!(f.workspace.current_article().unwrap().version, 3);
    }

    #[tokio::test]
    async fn test_version_diff_saves_pending_edits_first() {
        let f = fixture().await;
        f.workspace.edit("<p>Rewritten</p>").unwrap();
        f.workspace.save().await.unwrap();

        let entries = f.workspace.version_history().await.unwrap();
        f.workspace.select_version(entries[1].key).await.unwrap();
        f.workspace.edit("<p>Draft text</p>").unwrap();

        let DiffOutcome::Diff(html) = f.workspace.version_diff().await.unwrap() else {
            panic!("expected a diff");
        };
        assert!(html.contains("Draft"));
        assert!(!html.contains("Rewritten"));
        assert_eq!(
            f.store.content_of(1).await.as_deref(),
            Some("<p>Draft text</p>")
        );
        assert_eq!(f.workspace.save_status(), SaveStatus::Saved);
    }

    #[tokio::test]
    async fn test_back_and_forward() {
        let f = fixture().await;
        f.workspace.open(2).await.unwrap();
        f.workspace.open(6).await.unwrap();

        f.workspace.back().await.unwrap();
        assert_eq!(f.workspace.current(), Some(2));
        f.workspace.forward().await.unwrap();
        assert_eq!(f.workspace.current(), Some(6));
        assert!(f.workspace.forward().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_comments_round_trip() {
        let f = fixture().await;

        let threads = f.workspace.post_comment(1, "Looks good", None).await.unwrap();
        let reply_to = threads[0].comment.id;
        let threads = f
            .workspace
            .post_comment(1, "Thanks", Some(reply_to))
            .await
            .unwrap();
        assert_eq!(threads[0].replies.len(), 1);
        assert_eq!(f.workspace.comments(1).await.unwrap(), threads);
    }

    #[tokio::test]
    async fn test_share_link_and_export() {
        let f = fixture().await;
        let token = f.store.read_article(1).await.unwrap().unwrap().share_token;

        assert_eq!(
            f.workspace.share_link(1).await.unwrap(),
            format!("http://localhost:8069/knowledge/article/{}", token)
        );

        let exported = f.workspace.export_html(6).await.unwrap();
        assert_eq!(exported.file_name, "Roadmap.html");
        assert!(exported.html.contains("<h1>Roadmap</h1>"));
        assert!(exported.html.contains("<p>Quarterly goals</p>"));
    }

    #[tokio::test]
    async fn test_sidebar_preferences() {
        let f = fixture().await;

        assert!(!f.workspace.set_sidebar_width(100));
        assert!(f.workspace.set_sidebar_width(420));
        assert!(f.workspace.toggle_sidebar());
        f.workspace.collapse_all();

        let saved = f.preferences.load();
        assert_eq!(saved.sidebar_width, Some(420));
        assert!(saved.sidebar_collapsed);
        assert!(saved.expanded_ids.is_empty());
    }
}
