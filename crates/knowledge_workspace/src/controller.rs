//! Document view controller.
//!
//! Exactly one document is open at a time. Opening another one flushes the
//! auto-saver first and then loads, content comes from the session cache
//! when present. A load that completes after the user already moved on is
//! discarded.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use article_store::ArticleStore;
use entities::{Article, ArticleId};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    autosave::{AutoSaver, SaveStatus},
    cache::ContentCache,
    history::BrowsingHistory,
    notify::Notifier,
    WorkspaceResult,
};

/// Result of an open request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Content is applied and editable.
    Opened {
        article_id: ArticleId,
        from_cache: bool,
    },
    /// Another document was selected while this one was loading.
    Superseded,
    /// The article is archived and archived articles are not shown.
    Hidden,
    /// Loading failed; the view shows an error placeholder.
    Failed { message: String },
}

impl OpenOutcome {
    pub fn is_opened(&self) -> bool {
        matches!(self, Self::Opened { .. })
    }
}

/// Snapshot of the document pane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentView {
    pub article: Option<Article>,
    pub content: Option<String>,
    pub editing: bool,
    pub status: SaveStatus,
    pub load_error: Option<String>,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

#[derive(Debug, Default)]
struct ViewState {
    selected: Option<ArticleId>,
    article: Option<Article>,
    editing: bool,
    load_error: Option<String>,
    history: BrowsingHistory,
    viewed: HashSet<ArticleId>,
}

/// Owns the open document, its content cache entry and browsing history.
pub struct DocumentController {
    store: Arc<dyn ArticleStore>,
    cache: Arc<ContentCache>,
    saver: AutoSaver,
    notifier: Arc<dyn Notifier>,
    state: Mutex<ViewState>,
}

impl DocumentController {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        cache: Arc<ContentCache>,
        saver: AutoSaver,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            cache,
            saver,
            notifier,
            state: Mutex::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens `article` and records it in the browsing history.
    pub async fn open(&self, article: Article, show_archived: bool) -> WorkspaceResult<OpenOutcome> {
        self.open_inner(article, show_archived, true).await
    }

    /// Opens `article` without touching the browsing history.
    pub async fn revisit(
        &self,
        article: Article,
        show_archived: bool,
    ) -> WorkspaceResult<OpenOutcome> {
        self.open_inner(article, show_archived, false).await
    }

    /// Drops the cached content of the open document and loads it again.
    /// Unsaved edits are discarded.
    pub async fn reload(&self, article: Article, show_archived: bool) -> WorkspaceResult<OpenOutcome> {
        self.cache.invalidate(article.id);
        self.saver.release();
        self.state().editing = false;
        self.open_inner(article, show_archived, false).await
    }

    async fn open_inner(
        &self,
        article: Article,
        show_archived: bool,
        push_history: bool,
    ) -> WorkspaceResult<OpenOutcome> {
        let id = article.id;
        {
            let state = self.state();
            if state.selected == Some(id) && state.editing {
                return Ok(OpenOutcome::Opened {
                    article_id: id,
                    from_cache: true,
                });
            }
        }

        self.saver.flush().await?;

        if !article.active && !show_archived {
            debug!(article_id = id, "Archived article hidden");
            self.saver.release();
            let mut state = self.state();
            state.selected = None;
            state.article = None;
            state.editing = false;
            state.load_error = None;
            return Ok(OpenOutcome::Hidden);
        }

        self.saver.release();
        {
            let mut state = self.state();
            state.selected = Some(id);
            state.article = Some(article);
            state.editing = false;
            state.load_error = None;
            if push_history {
                state.history.visit(id);
            }
        }

        let (content, from_cache) = match self.cache.get(id) {
            Some(html) => (html, true),
            None => match self.store.read_content(&[id]).await {
                Ok(contents) => {
                    let html = contents
                        .into_iter()
                        .find(|c| c.id == id)
                        .map(|c| c.content)
                        .unwrap_or_default();
                    if !self.cache.contains(id) {
                        self.cache.insert(id, html.clone());
                        self.cache.schedule_extract(id);
                    }
                    (html, false)
                }
                Err(e) => {
                    let mut state = self.state();
                    if state.selected != Some(id) {
                        return Ok(OpenOutcome::Superseded);
                    }
                    warn!(article_id = id, error = %e, "Failed to load article content");
                    let message = format!("Failed to load article: {}", e);
                    state.load_error = Some(message.clone());
                    drop(state);
                    self.notifier.error(&message);
                    return Ok(OpenOutcome::Failed { message });
                }
            },
        };

        let first_view = {
            let mut state = self.state();
            if state.selected != Some(id) {
                debug!(article_id = id, "Discarding superseded load");
                return Ok(OpenOutcome::Superseded);
            }
            self.saver.track(id, content);
            state.editing = true;
            state.viewed.insert(id)
        };

        if first_view {
            if let Err(e) = self.store.increment_view(id).await {
                warn!(article_id = id, error = %e, "Failed to record article view");
            }
        }

        info!(article_id = id, from_cache, "Opened article");
        Ok(OpenOutcome::Opened {
            article_id: id,
            from_cache,
        })
    }

    /// Flushes pending edits and clears the selection.
    pub async fn close(&self) -> WorkspaceResult<()> {
        self.saver.flush().await?;
        self.saver.release();
        let mut state = self.state();
        state.selected = None;
        state.article = None;
        state.editing = false;
        state.load_error = None;
        Ok(())
    }

    /// Moves the history cursor back and returns the entry to open.
    pub fn step_back(&self) -> Option<ArticleId> {
        self.state().history.back()
    }

    /// Moves the history cursor forward and returns the entry to open.
    pub fn step_forward(&self) -> Option<ArticleId> {
        self.state().history.forward()
    }

    /// Records an edit of the open document.
    pub fn edit(&self, content: impl Into<String>) -> WorkspaceResult<()> {
        self.saver.edit(content)
    }

    /// Saves the open document now.
    pub async fn save(&self) -> WorkspaceResult<()> {
        self.saver.save().await
    }

    /// Waits for pending writes of the open document.
    pub async fn flush(&self) -> WorkspaceResult<()> {
        self.saver.flush().await
    }

    /// Replaces the metadata row of the open document when it is `article`.
    pub fn refresh_metadata(&self, article: &Article) {
        let mut state = self.state();
        if state.selected == Some(article.id) {
            state.article = Some(article.clone());
        }
    }

    /// Id of the selected document.
    pub fn current(&self) -> Option<ArticleId> {
        self.state().selected
    }

    /// Metadata row of the selected document.
    pub fn current_article(&self) -> Option<Article> {
        self.state().article.clone()
    }

    pub fn is_editing(&self) -> bool {
        self.state().editing
    }

    /// Content as the editor shows it.
    pub fn content(&self) -> Option<String> {
        self.saver.content()
    }

    pub fn saver(&self) -> &AutoSaver {
        &self.saver
    }

    pub fn view(&self) -> DocumentView {
        let state = self.state();
        DocumentView {
            article: state.article.clone(),
            content: if state.editing {
                self.saver.content()
            } else {
                None
            },
            editing: state.editing,
            status: self.saver.status(),
            load_error: state.load_error.clone(),
            can_go_back: state.history.can_go_back(),
            can_go_forward: state.history.can_go_forward(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use article_store::MemoryArticleStore;

    use super::*;
    use crate::notify::{CollectingNotifier, ToastLevel};

    struct Fixture {
        store: Arc<MemoryArticleStore>,
        cache: Arc<ContentCache>,
        notifier: Arc<CollectingNotifier>,
        controller: Arc<DocumentController>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryArticleStore::default());
        store
            .insert_article(Article::new(1, "Alpha"), "<p>alpha</p>")
            .await;
        store
            .insert_article(Article::new(2, "Beta"), "<p>beta</p>")
            .await;
        store
            .insert_article(Article::new(3, "Gone").archived(), "<p>old</p>")
            .await;

        let cache = Arc::new(ContentCache::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let saver = AutoSaver::new(
            store.clone(),
            cache.clone(),
            notifier.clone(),
            Duration::from_millis(1500),
        );
        let controller = Arc::new(DocumentController::new(
            store.clone(),
            cache.clone(),
            saver,
            notifier.clone(),
        ));
        Fixture {
            store,
            cache,
            notifier,
            controller,
        }
    }

    async fn row(f: &Fixture, id: ArticleId) -> Article {
        f.store.read_article(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_switching_back_uses_cache() {
        let f = fixture().await;

        let a = row(&f, 1).await;
        let b = row(&f, 2).await;
        let outcome = f.controller.open(a.clone(), false).await.unwrap();
        assert_eq!(
            outcome,
            OpenOutcome::Opened {
                article_id: 1,
                from_cache: false
            }
        );
        f.controller.open(b, false).await.unwrap();
        let outcome = f.controller.open(a, false).await.unwrap();

        assert_eq!(
            outcome,
            OpenOutcome::Opened {
                article_id: 1,
                from_cache: true
            }
        );
        assert_eq!(f.store.fetched_content_ids(), vec![1, 2]);
        assert_eq!(f.controller.content().as_deref(), Some("<p>alpha</p>"));
        assert!(f.controller.is_editing());
    }

    #[tokio::test]
    async fn test_views_counted_once_per_session() {
        let f = fixture().await;

        f.controller.open(row(&f, 1).await, false).await.unwrap();
        f.controller.open(row(&f, 2).await, false).await.unwrap();
        f.controller.open(row(&f, 1).await, false).await.unwrap();

        assert_eq!(f.store.call_count("increment_view"), 2);
        assert_eq!(row(&f, 1).await.views_count, 1);
    }

    #[tokio::test]
    async fn test_failed_load_shows_placeholder_and_retries() {
        let f = fixture().await;
        f.store.set_failing_reads(true);

        let outcome = f.controller.open(row(&f, 1).await, false).await.unwrap();
        let OpenOutcome::Failed { message } = outcome else {
            panic!("expected a failed load, got {:?}", outcome);
        };
        assert!(message.starts_with("Failed to load article: "));

        let view = f.controller.view();
        assert_eq!(view.load_error.as_deref(), Some(message.as_str()));
        assert_eq!(view.article.map(|a| a.id), Some(1));
        assert!(!view.editing);
        assert!(view.content.is_none());
        assert_eq!(f.notifier.count(ToastLevel::Error), 1);
        assert!(f.cache.get(1).is_none());
        assert_eq!(f.store.call_count("increment_view"), 0);

        f.store.set_failing_reads(false);
        let outcome = f.controller.open(row(&f, 1).await, false).await.unwrap();
        assert_eq!(
            outcome,
            OpenOutcome::Opened {
                article_id: 1,
                from_cache: false
            }
        );
        assert!(f.controller.view().load_error.is_none());
        assert_eq!(f.controller.content().as_deref(), Some("<p>alpha</p>"));
    }

    #[tokio::test]
    async fn test_view_counter_failure_is_only_logged() {
        let f = fixture().await;
        f.store.set_failing_view_counter(true);

        let outcome = f.controller.open(row(&f, 2).await, false).await.unwrap();

        assert!(outcome.is_opened());
        assert_eq!(f.store.call_count("increment_view"), 1);
        assert!(f.notifier.take().is_empty());
        assert!(f.controller.view().load_error.is_none());
        assert_eq!(f.controller.content().as_deref(), Some("<p>beta</p>"));
    }

    #[tokio::test]
    async fn test_switching_flushes_dirty_content_first() {
        let f = fixture().await;

        f.controller.open(row(&f, 1).await, false).await.unwrap();
        f.controller.edit("<p>alpha edited</p>").unwrap();
        f.controller.open(row(&f, 2).await, false).await.unwrap();

        assert_eq!(
            f.store.content_of(1).await.as_deref(),
            Some("<p>alpha edited</p>")
        );
        assert_eq!(f.cache.get(1).as_deref(), Some("<p>alpha edited</p>"));
        assert_eq!(f.controller.current(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_load_is_superseded() {
        let f = fixture().await;
        f.store.set_read_delay(Duration::from_millis(100));

        let controller = f.controller.clone();
        let a = row(&f, 1).await;
        let slow = tokio::spawn(async move { controller.open(a, false).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let b = row(&f, 2).await;
        let fast = f.controller.open(b, false).await.unwrap();
        let slow = slow.await.unwrap().unwrap();

        assert!(fast.is_opened());
        assert_eq!(slow, OpenOutcome::Superseded);
        assert_eq!(f.controller.current(), Some(2));
        assert_eq!(f.controller.content().as_deref(), Some("<p>beta</p>"));
        // The superseded load still fills the cache
        assert!(f.cache.contains(1));
    }

    #[tokio::test]
    async fn test_archived_article_is_hidden() {
        let f = fixture().await;

        f.controller.open(row(&f, 1).await, false).await.unwrap();
        let outcome = f.controller.open(row(&f, 3).await, false).await.unwrap();
        assert_eq!(outcome, OpenOutcome::Hidden);
        assert_eq!(f.controller.current(), None);

        let outcome = f.controller.open(row(&f, 3).await, true).await.unwrap();
        assert!(outcome.is_opened());
    }

    #[tokio::test]
    async fn test_history_navigation() {
        let f = fixture().await;

        f.controller.open(row(&f, 1).await, false).await.unwrap();
        f.controller.open(row(&f, 2).await, false).await.unwrap();
        assert!(f.controller.view().can_go_back);

        let back = f.controller.step_back().unwrap();
        assert_eq!(back, 1);
        f.controller.revisit(row(&f, back).await, false).await.unwrap();
        assert!(f.controller.view().can_go_forward);
        assert_eq!(f.controller.step_forward(), Some(2));
    }

    #[tokio::test]
    async fn test_reload_refetches_content() {
        let f = fixture().await;

        f.controller.open(row(&f, 1).await, false).await.unwrap();
        let outcome = f.controller.reload(row(&f, 1).await, false).await.unwrap();

        assert_eq!(
            outcome,
            OpenOutcome::Opened {
                article_id: 1,
                from_cache: false
            }
        );
        assert_eq!(f.store.fetched_content_ids(), vec![1, 1]);
    }

    #[tokio::test]
    async fn test_close_clears_selection() {
        let f = fixture().await;

        f.controller.open(row(&f, 1).await, false).await.unwrap();
        f.controller.close().await.unwrap();

        assert_eq!(f.controller.current(), None);
        assert!(f.controller.view().content.is_none());
        assert_eq!(f.notifier.count(ToastLevel::Error), 0);
    }
}
