//! Auto-save scheduler.
//!
//! Edits arm a debounce timer; when it fires, the latest draft is written.
//! At most one write is in flight. A save requested while a write runs is
//! queued behind it and coalesced, so every request is served by exactly
//! one later write and none is dropped.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use article_store::{ArticleStore, ArticleUpdate};
use entities::{Article, ArticleId};
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tracing::{debug, warn};

use crate::{cache::ContentCache, notify::Notifier, WorkspaceError, WorkspaceResult};

/// Save state of the open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    /// Remote content matches the editor.
    Saved,
    /// The editor holds unsaved changes.
    Dirty,
    /// A write is in flight.
    Saving,
}

/// Called with the stored row after every successful write.
pub type SavedHook = Arc<dyn Fn(&Article) + Send + Sync>;

#[derive(Debug, Default)]
struct Draft {
    article_id: Option<ArticleId>,
    last_saved: String,
    unsaved: Option<String>,
    saving: bool,
    pending: bool,
}

struct Inner {
    store: Arc<dyn ArticleStore>,
    cache: Arc<ContentCache>,
    notifier: Arc<dyn Notifier>,
    debounce: Duration,
    draft: Mutex<Draft>,
    timer_generation: AtomicU64,
    status: watch::Sender<SaveStatus>,
    idle: Notify,
    on_saved: Mutex<Option<SavedHook>>,
}

/// Debounced, coalescing content writer for the open document.
#[derive(Clone)]
pub struct AutoSaver {
    inner: Arc<Inner>,
}

impl AutoSaver {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        cache: Arc<ContentCache>,
        notifier: Arc<dyn Notifier>,
        debounce: Duration,
    ) -> Self {
        let (status, _) = watch::channel(SaveStatus::Saved);
        Self {
            inner: Arc::new(Inner {
                store,
                cache,
                notifier,
                debounce,
                draft: Mutex::default(),
                timer_generation: AtomicU64::new(0),
                status,
                idle: Notify::new(),
                on_saved: Mutex::new(None),
            }),
        }
    }

    /// Installs a hook that receives the stored row after each write.
    pub fn set_saved_hook(&self, hook: SavedHook) {
        *self
            .inner
            .on_saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    /// Starts tracking a freshly loaded document. Call only after
    /// [`flush`](Self::flush), any unsaved draft is discarded.
    pub fn track(&self, article_id: ArticleId, saved_content: impl Into<String>) {
        self.cancel_timer();
        let mut draft = self.inner.draft();
        draft.article_id = Some(article_id);
        draft.last_saved = saved_content.into();
        draft.unsaved = None;
        drop(draft);
        self.inner.status.send_replace(SaveStatus::Saved);
    }

    /// Stops tracking. Any unsaved draft is discarded.
    pub fn release(&self) {
        self.cancel_timer();
        *self.inner.draft() = Draft::default();
        self.inner.status.send_replace(SaveStatus::Saved);
    }

    /// Document currently tracked.
    pub fn article_id(&self) -> Option<ArticleId> {
        self.inner.draft().article_id
    }

    /// Content as the editor shows it.
    pub fn content(&self) -> Option<String> {
        let draft = self.inner.draft();
        draft.article_id?;
        Some(draft.unsaved.clone().unwrap_or_else(|| draft.last_saved.clone()))
    }

    pub fn status(&self) -> SaveStatus {
        *self.inner.status.borrow()
    }

    /// Observes status changes.
    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.draft().unsaved.is_some()
    }

    /// Records an edit and re-arms the debounce timer. Content identical to
    /// the last saved state clears the dirty flag instead. While a write is
    /// in flight the edit is queued behind it, whatever its content.
    pub fn edit(&self, content: impl Into<String>) -> WorkspaceResult<()> {
        let content = content.into();
        let mut draft = self.inner.draft();
        if draft.article_id.is_none() {
            return Err(WorkspaceError::NoActiveArticle);
        }

        if draft.saving {
            // The running write loop re-checks the draft once the write lands.
            draft.unsaved = Some(content);
            draft.pending = true;
            return Ok(());
        }

        if content == draft.last_saved {
            draft.unsaved = None;
            drop(draft);
            self.cancel_timer();
            self.inner.status.send_replace(SaveStatus::Saved);
            return Ok(());
        }

        draft.unsaved = Some(content);
        drop(draft);
        self.inner.status.send_replace(SaveStatus::Dirty);
        self.arm_timer();
        Ok(())
    }

    /// Saves now, bypassing the debounce. Returns immediately when a write
    /// is already in flight; the running write loop picks the request up.
    pub async fn save(&self) -> WorkspaceResult<()> {
        self.cancel_timer();
        self.inner.save().await
    }

    /// Waits for an in-flight write loop to finish, then saves whatever is
    /// still dirty.
    pub async fn flush(&self) -> WorkspaceResult<()> {
        self.cancel_timer();
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.inner.draft().saving {
                break;
            }
            notified.await;
        }
        self.inner.save().await
    }

    fn cancel_timer(&self) {
        self.inner.timer_generation.fetch_add(1, Ordering::SeqCst);
    }

    fn arm_timer(&self) {
        let generation = self.inner.timer_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            if inner.timer_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Err(e) = inner.save().await {
                debug!(error = %e, "Debounced save failed");
            }
        });
    }
}

impl Inner {
    fn draft(&self) -> MutexGuard<'_, Draft> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn save(&self) -> WorkspaceResult<()> {
        {
            let mut draft = self.draft();
            if draft.saving {
                draft.pending = true;
                debug!(article_id = ?draft.article_id, "Write in flight, save queued");
                return Ok(());
            }
            draft.saving = true;
        }

        let result = self.write_loop().await;
        self.idle.notify_waiters();
        result
    }

    /// Ends the write loop. Called under the same lock as the decision to
    /// stop, so a save queued meanwhile is never lost.
    fn finish(&self, draft: &mut Draft) {
        draft.saving = false;
        draft.pending = false;
        let status = if draft.unsaved.is_some() {
            SaveStatus::Dirty
        } else {
            SaveStatus::Saved
        };
        self.status.send_replace(status);
    }

    async fn write_loop(&self) -> WorkspaceResult<()> {
        loop {
            let job = {
                let mut draft = self.draft();
                draft.pending = false;
                match (draft.article_id, draft.unsaved.clone()) {
                    (Some(id), Some(content)) if content != draft.last_saved => Some((id, content)),
                    _ => {
                        draft.unsaved = None;
                        self.finish(&mut draft);
                        None
                    }
                }
            };
            let Some((id, content)) = job else {
                return Ok(());
            };

            self.status.send_replace(SaveStatus::Saving);
            let update = ArticleUpdate::new().content(content.clone());
            match self.store.write_article(id, update).await {
                Ok(article) => {
                    self.cache.insert(id, content.clone());
                    self.cache.schedule_extract(id);
                    {
                        let mut draft = self.draft();
                        if draft.article_id == Some(id) {
                            if draft.unsaved.as_deref() == Some(content.as_str()) {
                                draft.unsaved = None;
                            }
                            draft.last_saved = content;
                        }
                    }
                    debug!(article_id = id, version = article.version, "Saved article content");
                    let hook = self
                        .on_saved
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clone();
                    if let Some(hook) = hook {
                        hook(&article);
                    }
                }
                Err(e) => {
                    self.finish(&mut self.draft());
                    warn!(article_id = id, error = %e, "Failed to save article");
                    self.notifier.error(&format!("Failed to save article: {}", e));
                    return Err(e.into());
                }
            }

            let mut draft = self.draft();
            if !draft.pending {
                self.finish(&mut draft);
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use article_store::MemoryArticleStore;
    use entities::Article;

    use super::*;
    use crate::notify::{CollectingNotifier, ToastLevel};

    struct Fixture {
        store: Arc<MemoryArticleStore>,
        cache: Arc<ContentCache>,
        notifier: Arc<CollectingNotifier>,
        saver: AutoSaver,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryArticleStore::default());
        store
            .insert_article(Article::new(1, "Doc"), "<p>a</p>")
            .await;
        let cache = Arc::new(ContentCache::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let saver = AutoSaver::new(
            store.clone(),
            cache.clone(),
            notifier.clone(),
            Duration::from_millis(1500),
        );
        saver.track(1, "<p>a</p>");
        Fixture {
            store,
            cache,
            notifier,
            saver,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_edits_write_once() {
        let f = fixture().await;

        f.saver.edit("<p>b</p>").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        f.saver.edit("<p>bc</p>").unwrap();
        assert_eq!(f.saver.status(), SaveStatus::Dirty);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(f.store.call_count("write_article"), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(f.store.call_count("write_article"), 1);
        assert_eq!(f.store.content_of(1).await.as_deref(), Some("<p>bc</p>"));
        assert_eq!(f.cache.get(1).as_deref(), Some("<p>bc</p>"));
        assert_eq!(f.saver.status(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_content_is_not_written() {
        let f = fixture().await;

        f.saver.edit("<p>a</p>").unwrap();
        assert_eq!(f.saver.status(), SaveStatus::Saved);
        f.saver.save().await.unwrap();

        f.saver.edit("<p>b</p>").unwrap();
        f.saver.edit("<p>a</p>").unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(f.store.call_count("write_article"), 0);
        assert!(!f.saver.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_saves_during_write_coalesce_into_one() {
        let f = fixture().await;
        f.store.set_write_delay(Duration::from_millis(100));

        f.saver.edit("<p>b</p>").unwrap();
        let saver = f.saver.clone();
        let first = tokio::spawn(async move { saver.save().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.saver.status(), SaveStatus::Saving);

        // Create two more save requests while the first write is in flight
        f.saver.edit("<p>c</p>").unwrap();
        f.saver.save().await.unwrap();
        f.saver.edit("<p>d</p>").unwrap();
        f.saver.save().await.unwrap();

        first.await.unwrap().unwrap();
        assert_eq!(f.store.call_count("write_article"), 2);
        assert_eq!(f.store.content_of(1).await.as_deref(), Some("<p>d</p>"));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(f.store.call_count("write_article"), 2);
        assert_eq!(f.saver.status(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_waits_for_in_flight_write() {
        let f = fixture().await;
        f.store.set_write_delay(Duration::from_millis(100));

        f.saver.edit("<p>x</p>").unwrap();
        let saver = f.saver.clone();
        tokio::spawn(async move { saver.save().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        f.saver.edit("<p>y</p>").unwrap();

        f.saver.flush().await.unwrap();

        assert_eq!(f.store.content_of(1).await.as_deref(), Some("<p>y</p>"));
        assert_eq!(f.store.call_count("write_article"), 2);
        assert_eq!(f.saver.status(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_during_write_is_written_back() {
        let f = fixture().await;
        f.store.set_write_delay(Duration::from_millis(100));

        f.saver.edit("<p>b</p>").unwrap();
        let saver = f.saver.clone();
        let first = tokio::spawn(async move { saver.save().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Create an undo back to the stored content while "b" is written
        f.saver.edit("<p>a</p>").unwrap();
        assert!(f.saver.is_dirty());
        assert_eq!(f.saver.content().as_deref(), Some("<p>a</p>"));

        f.saver.flush().await.unwrap();
        first.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(f.store.content_of(1).await.as_deref(), Some("<p>a</p>"));
        assert_eq!(f.saver.content().as_deref(), Some("<p>a</p>"));
        assert_eq!(f.store.call_count("write_article"), 2);
        assert_eq!(f.saver.status(), SaveStatus::Saved);
        assert!(!f.saver.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_stays_dirty_and_notifies() {
        let f = fixture().await;
        f.store.set_failing_writes(true);

        f.saver.edit("<p>b</p>").unwrap();
        assert!(f.saver.save().await.is_err());
        assert_eq!(f.saver.status(), SaveStatus::Dirty);
        assert_eq!(f.notifier.count(ToastLevel::Error), 1);
        assert!(f.cache.get(1).is_none());

        f.store.set_failing_writes(false);
        f.saver.flush().await.unwrap();
        assert_eq!(f.saver.status(), SaveStatus::Saved);
        assert_eq!(f.saver.content().as_deref(), Some("<p>b</p>"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_is_observable() {
        let f = fixture().await;
        let mut rx = f.saver.subscribe();

        f.saver.edit("<p>b</p>").unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SaveStatus::Dirty);

        f.saver.save().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SaveStatus::Saved);
    }

    #[tokio::test]
    async fn test_edit_without_document() {
        let f = fixture().await;
        f.saver.release();

        assert!(matches!(
            f.saver.edit("<p>b</p>"),
            Err(WorkspaceError::NoActiveArticle)
        ));
        assert!(f.saver.content().is_none());
    }

    #[tokio::test]
    async fn test_saved_hook_receives_row() {
        let f = fixture().await;
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        f.saver.set_saved_hook(Arc::new(move |article: &Article| {
            *sink.lock().unwrap() = Some(article.version);
        }));

        f.saver.edit("<p>b</p>").unwrap();
        tokio_test::assert_ok!(f.saver.save().await);

        assert_eq!(*seen.lock().unwrap(), Some(2));
    }
}
