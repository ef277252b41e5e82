//! Session-scoped content cache.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use entities::ArticleId;
use tracing::{debug, warn};

use crate::text::html_to_text;

#[derive(Debug, Clone)]
struct CachedContent {
    html: String,
    text: Option<String>,
}

/// HTML bodies keyed by article id, plus their extracted plain text.
///
/// Entries live for the session only. An entry is written after a confirmed
/// load or save and dropped whenever the remote content is known to have
/// changed. Text extraction runs on the blocking pool, never under the
/// entries lock; readers only ever see text that is already extracted.
#[derive(Debug, Default)]
pub struct ContentCache {
    entries: Mutex<HashMap<ArticleId, CachedContent>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<ArticleId, CachedContent>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached HTML for an article.
    pub fn get(&self, id: ArticleId) -> Option<String> {
        self.entries().get(&id).map(|entry| entry.html.clone())
    }

    pub fn contains(&self, id: ArticleId) -> bool {
        self.entries().contains_key(&id)
    }

    /// Stores HTML for an article. Any extracted text is discarded unless the
    /// HTML is unchanged.
    pub fn insert(&self, id: ArticleId, html: impl Into<String>) {
        let html = html.into();
        let mut entries = self.entries();
        match entries.get_mut(&id) {
            Some(entry) if entry.html == html => {}
            Some(entry) => {
                entry.html = html;
                entry.text = None;
            }
            None => {
                entries.insert(id, CachedContent { html, text: None });
            }
        }
    }

    /// Stores HTML together with its already extracted text.
    pub fn insert_with_text(&self, id: ArticleId, html: String, text: String) {
        self.entries().insert(
            id,
            CachedContent {
                html,
                text: Some(text),
            },
        );
    }

    /// Drops the entry for an article.
    pub fn invalidate(&self, id: ArticleId) {
        self.entries().remove(&id);
    }

    /// Plain text of a cached article, if already extracted.
    pub fn text(&self, id: ArticleId) -> Option<String> {
        self.entries().get(&id)?.text.clone()
    }

    /// Extracts text for the given cached entries that lack it.
    pub async fn extract(&self, ids: &[ArticleId]) {
        let jobs: Vec<(ArticleId, String)> = {
            let entries = self.entries();
            ids.iter()
                .filter_map(|id| {
                    let entry = entries.get(id)?;
                    entry.text.is_none().then(|| (*id, entry.html.clone()))
                })
                .collect()
        };
        self.run_extraction(jobs).await;
    }

    /// Extracts text for every cached entry that lacks it.
    pub async fn extract_all(&self) {
        let jobs: Vec<(ArticleId, String)> = self
            .entries()
            .iter()
            .filter(|(_, entry)| entry.text.is_none())
            .map(|(id, entry)| (*id, entry.html.clone()))
            .collect();
        self.run_extraction(jobs).await;
    }

    /// Extracts the text of one entry in a background task.
    pub fn schedule_extract(self: &Arc<Self>, id: ArticleId) {
        let cache = Arc::clone(self);
        tokio::spawn(async move { cache.extract(&[id]).await });
    }

    async fn run_extraction(&self, jobs: Vec<(ArticleId, String)>) {
        if jobs.is_empty() {
            return;
        }
        let extracted = tokio::task::spawn_blocking(move || {
            jobs.into_iter()
                .map(|(id, html)| {
                    let text = html_to_text(&html);
                    (id, html, text)
                })
                .collect::<Vec<_>>()
        })
        .await;

        match extracted {
            Ok(extracted) => {
                debug!(count = extracted.len(), "Extracted cached content");
                let mut entries = self.entries();
                for (id, html, text) in extracted {
                    // Content replaced meanwhile gets extracted on its own turn.
                    if let Some(entry) = entries.get_mut(&id) {
                        if entry.html == html {
                            entry.text = Some(text);
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "Text extraction task failed"),
        }
    }

    /// Ids from `ids` that have no cached content, in input order.
    pub fn missing(&self, ids: impl IntoIterator<Item = ArticleId>) -> Vec<ArticleId> {
        let entries = self.entries();
        ids.into_iter()
            .filter(|id| !entries.contains_key(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
