//! Name and content search over the visible articles.

use std::sync::Arc;

use article_store::ArticleStore;
use entities::{Article, ArticleId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{cache::ContentCache, text::html_to_text};

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub article_id: ArticleId,
    pub name: String,
    /// Context around the first content match, empty for name-only hits.
    pub snippet: String,
    pub name_match: bool,
    pub content_match: bool,
}

/// Search over article names and, optionally, their extracted text.
pub struct Search {
    store: Arc<dyn ArticleStore>,
    cache: Arc<ContentCache>,
    batch_cap: usize,
    snippet_radius: usize,
}

impl Search {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        cache: Arc<ContentCache>,
        batch_cap: usize,
        snippet_radius: usize,
    ) -> Self {
        Self {
            store,
            cache,
            batch_cap,
            snippet_radius,
        }
    }

    /// Case-insensitive substring search over names.
    pub fn search_names(candidates: &[Article], query: &str) -> Vec<SearchHit> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        candidates
            .iter()
            .filter(|a| a.name.to_lowercase().contains(&query))
            .map(|a| SearchHit {
                article_id: a.id,
                name: a.name.clone(),
                snippet: String::new(),
                name_match: true,
                content_match: false,
            })
            .collect()
    }

    /// Searches names and, when `in_content` is set, document text.
    ///
    /// Content for at most `batch_cap` uncached candidates is fetched per
    /// call; later calls continue with the remainder. Fetch failures are
    /// logged and the search goes on with what is cached.
    pub async fn search(&self, candidates: &[Article], query: &str, in_content: bool) -> Vec<SearchHit> {
        if !in_content {
            return Self::search_names(candidates, query);
        }
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut missing = self.cache.missing(candidates.iter().map(|a| a.id));
        missing.truncate(self.batch_cap);
        if !missing.is_empty() {
            self.fetch_batch(&missing).await;
        }
        let ids: Vec<ArticleId> = candidates.iter().map(|a| a.id).collect();
        self.cache.extract(&ids).await;

        candidates
            .iter()
            .filter_map(|article| {
                let name_match = article.name.to_lowercase().contains(&query);
                let text = self
                    .cache
                    .text(article.id)
                    .map(|t| t.to_lowercase())
                    .unwrap_or_default();
                let snippet = snippet(&text, &query, self.snippet_radius);
                let content_match = snippet.is_some();
                (name_match || content_match).then(|| SearchHit {
                    article_id: article.id,
                    name: article.name.clone(),
                    snippet: snippet.unwrap_or_default(),
                    name_match,
                    content_match,
                })
            })
            .collect()
    }

    async fn fetch_batch(&self, ids: &[ArticleId]) {
        let contents = match self.store.read_content(ids).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(count = ids.len(), error = %e, "Content batch read failed");
                return;
            }
        };

        let extracted = tokio::task::spawn_blocking(move || {
            contents
                .into_iter()
                .map(|c| {
                    let text = html_to_text(&c.content);
                    (c.id, c.content, text)
                })
                .collect::<Vec<_>>()
        })
        .await;

        match extracted {
            Ok(extracted) => {
                debug!(count = extracted.len(), "Extracted content for search");
                for (id, html, text) in extracted {
                    if !self.cache.contains(id) {
                        self.cache.insert_with_text(id, html, text);
                    }
                }
            }
            Err(e) => warn!(error = %e, "Text extraction task failed"),
        }
    }
}

/// `"... " + context + " ..."` around the first occurrence of `query` in
/// `text`, with `radius` characters on each side.
fn snippet(text: &str, query: &str, radius: usize) -> Option<String> {
    let byte_idx = text.find(query)?;
    let char_idx = text[..byte_idx].chars().count();
    let query_chars = query.chars().count();
    let start = char_idx.saturating_sub(radius);
    let context: String = text
        .chars()
        .skip(start)
        .take(char_idx - start + query_chars + radius)
        .collect();
    Some(format!("... {} ...", context.trim()))
}
