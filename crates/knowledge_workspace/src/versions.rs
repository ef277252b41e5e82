//! Version history of the open article.
//!
//! The listing starts with a virtual entry for the live state, followed by
//! stored snapshots newest first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use article_store::ArticleStore;
use chrono::{DateTime, Utc};
use entities::{Article, ArticleId, CoverImage, UserId, VersionId};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{notify::Notifier, WorkspaceError, WorkspaceResult};

/// Identifies an entry of the history listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum VersionKey {
    /// The live article.
    Current,
    Snapshot(VersionId),
}

/// One row of the history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionEntry {
    pub key: VersionKey,
    pub version_number: u32,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl VersionEntry {
    pub fn label(&self) -> String {
        match self.key {
            VersionKey::Current => format!("Current (v{})", self.version_number),
            VersionKey::Snapshot(_) => format!("Version {}", self.version_number),
        }
    }
}

/// Content and metadata of a selected entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionPreview {
    pub key: VersionKey,
    pub version_number: u32,
    pub name: String,
    pub content: String,
    pub icon: Option<String>,
    pub cover: CoverImage,
    pub cover_position: u8,
}

/// Result of a diff request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// HTML diff of the selected snapshot against the live content.
    Diff(String),
    /// The live state is selected; there is nothing to compare.
    CurrentSelected,
    /// The selection changed while the diff was computed.
    Stale,
}

#[derive(Debug, Default)]
struct HistoryState {
    article_id: Option<ArticleId>,
    selected: Option<VersionKey>,
}

/// Lists, previews, diffs and restores versions.
pub struct VersionHistory {
    store: Arc<dyn ArticleStore>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<HistoryState>,
}

impl VersionHistory {
    pub fn new(store: Arc<dyn ArticleStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            state: Mutex::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lists the history of `article` and selects the live entry.
    pub async fn load(&self, article: &Article) -> WorkspaceResult<Vec<VersionEntry>> {
        let snapshots = self.store.list_versions(article.id).await?;

        {
            let mut state = self.state();
            state.article_id = Some(article.id);
            state.selected = Some(VersionKey::Current);
        }

        let mut entries = Vec::with_capacity(snapshots.len() + 1);
        entries.push(VersionEntry {
            key: VersionKey::Current,
            version_number: article.version,
            user_id: Some(article.write_uid),
            created_at: article.updated_at,
        });
        entries.extend(snapshots.into_iter().map(|s| VersionEntry {
            key: VersionKey::Snapshot(s.id),
            version_number: s.version_number,
            user_id: s.user_id,
            created_at: s.created_at,
        }));
        debug!(article_id = article.id, count = entries.len(), "Loaded version history");
        Ok(entries)
    }

    /// Currently selected entry.
    pub fn selected(&self) -> Option<VersionKey> {
        self.state().selected
    }

    /// Selects an entry and returns its preview. The live entry is built
    /// from `article` and `live_content` without a remote call.
    pub async fn select(
        &self,
        article: &Article,
        live_content: &str,
        key: VersionKey,
    ) -> WorkspaceResult<VersionPreview> {
        {
            let mut state = self.state();
            state.article_id = Some(article.id);
            state.selected = Some(key);
        }

        match key {
            VersionKey::Current => Ok(VersionPreview {
                key,
                version_number: article.version,
                name: article.name.clone(),
                content: live_content.to_string(),
                icon: article.icon.clone(),
                cover: article.cover.clone(),
                cover_position: article.cover_position,
            }),
            VersionKey::Snapshot(version_id) => {
                let version = self
                    .store
                    .read_version(version_id)
                    .await?
                    .filter(|v| v.article_id == article.id)
                    .ok_or_else(|| WorkspaceError::not_found("Version", version_id))?;
                Ok(VersionPreview {
                    key,
                    version_number: version.version_number,
                    name: version.name,
                    content: version.content,
                    icon: version.icon,
                    cover: version.cover,
                    cover_position: version.cover_position,
                })
            }
        }
    }

    /// Diffs the selected snapshot against the live content.
    pub async fn diff(&self) -> WorkspaceResult<DiffOutcome> {
        let (article_id, key) = {
            let state = self.state();
            match (state.article_id, state.selected) {
                (Some(article_id), Some(key)) => (article_id, key),
                _ => return Err(WorkspaceError::NoActiveArticle),
            }
        };
        let VersionKey::Snapshot(version_id) = key else {
            return Ok(DiffOutcome::CurrentSelected);
        };

        let diff = self.store.diff_versions(article_id, version_id, None).await?;

        let state = self.state();
        if state.article_id != Some(article_id) || state.selected != Some(key) {
            debug!(article_id, version_id, "Discarding stale diff");
            return Ok(DiffOutcome::Stale);
        }
        Ok(DiffOutcome::Diff(diff))
    }

    /// Restores a snapshot remotely and returns the updated row.
    pub async fn restore(&self, article_id: ArticleId, version_id: VersionId) -> WorkspaceResult<Article> {
        match self.store.restore_version(article_id, version_id).await {
            Ok(article) => {
                info!(article_id, version_id, version = article.version, "Restored version");
                self.notifier.success("Version restored");
                self.state().selected = Some(VersionKey::Current);
                Ok(article)
            }
            Err(e) => {
                warn!(article_id, version_id, error = %e, "Failed to restore version");
                self.notifier.error(&format!("Failed to restore version: {}", e));
                Err(e.into())
            }
        }
    }

    /// Forgets the selection.
    pub fn close(&self) {
        *self.state() = HistoryState::default();
    }
}
