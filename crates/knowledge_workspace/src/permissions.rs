//! Archive permission guard.
//!
//! This is a UX guard only; the host enforces its own access rules.

use std::sync::Arc;

use article_store::ArticleStore;
use entities::{Article, UserId};
use tokio::sync::OnceCell;
use tracing::warn;

use crate::{WorkspaceError, WorkspaceResult};

/// Decides whether the current user may archive or unarchive an article.
pub struct PermissionGuard {
    store: Arc<dyn ArticleStore>,
    user_id: UserId,
    admin: OnceCell<bool>,
}

impl PermissionGuard {
    pub fn new(store: Arc<dyn ArticleStore>, user_id: UserId) -> Self {
        Self {
            store,
            user_id,
            admin: OnceCell::new(),
        }
    }

    /// Whether the current user is an administrator. The answer is cached
    /// after the first successful lookup; a failed lookup counts as no.
    pub async fn is_admin(&self) -> bool {
        let result = self
            .admin
            .get_or_try_init(|| async { self.store.is_admin().await })
            .await;
        match result {
            Ok(admin) => *admin,
            Err(e) => {
                warn!(user_id = self.user_id, error = %e, "Failed to check admin group");
                false
            }
        }
    }

    /// Owners (record creators) and administrators may archive.
    pub async fn can_archive(&self, article: &Article) -> bool {
        article.create_uid == self.user_id || self.is_admin().await
    }

    pub async fn ensure_can_archive(&self, article: &Article) -> WorkspaceResult<()> {
        if self.can_archive(article).await {
            Ok(())
        } else {
            Err(WorkspaceError::PermissionDenied(format!(
                "only the owner or an administrator can archive \"{}\"",
                article.name
            )))
        }
    }
}
