//! Comment threads.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use article_store::{ArticleStore, NewComment};
use entities::{ArticleId, Comment, CommentId};
use serde::Serialize;
use tracing::{info, warn};

use crate::{notify::Notifier, WorkspaceError, WorkspaceResult};

/// A comment with its replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentThread {
    pub comment: Comment,
    pub replies: Vec<CommentThread>,
}

impl CommentThread {
    /// Number of comments in this thread, the root included.
    pub fn count(&self) -> usize {
        1 + self.replies.iter().map(CommentThread::count).sum::<usize>()
    }
}

/// Builds reply trees from a flat list, keeping input order among
/// siblings. Replies to comments missing from the list become top-level.
pub fn build_threads(comments: Vec<Comment>) -> Vec<CommentThread> {
    let ids: HashSet<CommentId> = comments.iter().map(|c| c.id).collect();
    let mut children: HashMap<CommentId, Vec<Comment>> = HashMap::new();
    let mut roots = Vec::new();

    for comment in comments {
        match comment.parent_id {
            Some(parent) if parent != comment.id && ids.contains(&parent) => {
                children.entry(parent).or_default().push(comment);
            }
            _ => roots.push(comment),
        }
    }

    fn attach(
        comment: Comment,
        children: &mut HashMap<CommentId, Vec<Comment>>,
        visited: &mut HashSet<CommentId>,
    ) -> CommentThread {
        visited.insert(comment.id);
        let mut replies = Vec::new();
        for reply in children.remove(&comment.id).unwrap_or_default() {
            if !visited.contains(&reply.id) {
                replies.push(attach(reply, children, visited));
            }
        }
        CommentThread { comment, replies }
    }

    let mut visited = HashSet::new();
    let mut threads: Vec<CommentThread> = roots
        .into_iter()
        .map(|root| attach(root, &mut children, &mut visited))
        .collect();

    // Replies caught in a parent cycle are unreachable from any root.
    let mut stranded: Vec<Comment> = children.into_values().flatten().collect();
    stranded.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
    for comment in stranded {
        if visited.insert(comment.id) {
            threads.push(CommentThread {
                comment,
                replies: Vec::new(),
            });
        }
    }

    threads
}

/// Loads and posts comments of an article.
pub struct Comments {
    store: Arc<dyn ArticleStore>,
    notifier: Arc<dyn Notifier>,
}

impl Comments {
    pub fn new(store: Arc<dyn ArticleStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Fetches the threads of an article.
    pub async fn load(&self, article_id: ArticleId) -> WorkspaceResult<Vec<CommentThread>> {
        match self.store.list_comments(article_id).await {
            Ok(comments) => Ok(build_threads(comments)),
            Err(e) => {
                warn!(article_id, error = %e, "Failed to load comments");
                self.notifier.error("Failed to load comments");
                Err(e.into())
            }
        }
    }

    /// Posts a comment, or a reply when `reply_to` is set, and returns the
    /// refetched threads.
    pub async fn post(
        &self,
        article_id: ArticleId,
        body: &str,
        reply_to: Option<CommentId>,
    ) -> WorkspaceResult<Vec<CommentThread>> {
        let body = body.trim();
        if body.is_empty() {
            return Err(WorkspaceError::InvalidInput("comment is empty".to_string()));
        }

        let comment = match reply_to {
            Some(parent_id) => NewComment::reply(parent_id, body),
            None => NewComment::new(body),
        };
        match self.store.post_comment(article_id, comment).await {
            Ok(comment_id) => {
                info!(article_id, comment_id, reply_to = ?reply_to, "Posted comment");
            }
            Err(e) => {
                warn!(article_id, error = %e, "Failed to post comment");
                self.notifier.error("Failed to post comment");
                return Err(e.into());
            }
        }

        self.load(article_id).await
    }
}
