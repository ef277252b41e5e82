//! Version snapshot entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ArticleId, CoverImage, UserId};

/// Identifier of a version snapshot.
pub type VersionId = i64;

/// Point-in-time snapshot of an article, created by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleVersion {
    /// Unique identifier.
    pub id: VersionId,
    /// Article the snapshot belongs to.
    pub article_id: ArticleId,
    /// Version number at the time of the snapshot.
    pub version_number: u32,
    /// Article name at the time of the snapshot.
    pub name: String,
    /// HTML content at the time of the snapshot.
    pub content: String,
    /// Icon at the time of the snapshot.
    pub icon: Option<String>,
    /// Cover at the time of the snapshot.
    pub cover: CoverImage,
    /// Cover position at the time of the snapshot.
    pub cover_position: u8,
    /// User that saved the snapshot.
    pub user_id: Option<UserId>,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

/// Lightweight version row used by history listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    /// Unique identifier.
    pub id: VersionId,
    /// Version number.
    pub version_number: u32,
    /// User that saved the snapshot.
    pub user_id: Option<UserId>,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

impl From<&ArticleVersion> for VersionSummary {
    fn from(version: &ArticleVersion) -> Self {
        Self {
            id: version.id,
            version_number: version.version_number,
            user_id: version.user_id,
            created_at: version.created_at,
        }
    }
}
