//! Persisted user preferences.
//!
//! Preferences are a convenience cache: an unreadable or corrupt file falls
//! back to defaults instead of failing the workspace.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use entities::{ArticleId, SortOrder, TagId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{tree::FilterSpec, WorkspaceError, WorkspaceResult};

/// Smallest accepted sidebar width, in pixels.
pub const MIN_SIDEBAR_WIDTH: u16 = 150;
/// Largest accepted sidebar width, in pixels.
pub const MAX_SIDEBAR_WIDTH: u16 = 600;

/// User preferences restored at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Sidebar width in pixels, `None` for the front end's default.
    pub sidebar_width: Option<u16>,
    pub sidebar_collapsed: bool,
    pub sort: SortOrder,
    pub last_article_id: Option<ArticleId>,
    pub expanded_ids: Vec<ArticleId>,
    pub selected_tag_ids: Vec<TagId>,
    pub favorites_only: bool,
    pub show_archived: bool,
    pub search_in_content: bool,
}

impl Preferences {
    /// Sets the sidebar width. Widths outside 150..=600 are ignored.
    pub fn set_sidebar_width(&mut self, width: u16) -> bool {
        if (MIN_SIDEBAR_WIDTH..=MAX_SIDEBAR_WIDTH).contains(&width) {
            self.sidebar_width = Some(width);
            true
        } else {
            false
        }
    }

    /// Drops values a hand-edited file may carry out of range.
    fn sanitized(mut self) -> Self {
        if let Some(width) = self.sidebar_width {
            if !(MIN_SIDEBAR_WIDTH..=MAX_SIDEBAR_WIDTH).contains(&width) {
                self.sidebar_width = None;
            }
        }
        self
    }

    /// Filter restored from the saved toggles. The query is never persisted.
    pub fn filter(&self) -> FilterSpec {
        FilterSpec {
            query: String::new(),
            tag_ids: self.selected_tag_ids.clone(),
            favorites_only: self.favorites_only,
            show_archived: self.show_archived,
            search_in_content: self.search_in_content,
            sort: self.sort,
        }
    }

    /// Copies the persisted parts of a filter.
    pub fn remember_filter(&mut self, filter: &FilterSpec) {
        self.selected_tag_ids = filter.tag_ids.clone();
        self.favorites_only = filter.favorites_only;
        self.show_archived = filter.show_archived;
        self.search_in_content = filter.search_in_content;
        self.sort = filter.sort;
    }
}

/// Storage for [`Preferences`].
pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> Preferences;

    fn save(&self, preferences: &Preferences) -> WorkspaceResult<()>;
}

/// Preferences kept as a JSON file.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self) -> Preferences {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Preferences::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read preferences");
                return Preferences::default();
            }
        };

        match serde_json::from_str::<Preferences>(&contents) {
            Ok(preferences) => preferences.sanitized(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt preferences");
                Preferences::default()
            }
        }
    }

    fn save(&self, preferences: &Preferences) -> WorkspaceResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| WorkspaceError::Preferences(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(preferences)
            .map_err(|e| WorkspaceError::Preferences(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| WorkspaceError::Preferences(e.to_string()))?;
        debug!(path = %self.path.display(), "Saved preferences");
        Ok(())
    }
}

/// Preferences kept in memory.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    preferences: Mutex<Preferences>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Preferences {
        self.preferences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, preferences: &Preferences) -> WorkspaceResult<()> {
        *self
            .preferences
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = preferences.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidebar_width_bounds() {
        let mut prefs = Preferences::default();
        assert!(!prefs.set_sidebar_width(149));
        assert!(!prefs.set_sidebar_width(601));
        assert_eq!(prefs.sidebar_width, None);
        assert!(prefs.set_sidebar_width(320));
        assert_eq!(prefs.sidebar_width, Some(320));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("knowledge").join("prefs.json"));
        assert_eq!(store.load(), Preferences::default());

        let mut prefs = Preferences {
            sort: SortOrder::LikesDesc,
            last_article_id: Some(12),
            expanded_ids: vec![1, 4],
            show_archived: true,
            ..Default::default()
        };
        prefs.set_sidebar_width(400);
        store.save(&prefs).unwrap();

        assert_eq!(store.load(), prefs);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(FilePreferenceStore::new(&path).load(), Preferences::default());

        fs::write(&path, r#"{"sidebar_width": 900, "favorites_only": true}"#).unwrap();
        let prefs = FilePreferenceStore::new(&path).load();
        assert_eq!(prefs.sidebar_width, None);
        assert!(prefs.favorites_only);
    }

    #[test]
    fn test_filter_round_trip() {
        let mut filter = FilterSpec {
            query: "transient".to_string(),
            favorites_only: true,
            sort: SortOrder::ViewsDesc,
            ..Default::default()
        };
        filter.toggle_tag(3);

        let mut prefs = Preferences::default();
        prefs.remember_filter(&filter);
        let restored = prefs.filter();

        assert_eq!(restored.tag_ids, vec![3]);
        assert_eq!(restored.sort, SortOrder::ViewsDesc);
        assert!(restored.query.is_empty());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryPreferenceStore::new();
        let prefs = Preferences {
            sidebar_collapsed: true,
            ..Default::default()
        };
        store.save(&prefs).unwrap();
        assert!(store.load().sidebar_collapsed);
    }
}
