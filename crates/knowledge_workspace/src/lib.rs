//! Knowledge workspace core
//!
//! A split-pane article workspace as data: a navigable tree of
//! hierarchical articles on one side, a single open document on the other.
//! This crate owns the client-side state logic of that workspace and binds
//! to the host through [`article_store::ArticleStore`].
//!
//! - [`tree`]: filtering, ancestor closure, sections, rows, breadcrumbs
//! - [`controller`]: the open document, content cache, browsing history
//! - [`autosave`]: debounced, coalesced content writes
//! - [`search`]: name and content search with bounded fetching
//! - [`comments`], [`versions`]: comment threads and version history
//! - [`workspace`]: the [`KnowledgeWorkspace`] facade tying it together

pub mod autosave;
pub mod cache;
pub mod comments;
pub mod config;
pub mod controller;
mod error;
pub mod history;
pub mod notify;
pub mod permissions;
pub mod preferences;
pub mod search;
pub mod text;
pub mod tree;
pub mod versions;
pub mod workspace;

pub use autosave::{AutoSaver, SaveStatus};
pub use config::{ConfigError, WorkspaceConfig};
pub use controller::{DocumentController, DocumentView, OpenOutcome};
pub use error::*;
pub use notify::{CollectingNotifier, LogNotifier, Notifier, ToastLevel};
pub use preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences};
pub use search::SearchHit;
pub use tree::{ArticleTree, FilterSpec, SectionKind};
pub use workspace::{ExportedArticle, KnowledgeWorkspace};
