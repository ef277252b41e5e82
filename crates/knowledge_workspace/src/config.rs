//! Workspace configuration

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Workspace configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Host URL for the JSON-RPC store. Without it the in-memory store is used.
    #[serde(default)]
    pub server_url: Option<String>,

    /// Session cookie for the host
    #[serde(default)]
    pub session_id: Option<String>,

    /// Base URL used to build public share links
    #[serde(default = "default_share_base_url")]
    pub share_base_url: String,

    /// Current user id
    #[serde(default = "default_user_id")]
    pub user_id: i64,

    /// Current user display name
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// Quiet period after the last edit before content is saved
    #[serde(default = "default_autosave_debounce_ms")]
    pub autosave_debounce_ms: u64,

    /// Quiet period after the last keystroke before an interactive front end
    /// runs a search
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,

    /// Maximum number of uncached documents fetched per content search
    #[serde(default = "default_search_batch_cap")]
    pub search_batch_cap: usize,

    /// Characters of context on each side of a content match
    #[serde(default = "default_snippet_radius")]
    pub snippet_radius: usize,

    /// Ancestor count above which breadcrumbs are truncated
    #[serde(default = "default_breadcrumb_max_depth")]
    pub breadcrumb_max_depth: usize,

    /// Preference file location
    #[serde(default = "default_preferences_path")]
    pub preferences_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_share_base_url() -> String {
    "http://localhost:8069".to_string()
}

fn default_user_id() -> i64 {
    1
}

fn default_user_name() -> String {
    "Administrator".to_string()
}

fn default_autosave_debounce_ms() -> u64 {
    1500
}

fn default_search_debounce_ms() -> u64 {
    300
}

fn default_search_batch_cap() -> usize {
    200
}

fn default_snippet_radius() -> usize {
    40
}

fn default_breadcrumb_max_depth() -> usize {
    3
}

fn default_preferences_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("knowledge")
        .join("preferences.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            session_id: None,
            share_base_url: default_share_base_url(),
            user_id: default_user_id(),
            user_name: default_user_name(),
            autosave_debounce_ms: default_autosave_debounce_ms(),
            search_debounce_ms: default_search_debounce_ms(),
            search_batch_cap: default_search_batch_cap(),
            snippet_radius: default_snippet_radius(),
            breadcrumb_max_depth: default_breadcrumb_max_depth(),
            preferences_path: default_preferences_path(),
            log_level: default_log_level(),
        }
    }
}

impl WorkspaceConfig {
    /// Load configuration from the config file and environment.
    ///
    /// Environment variables take precedence over the file, the file over
    /// defaults.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let mut config = match Self::find_config_file() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Apply `KNOWLEDGE_*` overrides from a variable lookup
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("KNOWLEDGE_SERVER_URL") {
            self.server_url = Some(url);
        }
        if let Some(session) = lookup("KNOWLEDGE_SESSION_ID") {
            self.session_id = Some(session);
        }
        if let Some(url) = lookup("KNOWLEDGE_SHARE_BASE_URL") {
            self.share_base_url = url;
        }
        if let Some(id) = lookup("KNOWLEDGE_USER_ID") {
            self.user_id = parse_number("KNOWLEDGE_USER_ID", &id)?;
        }
        if let Some(name) = lookup("KNOWLEDGE_USER_NAME") {
            self.user_name = name;
        }
        if let Some(ms) = lookup("KNOWLEDGE_AUTOSAVE_DEBOUNCE_MS") {
            self.autosave_debounce_ms = parse_number("KNOWLEDGE_AUTOSAVE_DEBOUNCE_MS", &ms)?;
        }
        if let Some(ms) = lookup("KNOWLEDGE_SEARCH_DEBOUNCE_MS") {
            self.search_debounce_ms = parse_number("KNOWLEDGE_SEARCH_DEBOUNCE_MS", &ms)?;
        }
        if let Some(cap) = lookup("KNOWLEDGE_SEARCH_BATCH_CAP") {
            self.search_batch_cap = parse_number("KNOWLEDGE_SEARCH_BATCH_CAP", &cap)?;
        }
        if let Some(path) = lookup("KNOWLEDGE_PREFERENCES_PATH") {
            self.preferences_path = PathBuf::from(path);
        }
        if let Some(level) = lookup("KNOWLEDGE_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let locations = [
            PathBuf::from("knowledge.toml"),
            dirs::config_dir()
                .map(|p| p.join("knowledge").join("config.toml"))
                .unwrap_or_default(),
        ];

        locations.into_iter().find(|p| p.exists())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.server_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::invalid("server_url", "must be an http(s) URL"));
            }
            if self.session_id.is_none() {
                tracing::warn!("No session id configured; the host will reject most calls");
            }
        }
        if self.autosave_debounce_ms == 0 {
            return Err(ConfigError::invalid(
                "autosave_debounce_ms",
                "must be greater than zero",
            ));
        }
        if self.search_batch_cap == 0 {
            return Err(ConfigError::invalid(
                "search_batch_cap",
                "must be greater than zero",
            ));
        }
        if self.breadcrumb_max_depth < 2 {
            return Err(ConfigError::invalid(
                "breadcrumb_max_depth",
                "must be at least 2",
            ));
        }
        Ok(())
    }

    /// Debounce delay for auto-save
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Debounce delay for interactive search
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, "not a number"))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },

    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidValue { field, reason }
    }
}
