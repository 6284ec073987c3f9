//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/lexsync/config.toml)
//! 3. Environment variables (LEXSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "LEXSYNC";

/// Default remote document holding articles, progress and reveal state
pub const DEFAULT_ARTICLES_DOCUMENT: &str = "lexsync-articles.json";

/// Default remote document holding vocabulary
pub const DEFAULT_VOCABULARY_DOCUMENT: &str = "lexsync-vocabulary.json";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for local data (library file)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Sync silently after write commands
    #[serde(default = "default_true")]
    pub auto_sync: bool,

    /// Remote snapshot store
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Sync engine tuning
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Remote snapshot store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the gist-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Access token; sync is disabled while unset
    #[serde(default)]
    pub token: Option<String>,

    /// Remote document name for the articles dataset
    #[serde(default = "default_articles_document")]
    pub articles_document: String,

    /// Remote document name for the vocabulary dataset
    #[serde(default = "default_vocabulary_document")]
    pub vocabulary_document: String,

    /// Description attached to newly created remote documents
    #[serde(default = "default_description")]
    pub description: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Sync engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How long an availability probe result is trusted, in seconds
    #[serde(default = "default_availability_ttl_secs")]
    pub availability_ttl_secs: u64,

    /// Refuse to overwrite the remote snapshot if it changed since the fetch
    #[serde(default)]
    pub verify_revision: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            auto_sync: true,
            remote: RemoteConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            articles_document: default_articles_document(),
            vocabulary_document: default_vocabulary_document(),
            description: default_description(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            availability_ttl_secs: default_availability_ttl_secs(),
            verify_revision: false,
        }
    }
}

impl RemoteConfig {
    /// Whether a token is present
    pub fn is_configured(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

impl SyncConfig {
    /// Availability probe TTL
    pub fn availability_ttl(&self) -> Duration {
        Duration::from_secs(self.availability_ttl_secs)
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (LEXSYNC_DATA_DIR, LEXSYNC_REMOTE_TOKEN, ...)
    /// 2. Config file (~/.config/lexsync/config.toml or LEXSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // LEXSYNC_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // LEXSYNC_REMOTE_TOKEN
        if let Ok(val) = std::env::var(format!("{}_REMOTE_TOKEN", ENV_PREFIX)) {
            self.remote.token = if val.is_empty() { None } else { Some(val) };
        }

        // LEXSYNC_REMOTE_URL
        if let Ok(val) = std::env::var(format!("{}_REMOTE_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.remote.api_url = val;
            }
        }

        // LEXSYNC_AUTO_SYNC
        if let Ok(val) = std::env::var(format!("{}_AUTO_SYNC", ENV_PREFIX)) {
            self.auto_sync = val.eq_ignore_ascii_case("true") || val == "1";
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Set a value by its dotted key, as used by `lexsync config set`
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parse_bool = |v: &str| v.eq_ignore_ascii_case("true") || v == "1";
        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "auto_sync" => self.auto_sync = parse_bool(value),
            "remote.api_url" => self.remote.api_url = value.to_string(),
            "remote.token" => {
                self.remote.token = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "remote.articles_document" => self.remote.articles_document = value.to_string(),
            "remote.vocabulary_document" => self.remote.vocabulary_document = value.to_string(),
            "remote.description" => self.remote.description = value.to_string(),
            "remote.timeout_secs" => {
                self.remote.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid number for {}: {}", key, value))?
            }
            "sync.availability_ttl_secs" => {
                self.sync.availability_ttl_secs = value
                    .parse()
                    .with_context(|| format!("Invalid number for {}: {}", key, value))?
            }
            "sync.verify_revision" => self.sync.verify_revision = parse_bool(value),
            _ => anyhow::bail!("Unknown configuration key: {}", key),
        }
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with LEXSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lexsync")
            .join("config.toml")
    }

    /// Get the path to the local library file
    pub fn library_path(&self) -> PathBuf {
        self.data_dir.join("library.json")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lexsync")
}

fn default_true() -> bool {
    true
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_articles_document() -> String {
    DEFAULT_ARTICLES_DOCUMENT.to_string()
}

fn default_vocabulary_document() -> String {
    DEFAULT_VOCABULARY_DOCUMENT.to_string()
}

fn default_description() -> String {
    "lexsync data".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_availability_ttl_secs() -> u64 {
    30
}
