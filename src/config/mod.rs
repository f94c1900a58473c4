//! Configuration management for tubecache
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream video API configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Comment listing configuration
    #[serde(default)]
    pub comments: CommentsConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL; endpoint paths are joined onto it
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,

    /// Environment variable name for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Explicit API key (takes precedence over the environment)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Retries on HTTP 429
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base delay in milliseconds; attempt n waits base * 2^n
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Client-side request quota
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Comment threads per upstream page
    #[serde(default = "default_comments_page_size")]
    pub comments_page_size: u32,
}

/// Cache backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Sqlite,
}

impl FromStr for CacheBackendKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "sqlite" | "db" => Ok(Self::Sqlite),
            _ => Err(Error::Config(format!(
                "Unsupported cache backend '{}'; expected 'memory' or 'sqlite'",
                value
            ))),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend: "memory" (per process) or "sqlite" (shared metadata database)
    #[serde(default = "default_cache_backend")]
    pub backend: String,

    /// Comments per cache chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl CacheConfig {
    pub fn backend_kind(&self) -> Result<CacheBackendKind> {
        self.backend.parse()
    }
}

/// Comment listing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentsConfig {
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,

    #[serde(default = "default_max_per_page")]
    pub max_per_page: u32,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for tubecache data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            api_key_env: default_api_key_env(),
            api_key: None,
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            requests_per_second: default_requests_per_second(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            comments_page_size: default_comments_page_size(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
        }
    }
}

impl Config {
    /// Get the default base directory for tubecache (~/.tubecache)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tubecache")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Defaults rooted at `base_dir` (or the default base directory)
    pub fn for_base_dir(base_dir: Option<PathBuf>) -> Self {
        let mut config = Config::default();
        config.init_paths(base_dir);
        config
    }

    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("tubecache.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("tubecache.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Resolve the upstream API key: explicit value first, then the environment
    pub fn api_key(&self) -> Option<String> {
        self.upstream
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.upstream.api_key_env).ok())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.cache.backend_kind()?;

        if self.cache.chunk_size == 0 {
            return Err(Error::Config("cache.chunk_size must be positive".to_string()));
        }

        if self.upstream.comments_page_size == 0 || self.upstream.comments_page_size > 100 {
            return Err(Error::Config(
                "upstream.comments_page_size must be between 1 and 100".to_string(),
            ));
        }

        if self.upstream.requests_per_second == 0 {
            return Err(Error::Config(
                "upstream.requests_per_second must be positive".to_string(),
            ));
        }

        if self.comments.default_per_page == 0 || self.comments.max_per_page == 0 {
            return Err(Error::Config(
                "comments page sizes must be positive".to_string(),
            ));
        }

        if self.comments.default_per_page > self.comments.max_per_page {
            return Err(Error::Config(
                "comments.default_per_page must be <= comments.max_per_page".to_string(),
            ));
        }

        Ok(())
    }
}
