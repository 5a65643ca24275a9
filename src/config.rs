use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RelfsConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub rules: RulesConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Holds `relfs.db` and the `objects/` content tree.
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub relevance_threshold: f64,
    pub max_indexed_content_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RulesConfig {
    pub use_defaults: bool,
    /// Optional TOML file with extra `[[rule]]` entries. Empty means none.
    pub file: String,
    /// Per-rule enabled overrides, keyed by rule id.
    pub enabled: HashMap<String, bool>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 4242,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_relfs_dir().to_string_lossy().into_owned(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            relevance_threshold: 2.0,
            max_indexed_content_bytes: 64 * 1024,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            use_defaults: true,
            file: String::new(),
            enabled: HashMap::new(),
        }
    }
}

/// Returns `~/.relfs/`
pub fn default_relfs_dir() -> PathBuf {
    home_dir().join(".relfs")
}

/// Returns the default config file path: `~/.relfs/config.toml`
pub fn default_config_path() -> PathBuf {
    default_relfs_dir().join("config.toml")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl RelfsConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RelfsConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Config rooted at `data_dir`, with every other setting at its default.
    /// Used by tests and by `--data-dir` on the command line.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let mut config = RelfsConfig::default();
        config.storage.data_dir = data_dir.as_ref().to_string_lossy().into_owned();
        config
    }

    /// Apply environment variable overrides
    /// (RELFS_DATA_DIR, RELFS_LOG_LEVEL, RELFS_SEARCH_THRESHOLD).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RELFS_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("RELFS_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("RELFS_SEARCH_THRESHOLD") {
            match val.parse::<f64>() {
                Ok(threshold) => self.search.relevance_threshold = threshold,
                Err(_) => tracing::warn!(value = %val, "ignoring unparsable RELFS_SEARCH_THRESHOLD"),
            }
        }
    }

    /// Resolve the data directory, expanding `~` if needed.
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.resolved_data_dir().join("relfs.db")
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.resolved_data_dir().join("objects")
    }

    /// Resolve the optional extra rules file. `None` when unset.
    pub fn rules_file(&self) -> Option<PathBuf> {
        if self.rules.file.trim().is_empty() {
            None
        } else {
            Some(expand_tilde(&self.rules.file))
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest)
    } else if path == "~" {
        home_dir()
    } else {
        PathBuf::from(path)
    }
}
