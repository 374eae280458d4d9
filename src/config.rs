//! Global configuration for Javelin

use crate::error::{JavelinError, JavelinResult};
use crate::project::Repository;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default repository used when neither config nor manifest declares any
pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2/";

/// Global configuration, `~/.config/javelin/config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub network: NetworkConfig,
    /// Repository name -> base URL, tried in name order after the
    /// manifest's own repositories
    pub repositories: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Artifact cache directory; defaults to the platform cache dir
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Maximum concurrent downloads and metadata fetches
    pub max_parallel: usize,
    /// Attempts per request for transient failures
    pub retry_attempts: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let mut repositories = BTreeMap::new();
        repositories.insert("central".to_string(), MAVEN_CENTRAL.to_string());
        Self {
            cache: CacheConfig::default(),
            network: NetworkConfig::default(),
            repositories,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { dir: None }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_parallel: 8,
            retry_attempts: 3,
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Effective cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("javelin")
        })
    }

    /// Global repositories as an ordered list.
    pub fn repositories(&self) -> Vec<Repository> {
        self.repositories
            .iter()
            .map(|(name, url)| Repository {
                name: name.clone(),
                url: url.clone(),
            })
            .collect()
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("javelin")
            .join("config.toml")
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub async fn load(&self) -> JavelinResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> JavelinResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| JavelinError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| JavelinError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> JavelinResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| JavelinError::DirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            JavelinError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge manifest repositories over the global ones. Manifest entries win on
/// name collision; manifest order comes first.
pub fn merge_repositories(manifest: &[Repository], global: &[Repository]) -> Vec<Repository> {
    let mut merged: Vec<Repository> = manifest.to_vec();
    for repo in global {
        if !merged.iter().any(|r| r.name == repo.name) {
            merged.push(repo.clone());
        }
    }
    merged
}
