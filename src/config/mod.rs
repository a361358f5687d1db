//! Service configuration
//!
//! ## Loading Order
//!
//! 1. `GEOSIFT_CONFIG` environment variable (path to TOML file)
//! 2. `geosift.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! Environment overrides (`GEOSIFT_SERVER_ADDR`, `GEOSIFT_DATA_DIR`,
//! `GEOSIFT_WORKERS`, `GEOSIFT_QUEUE_DEPTH`, `GEOSIFT_CORS_ORIGINS`) are
//! applied on top, then CLI flags in `main`. The config is passed by value
//! into the components that need it; there is no global instance.

pub mod defaults;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::analysis::JoinStrategy;
use crate::partition::KMeansConfig;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub kmeans: KMeansConfig,
}

/// HTTP gateway settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    /// Allowed CORS origins for `/analysis`; empty allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: defaults::SERVER_ADDR.to_string(),
            cors_origins: Vec::new(),
        }
    }
}

/// Store / cache location and startup retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub connect_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(defaults::DATA_DIR),
            connect_attempts: defaults::STORAGE_CONNECT_ATTEMPTS,
            initial_backoff_ms: defaults::STORAGE_INITIAL_BACKOFF_MS,
            max_backoff_ms: defaults::STORAGE_MAX_BACKOFF_MS,
        }
    }
}

impl StorageConfig {
    pub const fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Worker pool and pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub workers: usize,
    pub queue_depth: usize,
    pub result_limit: usize,
    pub top_posts: usize,
    pub default_clusters: usize,
    pub max_clusters: usize,
    pub join: JoinStrategy,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: defaults::JOB_WORKERS,
            queue_depth: defaults::JOB_QUEUE_DEPTH,
            result_limit: defaults::SEARCH_RESULT_LIMIT,
            top_posts: defaults::TOP_POSTS_PER_CLUSTER,
            default_clusters: defaults::DEFAULT_CLUSTER_COUNT,
            max_clusters: defaults::MAX_CLUSTER_COUNT,
            join: JoinStrategy::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config parse error ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl AppConfig {
    /// Load using the search order in the module docs, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file_or_default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn load_file_or_default() -> Self {
        if let Ok(path) = std::env::var("GEOSIFT_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from GEOSIFT_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from GEOSIFT_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "GEOSIFT_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("geosift.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./geosift.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./geosift.toml, using defaults");
                }
            }
        }

        info!("No geosift.toml found, using built-in defaults");
        Self::default()
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GEOSIFT_*` overrides. Unparseable values are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("GEOSIFT_SERVER_ADDR") {
            self.server.addr = addr;
        }
        if let Some(dir) = lookup("GEOSIFT_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(origins) = lookup("GEOSIFT_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        for (key, slot) in [
            ("GEOSIFT_WORKERS", &mut self.jobs.workers),
            ("GEOSIFT_QUEUE_DEPTH", &mut self.jobs.queue_depth),
        ] {
            if let Some(v) = lookup(key) {
                match v.parse() {
                    Ok(n) => *slot = n,
                    Err(_) => warn!(key, value = %v, "Ignoring unparseable override"),
                }
            }
        }
    }

    /// Collect every problem instead of stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.server.addr.trim().is_empty() {
            errors.push("server.addr must not be empty".to_string());
        }
        if self.storage.connect_attempts == 0 {
            errors.push("storage.connect_attempts must be at least 1".to_string());
        }
        if self.storage.max_backoff_ms < self.storage.initial_backoff_ms {
            errors.push("storage.max_backoff_ms must be >= storage.initial_backoff_ms".to_string());
        }

        let jobs = &self.jobs;
        if jobs.workers == 0 {
            errors.push("jobs.workers must be at least 1".to_string());
        }
        if jobs.queue_depth == 0 {
            errors.push("jobs.queue_depth must be at least 1".to_string());
        }
        if jobs.result_limit == 0 {
            errors.push("jobs.result_limit must be at least 1".to_string());
        }
        if jobs.top_posts == 0 {
            errors.push("jobs.top_posts must be at least 1".to_string());
        }
        if jobs.max_clusters == 0 {
            errors.push("jobs.max_clusters must be at least 1".to_string());
        }
        if jobs.default_clusters == 0 || jobs.default_clusters > jobs.max_clusters {
            errors.push(format!(
                "jobs.default_clusters must be within [1, {}]",
                jobs.max_clusters
            ));
        }
        if self.kmeans.max_iterations == 0 {
            errors.push("kmeans.max_iterations must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}
