use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::constants::{
    CHUNK_THRESHOLD_BYTES, DEFAULT_BATCH_SIZE, DEFAULT_LOG_DIR, DEFAULT_LOG_FILE,
    DEFAULT_PROGRESS_INTERVAL, DEFAULT_SQLITE_PATH, ENV_REST_KEY, ENV_REST_URL, ENV_SQLITE_PATH,
    RECORD_ELEMENT,
};
use crate::error::{IngestError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Applies to both chunk slicing and upload batching
    pub batch_size: usize,
    /// Continue past per-record failures; `false` is strict mode
    pub skip_malformed: bool,
    /// Accumulate ProcessingError entries for the run report
    pub log_errors: bool,
    pub chunk_threshold_bytes: u64,
    pub progress_interval: usize,
    pub record_element: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            skip_malformed: true,
            log_errors: true,
            chunk_threshold_bytes: CHUNK_THRESHOLD_BYTES,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            record_element: RECORD_ELEMENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
    Rest,
}

impl FromStr for StorageBackend {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "sqlite" => Ok(StorageBackend::Sqlite),
            "rest" => Ok(StorageBackend::Rest),
            other => Err(IngestError::Config(format!(
                "unknown storage backend '{}' (expected memory, sqlite or rest)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub sqlite_path: String,
    pub rest_url: Option<String>,
    /// Only ever read from the environment
    #[serde(skip)]
    pub rest_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            sqlite_path: DEFAULT_SQLITE_PATH.to_string(),
            rest_url: None,
            rest_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: String,
    pub file_name: String,
    pub file_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: DEFAULT_LOG_DIR.to_string(),
            file_name: DEFAULT_LOG_FILE.to_string(),
            file_output: true,
        }
    }
}

impl Config {
    /// Reads the TOML file at `path` (defaults when it does not exist), then applies
    /// environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                IngestError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
            })?;
            Self::from_toml(&content)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var(ENV_SQLITE_PATH) {
            self.storage.sqlite_path = path;
        }
        if let Ok(url) = std::env::var(ENV_REST_URL) {
            self.storage.rest_url = Some(url);
        }
        if let Ok(key) = std::env::var(ENV_REST_KEY) {
            self.storage.rest_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            return Err(IngestError::Config("pipeline.batch_size must be at least 1".into()));
        }
        if self.pipeline.progress_interval == 0 {
            return Err(IngestError::Config(
                "pipeline.progress_interval must be at least 1".into(),
            ));
        }
        if self.pipeline.record_element.trim().is_empty() {
            return Err(IngestError::Config("pipeline.record_element must not be empty".into()));
        }
        if self.storage.backend == StorageBackend::Rest {
            if self.storage.rest_url.as_deref().map_or(true, str::is_empty) {
                return Err(IngestError::Config(format!(
                    "rest backend requires storage.rest_url or {}",
                    ENV_REST_URL
                )));
            }
            if self.storage.rest_key.as_deref().map_or(true, str::is_empty) {
                return Err(IngestError::Config(format!("rest backend requires {}", ENV_REST_KEY)));
            }
        }
        Ok(())
    }
}
