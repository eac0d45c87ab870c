//! Configuration for clauselens.
//!
//! Settings load from `config.toml` in the data directory (or an explicit
//! path), with every field defaulting to something usable so a bare
//! `clens serve` works on a fresh machine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CLAUSELENS_DATA_DIR";

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the database, stored documents, and config.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Pipeline stage tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum extracted characters for a document to be analyzable.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    /// Upper bound on a single inference call.
    #[serde(default = "default_inference_timeout_secs")]
    pub inference_timeout_secs: u64,
}

/// Background queue and retry discipline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// When false, analysis runs as an in-process background task instead
    /// of going through the durable job table.
    #[serde(default = "default_queue_enabled")]
    pub enabled: bool,
    /// Worker pool size. Kept small to respect inference rate limits.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Attempt ceiling per analysis request.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,
    /// Active jobs older than this are considered stalled and requeued.
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,
    /// Worker idle poll interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Result cache TTL. Analyses are immutable until re-run or edited,
    /// so this is long.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clauselens")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3050
}
fn default_min_text_chars() -> usize {
    100
}
fn default_inference_timeout_secs() -> u64 {
    300
}
fn default_queue_enabled() -> bool {
    true
}
fn default_workers() -> usize {
    2
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_base_secs() -> u64 {
    10
}
fn default_stall_timeout_secs() -> u64 {
    600
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_cache_ttl_secs() -> u64 {
    // Two days
    172_800
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            queue: QueueConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_text_chars: default_min_text_chars(),
            inference_timeout_secs: default_inference_timeout_secs(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: default_queue_enabled(),
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            retry_base_secs: default_retry_base_secs(),
            stall_timeout_secs: default_stall_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Settings {
    /// Load settings from an explicit config file, or from
    /// `{data_dir}/config.toml` when present, or defaults.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = config_path {
            let raw = fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
            let settings: Settings = toml::from_str(&raw)?;
            return Ok(settings);
        }

        let default_path = default_data_dir().join("config.toml");
        if default_path.exists() {
            let raw = fs::read_to_string(&default_path)?;
            let settings: Settings = toml::from_str(&raw)?;
            return Ok(settings);
        }

        Ok(Settings::default())
    }

    /// Load settings with the data directory overridden.
    pub fn load_with_data_dir(
        config_path: Option<&Path>,
        data_dir: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let mut settings = Self::load(config_path)?;
        if let Some(dir) = data_dir {
            settings.data_dir = dir.to_path_buf();
        }
        Ok(settings)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("clauselens.db")
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("documents")
    }

    /// Create the data directory layout if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(self.documents_dir())
    }
}
