// src/config/pipeline.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::refresh::{DEFAULT_BATCH_SIZE, DEFAULT_WORKERS};
use crate::store::cache::DEFAULT_CACHE_KEY;

pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const ENV_WORKERS: &str = "PIPELINE_WORKERS";
pub const ENV_BATCH_SIZE: &str = "PIPELINE_BATCH_SIZE";
pub const ENV_API_BASE_URL: &str = "PIPELINE_API_BASE_URL";
pub const ENV_CSV_PATH: &str = "PIPELINE_CSV_PATH";
pub const ENV_REDIS_URL: &str = "REDIS_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub api_base_url: String,
    pub csv_path: PathBuf,
    pub redis_url: String,
    pub cache_key: String,
    /// Enrichment workers used by refresh.
    pub workers: usize,
    /// Records per saved batch.
    pub batch_size: usize,
    /// Deadline for a whole fetch run (default 10 minutes).
    pub fetch_timeout_secs: u64,
    /// Per-request timeout of the HTTP client.
    pub request_timeout_secs: u64,
    /// Optional cap on concurrent primary lookups; unset means one task per key.
    pub max_in_flight: Option<usize>,
    pub default_from: i64,
    pub default_to: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://pokeapi.co/api/v2".to_string(),
            csv_path: PathBuf::from("resources/records.csv"),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_timeout_secs: 600,
            request_timeout_secs: 10,
            max_in_flight: None,
            default_from: 1,
            default_to: 10,
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: Self = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?,
            _ => toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?,
        };
        Ok(cfg.sanitized())
    }

    /// Lookup order:
    /// 1) $PIPELINE_CONFIG_PATH
    /// 2) config/pipeline.toml
    /// 3) config/pipeline.json
    /// 4) built-in defaults
    ///
    /// Env overrides are applied on top in every case.
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new("config/pipeline.toml").exists() {
            Self::load_from(Path::new("config/pipeline.toml"))?
        } else if Path::new("config/pipeline.json").exists() {
            Self::load_from(Path::new("config/pipeline.json"))?
        } else {
            Self::default()
        };
        base.with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = env_parsed::<usize>(ENV_WORKERS)? {
            self.workers = v;
        }
        if let Some(v) = env_parsed::<usize>(ENV_BATCH_SIZE)? {
            self.batch_size = v;
        }
        if let Ok(v) = std::env::var(ENV_API_BASE_URL) {
            self.api_base_url = v;
        }
        if let Ok(v) = std::env::var(ENV_CSV_PATH) {
            self.csv_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(ENV_REDIS_URL) {
            self.redis_url = v;
        }
        Ok(self.sanitized())
    }

    fn sanitized(mut self) -> Self {
        if self.workers == 0 {
            self.workers = DEFAULT_WORKERS;
        }
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        if self.max_in_flight == Some(0) {
            self.max_in_flight = None;
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = 10;
        }
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("{name} must be a number, got {raw:?}")),
        Err(_) => Ok(None),
    }
}
