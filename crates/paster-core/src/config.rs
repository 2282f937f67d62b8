use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum consecutive failed attempts per worker (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay_secs: 0.25,
            max_delay_secs: 10,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(r: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: r.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(r.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(r.max_delay_secs),
        }
    }
}

/// HTTP transport parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Deadline for one whole request, headers and body included.
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            user_agent: concat!("paster/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// What to do with a fragment whose chunk CRCs don't match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityPolicy {
    /// Refuse the fragment; the worker keeps fetching until a clean copy arrives.
    #[default]
    Reject,
    /// Accept it, log a warning and flag the fragment.
    Warn,
}

/// Global configuration loaded from `~/.config/paster/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasterConfig {
    /// Origin server base URLs (scheme, host, port). Workers are spread over them round-robin.
    pub servers: Vec<String>,
    /// Request path appended to each server base.
    pub image_path: String,
    /// Response header carrying the fragment's sequence index.
    pub sequence_header: String,
    /// Number of fragments the image is split into.
    pub fragment_count: usize,
    /// Number of concurrent fetch workers.
    pub workers: usize,
    /// Image selector sent as `img=<n>`.
    pub image: u32,
    /// Output PNG path.
    pub output: PathBuf,
    /// zlib level (0-9) for the reassembled data stream.
    pub compression_level: u32,
    #[serde(default)]
    pub integrity: IntegrityPolicy,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional transport settings; if missing, built-in defaults are used.
    #[serde(default)]
    pub http: Option<HttpConfig>,
}

impl Default for PasterConfig {
    fn default() -> Self {
        Self {
            servers: vec![
                "http://ece252-1.uwaterloo.ca:2520".to_string(),
                "http://ece252-2.uwaterloo.ca:2520".to_string(),
                "http://ece252-3.uwaterloo.ca:2520".to_string(),
            ],
            image_path: "/image".to_string(),
            sequence_header: "X-Ece252-Fragment".to_string(),
            fragment_count: 50,
            workers: 1,
            image: 1,
            output: PathBuf::from("all.png"),
            compression_level: 6,
            integrity: IntegrityPolicy::Reject,
            retry: None,
            http: None,
        }
    }
}

impl PasterConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_default()
    }

    pub fn http(&self) -> HttpConfig {
        self.http.clone().unwrap_or_default()
    }

    /// Reject settings the pipeline can't run with.
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            anyhow::bail!("at least one server is required");
        }
        if self.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        if self.fragment_count == 0 {
            anyhow::bail!("fragment_count must be at least 1");
        }
        if u32::try_from(self.fragment_count).is_err() {
            anyhow::bail!("fragment_count {} is too large", self.fragment_count);
        }
        if self.compression_level > 9 {
            anyhow::bail!(
                "compression_level must be 0-9, got {}",
                self.compression_level
            );
        }
        if self.sequence_header.trim().is_empty() {
            anyhow::bail!("sequence_header must not be empty");
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("paster")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from `path`, writing the defaults there if the file doesn't exist.
pub fn load_or_init_at(path: &Path) -> Result<PasterConfig> {
    if !path.exists() {
        let default_cfg = PasterConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: PasterConfig = toml::from_str(&data)?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PasterConfig> {
    load_or_init_at(&config_path()?)
}
