//! Configuration loading
//!
//! Precedence, lowest first: built-in defaults, the JSON config file,
//! `REGET_*` environment variables and command-line flags.

use anyhow::{Context, Result};
use clap::Args;
use reget_core::HttpTransportConfig;
use reget_types::DownloadOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Contents of `config.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub download: DownloadOptions,
    pub user_agent: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

/// Per-invocation overrides, from flags or environment
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Retries after the first failed attempt of each request
    #[arg(long, env = "REGET_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Delay before the first retry, in milliseconds
    #[arg(long, env = "REGET_RETRY_DELAY_MS")]
    pub retry_delay_ms: Option<u64>,

    /// Upper bound for the retry delay, in milliseconds
    #[arg(long, env = "REGET_MAX_RETRY_DELAY_MS")]
    pub max_retry_delay_ms: Option<u64>,

    /// Bytes per range request
    #[arg(long, env = "REGET_CHUNK_SIZE")]
    pub chunk_size: Option<u64>,

    /// Read/write buffer size in bytes
    #[arg(long, env = "REGET_BUFFER_SIZE")]
    pub buffer_size: Option<usize>,

    /// User-Agent header to send
    #[arg(long, env = "REGET_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, env = "REGET_CONNECT_TIMEOUT")]
    pub connect_timeout: Option<u64>,

    /// Request / read timeout in seconds
    #[arg(long, env = "REGET_TIMEOUT")]
    pub timeout: Option<u64>,
}

/// `<config dir>/reget/config.json`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("reget").join("config.json"))
}

/// Load `path`, or the default config file if it exists, or defaults
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => read(path),
        None => match default_path() {
            Some(path) if path.is_file() => read(&path),
            _ => Ok(Config::default()),
        },
    }
}

fn read(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

impl Config {
    pub fn apply(mut self, overrides: &Overrides) -> Self {
        if let Some(max_retries) = overrides.max_retries {
            self.download.max_retries = max_retries;
        }
        if let Some(ms) = overrides.retry_delay_ms {
            self.download.initial_retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.max_retry_delay_ms {
            self.download.max_retry_delay = Duration::from_millis(ms);
        }
        if let Some(chunk_size) = overrides.chunk_size {
            self.download.chunk_size = chunk_size;
        }
        if let Some(buffer_size) = overrides.buffer_size {
            self.download.buffer_size = buffer_size;
        }
        if let Some(user_agent) = &overrides.user_agent {
            self.user_agent = Some(user_agent.clone());
        }
        if let Some(secs) = overrides.connect_timeout {
            self.connect_timeout_secs = Some(secs);
        }
        if let Some(secs) = overrides.timeout {
            self.request_timeout_secs = Some(secs);
        }
        self
    }

    pub fn download_options(&self) -> DownloadOptions {
        self.download.clone().validate()
    }

    pub fn transport(&self) -> HttpTransportConfig {
        let defaults = HttpTransportConfig::default();
        HttpTransportConfig {
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            connect_timeout: self
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            request_timeout: self
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}
