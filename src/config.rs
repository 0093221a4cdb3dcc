//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.netcap.toml` files.

use crate::aggregator::AggregatorConfig;
use crate::client::NeynarConfig;
use crate::models::Fid;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".netcap.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Neynar API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub aggregator: AggregatorSettings,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Account analyzed when no FID is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_fid: Option<Fid>,
}

/// Neynar API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key. Prefer the NEYNAR_API_KEY environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Followers requested per page (1-100).
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Opt in to experimental API features.
    #[serde(default)]
    pub experimental: bool,

    /// Per-request timeout in seconds. Unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_seconds: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            page_size: default_page_size(),
            experimental: false,
            request_timeout_seconds: None,
        }
    }
}

fn default_base_url() -> String {
    "https://api.neynar.com".to_string()
}

fn default_page_size() -> usize {
    100
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorSettings {
    /// Pause between page requests, in milliseconds.
    #[serde(default = "default_inter_page_delay_ms")]
    pub inter_page_delay_ms: u64,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            inter_page_delay_ms: default_inter_page_delay_ms(),
        }
    }
}

fn default_inter_page_delay_ms() -> u64 {
    500
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from `dir/.netcap.toml`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE_NAME);

        if path.exists() {
            Ok(Some(Self::load(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings when given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref api_key) = args.api_key {
            self.api.api_key = Some(api_key.clone());
        }
        if let Some(ref api_url) = args.api_url {
            self.api.base_url = api_url.clone();
        }
        if let Some(page_size) = args.page_size {
            self.api.page_size = page_size;
        }
        if let Some(timeout) = args.timeout {
            self.api.request_timeout_seconds = Some(timeout);
        }
        if let Some(delay) = args.delay_ms {
            self.aggregator.inter_page_delay_ms = delay;
        }
    }

    /// Check values that serde alone cannot enforce.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.api.page_size) {
            anyhow::bail!(
                "Page size must be between 1 and 100, got {}",
                self.api.page_size
            );
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            anyhow::bail!("API URL must start with 'http://' or 'https://'");
        }
        if self.api.request_timeout_seconds == Some(0) {
            anyhow::bail!("Timeout must be at least 1 second");
        }
        Ok(())
    }

    /// Client settings derived from this configuration.
    pub fn neynar_config(&self) -> Result<NeynarConfig> {
        let api_key = self
            .api
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .context("No API key configured. Set NEYNAR_API_KEY or pass --api-key")?;

        Ok(NeynarConfig {
            base_url: self.api.base_url.clone(),
            api_key,
            experimental: self.api.experimental,
            request_timeout: self.api.request_timeout_seconds.map(Duration::from_secs),
        })
    }

    /// Aggregator settings derived from this configuration.
    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            page_size: self.api.page_size,
            inter_page_delay: Duration::from_millis(self.aggregator.inter_page_delay_ms),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
