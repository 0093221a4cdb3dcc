//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Fid;
use clap::Parser;
use std::path::PathBuf;

/// Netcap - follower network size for Farcaster accounts
///
/// Walks the full follower list of an account through the Neynar API and
/// reports the total and average follower counts of those followers.
///
/// Examples:
///   netcap --fid 20066
///   netcap --fid 20066 --format json --output report.json
///   NETCAP_FID=3 netcap --delay-ms 1000
///   netcap --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// FID of the account to analyze
    ///
    /// Falls back to NETCAP_FID, then to `default_fid` in .netcap.toml.
    #[arg(short, long, value_name = "FID", env = "NETCAP_FID")]
    pub fid: Option<Fid>,

    /// Neynar API key
    #[arg(long, value_name = "KEY", env = "NEYNAR_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Neynar API base URL
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Followers requested per page (1-100)
    #[arg(long, value_name = "COUNT")]
    pub page_size: Option<usize>,

    /// Pause between page requests, in milliseconds
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Per-request timeout in seconds (no timeout by default)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .netcap.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .netcap.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(page_size) = self.page_size {
            if !(1..=100).contains(&page_size) {
                return Err("Page size must be between 1 and 100".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
