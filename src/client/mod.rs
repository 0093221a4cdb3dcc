//! Follower listing sources.
//!
//! The aggregator only talks to the [`FollowerSource`] trait; the
//! production implementation is the Neynar HTTP client.

pub mod neynar;

pub use neynar::{NeynarClient, NeynarConfig};

use crate::models::{Fid, FollowerPage};
use async_trait::async_trait;
use thiserror::Error;

/// Failure while fetching one page of followers.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be completed at the network level.
    #[error("network request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("API error {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Api {
        status: u16,
        message: Option<String>,
    },

    /// The body could not be decoded into a follower page.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Message surfaced to the user in the failed state.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Transport(_) => "Network request failed".to_string(),
            FetchError::Api {
                message: Some(message),
                ..
            } if !message.is_empty() => message.clone(),
            FetchError::Api { status, .. } => {
                format!("Failed to fetch followers (HTTP {})", status)
            }
            FetchError::Malformed(_) => {
                "Failed to fetch followers: malformed response".to_string()
            }
        }
    }
}

/// A paginated listing of an account's followers.
#[async_trait]
pub trait FollowerSource: Send + Sync {
    /// Fetch one page of followers for `fid`, continuing from `cursor`.
    async fn fetch_page(
        &self,
        fid: Fid,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<FollowerPage, FetchError>;
}
