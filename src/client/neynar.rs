//! HTTP client for the Neynar follower listing endpoint.

use super::{FetchError, FollowerSource};
use crate::models::{Fid, FollowerPage};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const FOLLOWERS_PATH: &str = "/v2/farcaster/followers";

/// Connection settings for the Neynar API.
#[derive(Debug, Clone)]
pub struct NeynarConfig {
    pub base_url: String,
    pub api_key: String,
    /// Value sent in the `x-neynar-experimental` header.
    pub experimental: bool,
    /// Whole-request timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for NeynarConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.neynar.com".to_string(),
            api_key: String::new(),
            experimental: false,
            request_timeout: None,
        }
    }
}

/// Error body returned by the API on failure.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Neynar-backed [`FollowerSource`].
pub struct NeynarClient {
    config: NeynarConfig,
    http_client: reqwest::Client,
}

impl NeynarClient {
    /// Create a new client.
    pub fn new(config: NeynarConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn followers_url(&self) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            FOLLOWERS_PATH
        )
    }
}

#[async_trait]
impl FollowerSource for NeynarClient {
    async fn fetch_page(
        &self,
        fid: Fid,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<FollowerPage, FetchError> {
        let fid_param = fid.to_string();
        let limit_param = limit.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("fid", fid_param.as_str()),
            ("viewer_fid", fid_param.as_str()),
            ("limit", limit_param.as_str()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        debug!("GET {} fid={} cursor={:?}", FOLLOWERS_PATH, fid, cursor);

        let response = self
            .http_client
            .get(self.followers_url())
            .query(&query)
            .header("accept", "application/json")
            .header("x-api-key", &self.config.api_key)
            .header(
                "x-neynar-experimental",
                if self.config.experimental { "true" } else { "false" },
            )
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.message);
            return Err(FetchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str::<FollowerPage>(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}
