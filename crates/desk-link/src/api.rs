//! HTTP access to the account-link endpoints.

use crate::error::{LinkError, LinkResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Link endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Base URL of the backend.
    pub base_url: String,
    /// Period between link-status checks while the popup is open.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Status checks before the flow gives up.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_authorize_path")]
    pub authorize_path: String,
    #[serde(default = "default_status_path")]
    pub status_path: String,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

// 150 * 2s: five minutes to complete the external authorization.
fn default_max_poll_attempts() -> u32 {
    150
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_authorize_path() -> String {
    "/link/authorize-url".to_string()
}

fn default_status_path() -> String {
    "/link/status".to_string()
}

impl LinkConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            request_timeout_ms: default_request_timeout_ms(),
            authorize_path: default_authorize_path(),
            status_path: default_status_path(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthorizeUrlResponse {
    authorization_url: String,
}

#[derive(Debug, Deserialize)]
struct LinkStatusResponse {
    linked: bool,
}

/// Access to the link endpoints.
///
/// A trait seam so the flow can be driven by scripted responses in tests;
/// production code uses `HttpLinkApi`.
#[async_trait]
pub trait LinkApi: Send + Sync + 'static {
    /// Fetch the external authorization URL to open in the popup.
    async fn authorize_url(&self) -> LinkResult<String>;

    /// Whether the account link has been established.
    async fn link_status(&self) -> LinkResult<bool>;
}

/// reqwest-backed link API.
pub struct HttpLinkApi {
    client: Client,
    config: LinkConfig,
}

impl HttpLinkApi {
    pub fn new(config: LinkConfig) -> LinkResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .cookie_store(true)
            .build()
            .map_err(|e| LinkError::HttpClient(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> LinkResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| LinkError::HttpClient(format!("link request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LinkError::Rejected {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| LinkError::HttpClient(format!("failed to parse link response: {e}")))
    }
}

#[async_trait]
impl LinkApi for HttpLinkApi {
    async fn authorize_url(&self) -> LinkResult<String> {
        let response: AuthorizeUrlResponse = self.get_json(&self.config.authorize_path).await?;
        Ok(response.authorization_url)
    }

    async fn link_status(&self) -> LinkResult<bool> {
        let response: LinkStatusResponse = self.get_json(&self.config.status_path).await?;
        Ok(response.linked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: LinkConfig =
            serde_json::from_str(r#"{"base_url":"http://localhost:8000"}"#).unwrap();
        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.max_poll_attempts, 150);
        assert_eq!(config.authorize_path, "/link/authorize-url");
        assert_eq!(config.status_path, "/link/status");
    }

    #[test]
    fn test_status_response_shape() {
        let response: LinkStatusResponse = serde_json::from_str(r#"{"linked":true}"#).unwrap();
        assert!(response.linked);
    }
}
