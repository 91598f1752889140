//! HTTP access to the session endpoints.
//!
//! The endpoints carry the ambient credential as an HTTP cookie; this
//! layer neither stores nor parses it beyond letting the client's cookie
//! store forward it.

use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use desk_core::{Credentials, UserIdentity};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Session endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the backend (e.g. "http://localhost:8000").
    pub base_url: String,
    /// Refresh loop period.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_info_path")]
    pub info_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
}

fn default_refresh_interval_ms() -> u64 {
    10 * 60 * 1000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_info_path() -> String {
    "/user/info".to_string()
}

fn default_refresh_path() -> String {
    "/user/refresh-token".to_string()
}

fn default_login_path() -> String {
    "/user/login".to_string()
}

fn default_logout_path() -> String {
    "/user/logout".to_string()
}

impl SessionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_interval_ms: default_refresh_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            info_path: default_info_path(),
            refresh_path: default_refresh_path(),
            login_path: default_login_path(),
            logout_path: default_logout_path(),
        }
    }
}

/// Access to the session endpoints.
///
/// A trait seam so the manager can be driven by scripted responses in
/// tests; production code uses `HttpSessionApi`.
#[async_trait]
pub trait SessionApi: Send + Sync + 'static {
    /// Introspect the current session. Ok only when the credential is
    /// valid; carries the current identity.
    async fn session_info(&self) -> AuthResult<UserIdentity>;

    /// Refresh the credential. Ok means the session is still valid.
    async fn refresh_session(&self) -> AuthResult<()>;

    /// Submit credentials. Ok means now authenticated; the identity is
    /// returned when the response carries one.
    async fn login(&self, credentials: &Credentials) -> AuthResult<Option<UserIdentity>>;

    /// Invalidate the credential server-side. Best-effort.
    async fn logout(&self) -> AuthResult<()>;
}

/// reqwest-backed session API.
pub struct HttpSessionApi {
    client: Client,
    config: SessionConfig,
}

impl HttpSessionApi {
    pub fn new(config: SessionConfig) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .cookie_store(true)
            .build()
            .map_err(|e| AuthError::HttpClient(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn session_info(&self) -> AuthResult<UserIdentity> {
        let response = self
            .client
            .get(self.url(&self.config.info_path))
            .send()
            .await
            .map_err(|e| AuthError::HttpClient(format!("session-info request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::HttpClient(format!("failed to parse identity: {e}")))
    }

    async fn refresh_session(&self) -> AuthResult<()> {
        let response = self
            .client
            .get(self.url(&self.config.refresh_path))
            .send()
            .await
            .map_err(|e| AuthError::HttpClient(format!("refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> AuthResult<Option<UserIdentity>> {
        // The login endpoint takes form-encoded credentials.
        let response = self
            .client
            .post(self.url(&self.config.login_path))
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::HttpClient(format!("login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        // Some deployments return the profile with the login response;
        // others just acknowledge. Either is fine: the profile is
        // populated lazily on the next session check.
        match response.json::<UserIdentity>().await {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                debug!(error = %e, "login response carried no identity");
                Ok(None)
            }
        }
    }

    async fn logout(&self) -> AuthResult<()> {
        let response = self
            .client
            .post(self.url(&self.config.logout_path))
            .send()
            .await
            .map_err(|e| AuthError::HttpClient(format!("logout request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
