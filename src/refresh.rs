//! Refresh-token passthrough.
//!
//! Forwards a `refresh_token` grant to the realm's token endpoint and hands
//! back whatever the provider returned. The response is not verified: treat
//! any token in it as untrusted until it goes through
//! [`TokenVerifier`](crate::verify::TokenVerifier).

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::config::Config;
use crate::{Error, Result};

/// Failure forwarding a refresh grant.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// Transport failure or unreadable response.
    #[error("token endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-2xx status.
    #[error("token endpoint returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },
}

/// Forwards refresh grants to `{endpoints[0]}/realms/{realm}/protocol/openid-connect/token`.
pub struct RefreshProxy {
    http: Client,
    token_endpoint: String,
    client_id: String,
    timeout: Duration,
}

impl RefreshProxy {
    /// Create a proxy with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint is configured or the client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.discovery.timeout())
            .build()?;
        Self::with_client(config, http)
    }

    /// Create a proxy sharing an existing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no endpoint is configured.
    pub fn with_client(config: &Config, http: Client) -> Result<Self> {
        let token_endpoint = config
            .provider
            .token_endpoint()
            .ok_or_else(|| Error::Config("no provider endpoint configured".to_string()))?;

        Ok(Self {
            http,
            token_endpoint,
            client_id: config.provider.client_id.clone(),
            timeout: config.discovery.timeout(),
        })
    }

    /// URL grants are posted to.
    #[must_use]
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Exchange `refresh_token` for a new token response.
    pub async fn refresh(&self, refresh_token: &str) -> std::result::Result<serde_json::Value, RefreshError> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("client_id", self.client_id.as_str());
        params.insert("refresh_token", refresh_token);

        debug!(token_endpoint = %self.token_endpoint, client_id = %self.client_id, "Forwarding refresh grant");

        let response = self
            .http
            .post(&self.token_endpoint)
            .timeout(self.timeout)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "Token endpoint rejected refresh grant");
            return Err(RefreshError::Status { status, body });
        }

        Ok(response.json().await?)
    }
}
