//! Key set resolution over HTTP.
//!
//! Walks the [`ProbePlan`]: every discovery probe first, then every
//! realm-info probe. A probe that fails for any reason (non-200, timeout,
//! connection error, malformed body, missing field) is recorded and the next
//! probe is tried. There is no retry of a single probe.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::pem::{PemConversionError, signing_key_from_pem};
use super::probe::{Probe, ProbePlan};
use super::{DEFAULT_ALGORITHM, KeySet, KeySetSource};
use crate::config::Config;
use crate::error::{KeyDiscoveryError, ProbeFailure};
use crate::{Error, Result};

/// Key id given to a synthesized key when the realm descriptor has no name.
pub const DEFAULT_KEY_ID: &str = "default";

/// The only field of the discovery document we need.
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    jwks_uri: Option<String>,
}

/// Realm descriptor served at `/realms/{realm}`.
#[derive(Debug, Deserialize)]
struct RealmInfo {
    #[serde(default)]
    realm: Option<String>,
    #[serde(default)]
    public_key: Option<String>,
    #[serde(default)]
    algorithm: Option<String>,
}

/// Why a single probe did not produce a key set.
#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error("HTTP {0}")]
    Status(StatusCode),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed response body: {0}")]
    Decode(reqwest::Error),

    #[error("malformed key set: {0}")]
    KeySet(#[from] serde_json::Error),

    #[error("discovery document has no jwks_uri")]
    MissingJwksUri,

    #[error("key set fetch from {uri} failed: {source}")]
    JwksFetch {
        uri: String,
        source: Box<ProbeError>,
    },

    #[error("realm descriptor has no public_key")]
    MissingPublicKey,

    #[error(transparent)]
    Pem(#[from] PemConversionError),
}

/// Resolves a [`KeySet`] from whichever discovery surface the provider has.
pub struct KeySetResolver {
    plan: ProbePlan,
    http: Client,
    timeout: Duration,
}

impl KeySetResolver {
    /// Create a resolver with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.discovery.timeout())
            .build()
            .map_err(Error::Http)?;
        Ok(Self::with_client(config, http))
    }

    /// Create a resolver sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: &Config, http: Client) -> Self {
        Self {
            plan: ProbePlan::from_config(config),
            http,
            timeout: config.discovery.timeout(),
        }
    }

    /// The probe order this resolver follows.
    #[must_use]
    pub fn plan(&self) -> &ProbePlan {
        &self.plan
    }

    /// Resolve the key set, probing from the first endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`KeyDiscoveryError`] listing every failed probe when neither
    /// pass yields a key set.
    pub async fn resolve(&self) -> std::result::Result<KeySet, KeyDiscoveryError> {
        let mut attempts = Vec::new();

        for probe in self.plan.discovery() {
            debug!(url = %probe.url, "Trying OpenID discovery");
            match self.try_discovery(probe).await {
                Ok(keys) => {
                    info!(url = %probe.url, keys = keys.len(), "Resolved key set via discovery");
                    return Ok(keys);
                }
                Err(e) => record_failure(&mut attempts, probe, &e),
            }
        }

        debug!("Discovery exhausted, falling back to realm descriptors");

        for probe in self.plan.realm_info() {
            debug!(url = %probe.url, "Trying realm descriptor");
            match self.try_realm_info(probe).await {
                Ok(keys) => {
                    info!(url = %probe.url, kid = ?keys.key_ids(), "Resolved key set via realm descriptor");
                    return Ok(keys);
                }
                Err(e) => record_failure(&mut attempts, probe, &e),
            }
        }

        warn!(attempts = attempts.len(), "No endpoint yielded a usable key set");
        Err(KeyDiscoveryError { attempts })
    }

    async fn try_discovery(&self, probe: &Probe) -> std::result::Result<KeySet, ProbeError> {
        let document: DiscoveryDocument = self
            .get_ok(&probe.url)
            .await?
            .json()
            .await
            .map_err(ProbeError::Decode)?;

        let jwks_uri = document
            .jwks_uri
            .filter(|uri| !uri.trim().is_empty())
            .ok_or(ProbeError::MissingJwksUri)?;

        self.fetch_key_set(&jwks_uri)
            .await
            .map_err(|e| ProbeError::JwksFetch {
                uri: jwks_uri,
                source: Box::new(e),
            })
    }

    async fn fetch_key_set(&self, jwks_uri: &str) -> std::result::Result<KeySet, ProbeError> {
        debug!(jwks_uri = %jwks_uri, "Fetching key set");
        let document: serde_json::Value = self
            .get_ok(jwks_uri)
            .await?
            .json()
            .await
            .map_err(ProbeError::Decode)?;
        Ok(KeySet::from_jwks(&document)?)
    }

    async fn try_realm_info(&self, probe: &Probe) -> std::result::Result<KeySet, ProbeError> {
        let info: RealmInfo = self
            .get_ok(&probe.url)
            .await?
            .json()
            .await
            .map_err(ProbeError::Decode)?;

        let public_key = info
            .public_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProbeError::MissingPublicKey)?;
        let key_id = info.realm.unwrap_or_else(|| DEFAULT_KEY_ID.to_string());
        let algorithm = info.algorithm.unwrap_or_else(|| DEFAULT_ALGORITHM.to_string());

        let key = signing_key_from_pem(&public_key, &key_id, &algorithm)?;
        Ok(KeySet::new(vec![key]))
    }

    /// `GET` with the per-request timeout, accepting only `200 OK`.
    async fn get_ok(&self, url: &str) -> std::result::Result<Response, ProbeError> {
        let response = self.http.get(url).timeout(self.timeout).send().await?;
        match response.status() {
            StatusCode::OK => Ok(response),
            status => Err(ProbeError::Status(status)),
        }
    }
}

fn record_failure(attempts: &mut Vec<ProbeFailure>, probe: &Probe, err: &ProbeError) {
    debug!(url = %probe.url, error = %err, "Probe failed");
    attempts.push(ProbeFailure {
        url: probe.url.clone(),
        reason: err.to_string(),
    });
}

#[async_trait::async_trait]
impl KeySetSource for KeySetResolver {
    async fn resolve_key_set(&self) -> std::result::Result<KeySet, KeyDiscoveryError> {
        self.resolve().await
    }
}
