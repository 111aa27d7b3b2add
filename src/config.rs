//! Configuration management

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::keys::FallbackPolicy;
use crate::{Error, Result};

/// Environment variable prefix (`REALM_VERIFY_PROVIDER__REALM=...`).
pub const ENV_PREFIX: &str = "REALM_VERIFY_";

/// The only signature algorithm the strict verifier accepts.
pub const ACCEPTED_ALGORITHM: &str = "RS256";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity provider location and tenant
    pub provider: ProviderConfig,
    /// Claim checks applied by the verifiers
    pub verification: VerificationConfig,
    /// Key discovery probing
    pub discovery: DiscoveryConfig,
}

/// Identity provider location and tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Candidate base addresses, probed in order
    pub endpoints: Vec<String>,
    /// Realm name
    pub realm: String,
    /// Client ID used for the refresh proxy
    pub client_id: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:8080".to_string(),
                "http://host.docker.internal:8080".to_string(),
                "http://docker.for.mac.localhost:8080".to_string(),
            ],
            realm: "master".to_string(),
            client_id: "account".to_string(),
        }
    }
}

impl ProviderConfig {
    /// Endpoints with any trailing slash removed.
    pub fn base_urls(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|e| e.trim_end_matches('/'))
    }

    /// Realm URL under the modern path convention (`{endpoint}/realms/{realm}`).
    #[must_use]
    pub fn realm_url(&self, endpoint: &str) -> String {
        format!("{}/realms/{}", endpoint.trim_end_matches('/'), self.realm)
    }

    /// Issuers a token from this realm may legitimately carry: one per endpoint.
    #[must_use]
    pub fn valid_issuers(&self) -> Vec<String> {
        self.base_urls().map(|e| self.realm_url(e)).collect()
    }

    /// Whether `issuer` is one of [`valid_issuers`](Self::valid_issuers).
    #[must_use]
    pub fn is_listed_issuer(&self, issuer: &str) -> bool {
        let issuer = issuer.trim_end_matches('/');
        self.base_urls().any(|e| self.realm_url(e) == issuer)
    }

    /// Token endpoint on the first configured address.
    #[must_use]
    pub fn token_endpoint(&self) -> Option<String> {
        self.base_urls()
            .next()
            .map(|e| format!("{}/protocol/openid-connect/token", self.realm_url(e)))
    }
}

/// Claim checks applied by the verifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Required `aud` value
    pub audience: String,
    /// Signature algorithm (only `RS256` is accepted)
    pub algorithm: String,
    /// Clock skew tolerance for `exp`
    pub leeway_secs: u64,
    /// What to do when no key matches the token's `kid`
    pub key_fallback: FallbackPolicy,
    /// Reject tokens whose issuer is not `{endpoint}/realms/{realm}` in the
    /// strict path. The basic path only ever warns.
    pub enforce_issuer_allow_list: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            audience: "account".to_string(),
            algorithm: ACCEPTED_ALGORITHM.to_string(),
            leeway_secs: 0,
            key_fallback: FallbackPolicy::default(),
            enforce_issuer_allow_list: false,
        }
    }
}

/// Key discovery probing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Document name under `/.well-known/`
    pub well_known_document: String,
    /// Per-request timeout for discovery and key-set fetches
    pub timeout_secs: u64,
    /// Per-request timeout for exploratory diagnostics
    pub diagnostic_timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            well_known_document: "openid_configuration".to_string(),
            timeout_secs: 5,
            diagnostic_timeout_secs: 2,
        }
    }
}

impl DiscoveryConfig {
    /// Discovery timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Diagnostic timeout as a [`Duration`].
    #[must_use]
    pub fn diagnostic_timeout(&self) -> Duration {
        Duration::from_secs(self.diagnostic_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or fails [`validate`](Self::validate).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::extract(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge file and environment without validating, so callers can apply
    /// overrides first and then call [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn extract(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // REALM_VERIFY_ prefix, `__` separates nesting levels
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }

    /// Replace realm and endpoints with command-line values when given.
    pub fn apply_overrides(&mut self, realm: Option<&str>, endpoints: &[String]) {
        if let Some(realm) = realm {
            realm.clone_into(&mut self.provider.realm);
        }
        if !endpoints.is_empty() {
            self.provider.endpoints = endpoints.to_vec();
        }
    }

    /// Check invariants the verifiers rely on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.provider.endpoints.is_empty() {
            return Err(Error::Config(
                "provider.endpoints must list at least one address".to_string(),
            ));
        }

        for endpoint in &self.provider.endpoints {
            let url = Url::parse(endpoint)
                .map_err(|e| Error::Config(format!("Invalid endpoint '{endpoint}': {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "Endpoint '{endpoint}' must use http or https"
                )));
            }
        }

        if self.provider.realm.trim().is_empty() {
            return Err(Error::Config("provider.realm must not be empty".to_string()));
        }

        if self.verification.algorithm != ACCEPTED_ALGORITHM {
            return Err(Error::Config(format!(
                "verification.algorithm '{}' is not supported (only {ACCEPTED_ALGORITHM})",
                self.verification.algorithm
            )));
        }

        if self.discovery.timeout_secs == 0 || self.discovery.diagnostic_timeout_secs == 0 {
            return Err(Error::Config("discovery timeouts must be non-zero".to_string()));
        }

        Ok(())
    }
}
