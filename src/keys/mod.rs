//! Signing keys: resolution, conversion and selection.
//!
//! # Resolution flow
//!
//! 1. [`ProbePlan`] crosses every configured endpoint with the modern
//!    (`/realms/{realm}`) and legacy (`/auth/realms/{realm}`) discovery paths,
//!    then lists one realm-info probe per endpoint.
//! 2. [`KeySetResolver`] walks the discovery probes in order; the first
//!    discovery document whose `jwks_uri` yields a key set wins.
//! 3. Only when every discovery probe failed does it walk the realm-info
//!    probes, converting the bare PEM key with [`signing_key_from_pem`].
//! 4. [`select_key`] picks the key named by the token's `kid`, falling back to
//!    the first key when allowed by [`FallbackPolicy`].
//!
//! Nothing is cached: each resolution probes from the first endpoint again.

pub mod pem;
pub mod probe;
pub mod resolver;
pub mod selector;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::KeyDiscoveryError;

pub use pem::{PemConversionError, signing_key_from_pem};
pub use probe::{DiscoveryPath, Probe, ProbeKind, ProbePlan};
pub use resolver::KeySetResolver;
pub use selector::{FallbackPolicy, select_key, select_key_with};

/// Default signature algorithm assumed when a key omits `alg`.
pub const DEFAULT_ALGORITHM: &str = "RS256";

/// JWK key type. Only RSA keys are verifiable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    /// RSA public key (`"kty": "RSA"`)
    #[serde(rename = "RSA")]
    Rsa,
}

/// JWK public key use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyUse {
    /// Signature verification (`"use": "sig"`)
    #[default]
    #[serde(rename = "sig")]
    Signature,
    /// Encryption (`"use": "enc"`); never used for verification
    #[serde(rename = "enc")]
    Encryption,
}

fn default_algorithm() -> String {
    DEFAULT_ALGORITHM.to_string()
}

/// A normalized RSA signing key in JWK form.
///
/// `modulus` and `exponent` hold the big-endian integers base64url-encoded
/// without padding, exactly as a provider publishes `n` and `e`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    /// Key identifier (`kid`)
    #[serde(rename = "kid", default)]
    pub key_id: String,
    /// Key type (`kty`)
    #[serde(rename = "kty")]
    pub key_type: KeyType,
    /// Intended use (`use`)
    #[serde(rename = "use", default)]
    pub usage: KeyUse,
    /// Signature algorithm (`alg`)
    #[serde(rename = "alg", default = "default_algorithm")]
    pub algorithm: String,
    /// RSA modulus (`n`)
    #[serde(rename = "n")]
    pub modulus: String,
    /// RSA public exponent (`e`)
    #[serde(rename = "e")]
    pub exponent: String,
}

impl SigningKey {
    /// Build an RSA signature key from raw big-endian components.
    #[must_use]
    pub fn from_rsa_components(
        key_id: impl Into<String>,
        algorithm: impl Into<String>,
        modulus: &[u8],
        exponent: &[u8],
    ) -> Self {
        Self {
            key_id: key_id.into(),
            key_type: KeyType::Rsa,
            usage: KeyUse::Signature,
            algorithm: algorithm.into(),
            modulus: URL_SAFE_NO_PAD.encode(modulus),
            exponent: URL_SAFE_NO_PAD.encode(exponent),
        }
    }

    /// Decoded modulus bytes, or `None` if `n` is not valid base64url.
    #[must_use]
    pub fn modulus_bytes(&self) -> Option<Vec<u8>> {
        URL_SAFE_NO_PAD.decode(&self.modulus).ok()
    }

    /// Decoded exponent bytes, or `None` if `e` is not valid base64url.
    #[must_use]
    pub fn exponent_bytes(&self) -> Option<Vec<u8>> {
        URL_SAFE_NO_PAD.decode(&self.exponent).ok()
    }
}

/// Ordered set of signing keys from one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    keys: Vec<SigningKey>,
}

impl KeySet {
    /// Wrap keys, preserving order.
    #[must_use]
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    /// Parse a provider JWKS document (`{"keys": [...]}`).
    ///
    /// Keys that are not RSA, are marked for encryption, or lack `n`/`e` are
    /// skipped; the rest keep provider order.
    ///
    /// # Errors
    ///
    /// Fails only if the document has no `keys` array.
    pub fn from_jwks(document: &serde_json::Value) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct RawJwks {
            keys: Vec<serde_json::Value>,
        }

        let raw = RawJwks::deserialize(document)?;
        let keys = raw
            .keys
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<SigningKey>(value) {
                Ok(key) if key.usage == KeyUse::Signature => Some(key),
                Ok(key) => {
                    debug!(kid = %key.key_id, "Skipping encryption key");
                    None
                }
                Err(e) => {
                    debug!(error = %e, "Skipping unsupported JWK");
                    None
                }
            })
            .collect();

        Ok(Self { keys })
    }

    /// Keys in resolution order.
    #[must_use]
    pub fn keys(&self) -> &[SigningKey] {
        &self.keys
    }

    /// First key, if any.
    #[must_use]
    pub fn first(&self) -> Option<&SigningKey> {
        self.keys.first()
    }

    /// First key whose `kid` equals `key_id`.
    #[must_use]
    pub fn find(&self, key_id: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|k| k.key_id == key_id)
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// `true` when no keys were resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key IDs in order, for logging.
    #[must_use]
    pub fn key_ids(&self) -> Vec<&str> {
        self.keys.iter().map(|k| k.key_id.as_str()).collect()
    }
}

/// Source of key sets for the strict verifier.
///
/// [`KeySetResolver`] probes the identity provider on every call. A bare
/// [`KeySet`] is also a source, returning itself, which pins keys for tests
/// or offline verification.
#[async_trait::async_trait]
pub trait KeySetSource: Send + Sync + 'static {
    /// Resolve the current key set.
    async fn resolve_key_set(&self) -> Result<KeySet, KeyDiscoveryError>;
}

#[async_trait::async_trait]
impl KeySetSource for KeySet {
    async fn resolve_key_set(&self) -> Result<KeySet, KeyDiscoveryError> {
        Ok(self.clone())
    }
}
