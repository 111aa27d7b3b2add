//! Token verification at two trust levels.
//!
//! - [`strict`]: RS256 signature against a resolved key, plus audience,
//!   issuer and expiry. Produces [`SignedClaims`].
//! - [`basic`]: claim checks only, no signature. Produces
//!   [`UnsignedClaims`].
//!
//! The two outputs are distinct types with no conversion between them, so
//! code that demands a signature cannot be handed unsigned claims.
//! [`TokenVerifier::authenticate`] is the boundary: every failure (including a
//! panic inside verification) becomes a single [`Unauthorized`].

pub mod audit;
pub mod basic;
pub mod strict;

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt as _;
use serde::Serialize;
use tracing::{error, warn};

use crate::Result;
use crate::claims::Claims;
use crate::config::Config;
use crate::error::{TokenVerificationError, Unauthorized, VerifyError};
use crate::keys::{KeySetResolver, KeySetSource};

pub use audit::AuditEvent;
pub use basic::{verify_basic, verify_basic_at};
pub use strict::verify_strict;

/// Which verifier a caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// Signature verified
    Signed,
    /// Claims checked, signature not verified
    Unsigned,
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Signed => "signed",
            Self::Unsigned => "unsigned",
        })
    }
}

/// Claims whose signature was verified by [`verify_strict`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedClaims {
    claims: Claims,
    key_id: String,
}

impl SignedClaims {
    pub(crate) fn new(claims: Claims, key_id: String) -> Self {
        Self { claims, key_id }
    }

    /// Verified claims.
    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// `kid` of the key that verified the signature.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Consume, keeping the claims.
    #[must_use]
    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

/// Claims accepted by [`verify_basic`] without a signature check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnsignedClaims {
    claims: Claims,
    issuer_listed: bool,
}

impl UnsignedClaims {
    pub(crate) fn new(claims: Claims, issuer_listed: bool) -> Self {
        Self {
            claims,
            issuer_listed,
        }
    }

    /// Unverified claims.
    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Whether `iss` is one of the configured endpoints' realm URLs.
    #[must_use]
    pub fn issuer_listed(&self) -> bool {
        self.issuer_listed
    }

    /// Consume, keeping the claims.
    #[must_use]
    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

/// Outcome of [`TokenVerifier::authenticate`], tagged by trust level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "trust", rename_all = "snake_case")]
pub enum Authenticated {
    /// From the strict verifier
    Signed(SignedClaims),
    /// From the basic verifier
    Unsigned(UnsignedClaims),
}

impl Authenticated {
    /// Trust level this outcome was produced at.
    #[must_use]
    pub fn trust_level(&self) -> TrustLevel {
        match self {
            Self::Signed(_) => TrustLevel::Signed,
            Self::Unsigned(_) => TrustLevel::Unsigned,
        }
    }

    /// Claims, whichever verifier produced them.
    #[must_use]
    pub fn claims(&self) -> &Claims {
        match self {
            Self::Signed(signed) => signed.claims(),
            Self::Unsigned(unsigned) => unsigned.claims(),
        }
    }

    /// Signed claims, or `None` for an unsigned outcome.
    #[must_use]
    pub fn signed(&self) -> Option<&SignedClaims> {
        match self {
            Self::Signed(signed) => Some(signed),
            Self::Unsigned(_) => None,
        }
    }
}

/// Verifies tokens against one realm.
///
/// Cheap to clone; share one per process.
#[derive(Clone)]
pub struct TokenVerifier {
    config: Arc<Config>,
    keys: Arc<dyn KeySetSource>,
}

impl TokenVerifier {
    /// Create a verifier that resolves keys from the configured endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let resolver = KeySetResolver::new(&config)?;
        Ok(Self::with_key_source(config, Arc::new(resolver)))
    }

    /// Create a verifier with a custom key source.
    #[must_use]
    pub fn with_key_source(config: Arc<Config>, keys: Arc<dyn KeySetSource>) -> Self {
        Self { config, keys }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Strict verification. See [`strict::verify_strict`].
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] when keys are unavailable or the token is rejected.
    pub async fn verify_strict(&self, token: &str) -> std::result::Result<SignedClaims, VerifyError> {
        strict::verify_strict(&self.config, self.keys.as_ref(), token).await
    }

    /// Basic verification. See [`basic::verify_basic`].
    ///
    /// # Errors
    ///
    /// Returns [`TokenVerificationError`] when a claim check fails.
    pub fn verify_basic(&self, token: &str) -> std::result::Result<UnsignedClaims, TokenVerificationError> {
        basic::verify_basic(&self.config, token)
    }

    /// Verify at `trust`, collapsing every failure into [`Unauthorized`].
    ///
    /// Full error detail goes to the log; the returned reason is safe to
    /// show the caller. An audit event is emitted either way.
    ///
    /// # Errors
    ///
    /// Returns [`Unauthorized`] for any rejection, key failure or panic.
    pub async fn authenticate(
        &self,
        token: &str,
        trust: TrustLevel,
    ) -> std::result::Result<Authenticated, Unauthorized> {
        let outcome = AssertUnwindSafe(self.run(token, trust)).catch_unwind().await;

        match outcome {
            Ok(Ok(authenticated)) => {
                audit::emit(&AuditEvent::accepted(&authenticated));
                Ok(authenticated)
            }
            Ok(Err(err)) => {
                warn!(trust = %trust, code = err.code(), error = ?err, "Token rejected");
                let unauthorized = Unauthorized::from(err);
                audit::emit(&AuditEvent::rejected(trust, &unauthorized));
                Err(unauthorized)
            }
            Err(panic) => {
                error!(trust = %trust, panic = panic_message(panic.as_ref()), "Token verification panicked");
                let unauthorized = Unauthorized::internal();
                audit::emit(&AuditEvent::rejected(trust, &unauthorized));
                Err(unauthorized)
            }
        }
    }

    async fn run(&self, token: &str, trust: TrustLevel) -> std::result::Result<Authenticated, VerifyError> {
        match trust {
            TrustLevel::Signed => self.verify_strict(token).await.map(Authenticated::Signed),
            TrustLevel::Unsigned => self
                .verify_basic(token)
                .map(Authenticated::Unsigned)
                .map_err(VerifyError::from),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// Current time in seconds since the Unix epoch.
pub(crate) fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
