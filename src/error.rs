//! Error types for realm-verify
//!
//! [`Error`] covers process-level failures (configuration, HTTP). The
//! verification taxonomy lives beside it: [`KeyDiscoveryError`],
//! [`KeySelectionError`] and [`TokenVerificationError`], unified by
//! [`VerifyError`] and collapsed into [`Unauthorized`] at the boundary.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for realm-verify
pub type Result<T> = std::result::Result<T, Error>;

/// Process-level errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Key discovery
// ─────────────────────────────────────────────────────────────────────────────

/// One failed probe during key-set resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeFailure {
    /// URL that was probed.
    pub url: String,
    /// Why the probe did not yield a key set.
    pub reason: String,
}

/// No candidate endpoint yielded a usable key set.
#[derive(Error, Debug, Clone)]
#[error("no endpoint yielded a usable key set ({} probes failed)", attempts.len())]
pub struct KeyDiscoveryError {
    /// Every probe that was tried, in order.
    pub attempts: Vec<ProbeFailure>,
}

/// The resolved key set could not supply a key for the token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeySelectionError {
    /// The key set contained no signing keys.
    #[error("resolved key set is empty")]
    EmptyKeySet,

    /// No key matched the token's `kid` and first-key fallback is disabled.
    #[error("no key matches kid '{0}' and fallback is disabled")]
    UnknownKeyId(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Token verification
// ─────────────────────────────────────────────────────────────────────────────

/// Machine-readable reason attached to a [`TokenVerificationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Token is not three base64url segments of JSON.
    MalformedToken,
    /// Signature did not verify, or the algorithm or key was unacceptable.
    SignatureInvalid,
    /// `aud` does not contain the expected audience.
    AudienceMismatch,
    /// `iss` does not match the expected issuer.
    IssuerMismatch,
    /// `exp` is in the past.
    Expired,
    /// `sub` is absent or empty.
    MissingSubject,
    /// `iss` is absent or empty.
    MissingIssuer,
}

impl Reason {
    /// Stable snake_case identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedToken => "malformed_token",
            Self::SignatureInvalid => "signature_invalid",
            Self::AudienceMismatch => "audience_mismatch",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::Expired => "expired",
            Self::MissingSubject => "missing_subject",
            Self::MissingIssuer => "missing_issuer",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token failed decoding or one of the claim/signature checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}: {detail}")]
pub struct TokenVerificationError {
    /// Which check failed.
    pub reason: Reason,
    /// Human-readable detail for server-side logs.
    pub detail: String,
}

impl TokenVerificationError {
    /// Create an error with a reason and detail message.
    pub fn new(reason: Reason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    /// Shorthand for [`Reason::MalformedToken`].
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(Reason::MalformedToken, detail)
    }
}

/// Any failure of the strict verification path.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Key set could not be resolved.
    #[error(transparent)]
    KeyDiscovery(#[from] KeyDiscoveryError),

    /// Key set resolved but no key could be chosen.
    #[error(transparent)]
    KeySelection(#[from] KeySelectionError),

    /// Token rejected.
    #[error(transparent)]
    Token(#[from] TokenVerificationError),
}

impl VerifyError {
    /// The token-level reason, if this is a [`TokenVerificationError`].
    #[must_use]
    pub fn reason(&self) -> Option<Reason> {
        match self {
            Self::Token(e) => Some(e.reason),
            _ => None,
        }
    }

    /// Stable code for the boundary outcome.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::KeyDiscovery(_) => "key_discovery_failed",
            Self::KeySelection(_) => "key_selection_failed",
            Self::Token(e) => e.reason.as_str(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Boundary outcome
// ─────────────────────────────────────────────────────────────────────────────

/// The single user-visible failure of a verification call.
///
/// `reason` is safe to return to the caller; the full error chain is only
/// logged server-side.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("unauthorized ({code}): {reason}")]
pub struct Unauthorized {
    /// Stable machine-readable code (`expired`, `key_discovery_failed`, ...).
    pub code: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

impl Unauthorized {
    /// Outcome for failures that are not part of the verification taxonomy.
    #[must_use]
    pub fn internal() -> Self {
        Self {
            code: "internal_error",
            reason: "token could not be verified".to_string(),
        }
    }

    /// Value for a `WWW-Authenticate` response header (RFC 6750).
    #[must_use]
    pub fn challenge(&self) -> String {
        let description = self.reason.replace('"', "'");
        format!(r#"Bearer error="invalid_token", error_description="{description}""#)
    }
}

impl From<VerifyError> for Unauthorized {
    fn from(err: VerifyError) -> Self {
        let reason = match &err {
            VerifyError::KeyDiscovery(_) => "signing keys are unavailable".to_string(),
            VerifyError::KeySelection(e) => e.to_string(),
            VerifyError::Token(e) => e.to_string(),
        };
        Self {
            code: err.code(),
            reason,
        }
    }
}

impl From<TokenVerificationError> for Unauthorized {
    fn from(err: TokenVerificationError) -> Self {
        VerifyError::Token(err).into()
    }
}
