//! Audit logging for verification outcomes.
//!
//! Every event is emitted via `tracing::info!` with structured fields, making
//! the audit trail queryable by any log aggregator.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `token.accepted` | A token passed the requested trust level |
//! | `token.rejected` | A token failed verification, or verification panicked |

use serde::Serialize;

use super::{Authenticated, TrustLevel};
use crate::error::Unauthorized;

/// Structured audit event emitted for every verification outcome.
#[derive(Debug, Serialize)]
pub struct AuditEvent {
    /// Event type string (`"token.accepted"` or `"token.rejected"`).
    pub event: &'static str,
    /// Trust level that was requested.
    pub trust: TrustLevel,
    /// Subject of an accepted token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Username of an accepted token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Issuer of an accepted token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Key that verified a signed token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    /// Whether an unsigned token's issuer is in the allow-list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_listed: Option<bool>,
    /// Rejection code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    /// Human-readable rejection reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    /// Construct a `token.accepted` event.
    #[must_use]
    pub fn accepted(outcome: &Authenticated) -> Self {
        let claims = outcome.claims();
        let (key_id, issuer_listed) = match outcome {
            Authenticated::Signed(signed) => (Some(signed.key_id().to_string()), None),
            Authenticated::Unsigned(unsigned) => (None, Some(unsigned.issuer_listed())),
        };
        Self {
            event: "token.accepted",
            trust: outcome.trust_level(),
            subject: claims.subject().map(str::to_string),
            username: claims.username().map(str::to_string),
            issuer: claims.issuer().map(str::to_string),
            key_id,
            issuer_listed,
            code: None,
            reason: None,
        }
    }

    /// Construct a `token.rejected` event.
    #[must_use]
    pub fn rejected(trust: TrustLevel, outcome: &Unauthorized) -> Self {
        Self {
            event: "token.rejected",
            trust,
            subject: None,
            username: None,
            issuer: None,
            key_id: None,
            issuer_listed: None,
            code: Some(outcome.code),
            reason: Some(outcome.reason.clone()),
        }
    }
}

/// Emit an audit event via `tracing::info!` with structured fields.
///
/// ```text
/// INFO realm_verify::verify::audit audit={"event":"token.accepted","trust":"signed",...}
/// ```
pub fn emit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) => tracing::info!(audit = %json, "verification audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}
