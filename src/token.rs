//! Unverified compact-token parsing.
//!
//! Nothing here checks a signature. The decoded header and claims are used
//! only to route verification (`kid`, claimed `iss`) and for diagnostics.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::claims::Claims;
use crate::error::TokenVerificationError;

/// JOSE header fields used for routing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signature algorithm claimed by the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Key ID hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Media type (usually `JWT`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// A compact token split and decoded without any verification.
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    header: TokenHeader,
    claims: Claims,
    raw_header: Value,
    raw_payload: Value,
}

impl UnverifiedToken {
    /// Split `token` into header, payload and signature and decode the
    /// first two.
    ///
    /// # Errors
    ///
    /// Returns a [`Reason::MalformedToken`](crate::error::Reason::MalformedToken)
    /// error if the token is not three segments, a segment is not base64url,
    /// or the header or payload is not a JSON object.
    pub fn parse(token: &str) -> Result<Self, TokenVerificationError> {
        let mut segments = token.trim().split('.');
        let (Some(header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenVerificationError::malformed(
                "token must have exactly three dot-separated segments",
            ));
        };

        let raw_header = decode_segment(header, "header")?;
        let raw_payload = decode_segment(payload, "payload")?;

        let header = serde_json::from_value(raw_header.clone())
            .map_err(|e| TokenVerificationError::malformed(format!("invalid header: {e}")))?;
        let claims = Claims::from_value(raw_payload.clone())
            .map_err(|e| TokenVerificationError::malformed(format!("invalid claims: {e}")))?;

        Ok(Self {
            header,
            claims,
            raw_header,
            raw_payload,
        })
    }

    /// Decoded header.
    #[must_use]
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// Decoded, unverified claims.
    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Consume the token, keeping the claims.
    #[must_use]
    pub fn into_claims(self) -> Claims {
        self.claims
    }

    /// `kid` header hint.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Claimed `iss`, not yet trusted.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.claims.issuer()
    }

    /// Header exactly as decoded.
    #[must_use]
    pub fn raw_header(&self) -> &Value {
        &self.raw_header
    }

    /// Payload exactly as decoded.
    #[must_use]
    pub fn raw_payload(&self) -> &Value {
        &self.raw_payload
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Value, TokenVerificationError> {
    // Some issuers pad segments; RFC 7515 says they must not.
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| TokenVerificationError::malformed(format!("{name} is not base64url: {e}")))?;

    match serde_json::from_slice(&bytes) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(TokenVerificationError::malformed(format!(
            "{name} is not a JSON object"
        ))),
        Err(e) => Err(TokenVerificationError::malformed(format!(
            "{name} is not JSON: {e}"
        ))),
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
