//! Reduced-trust verification: claim checks without a signature.
//!
//! Meant for degraded or diagnostic use when keys cannot be resolved. The
//! result is an [`UnsignedClaims`], which cannot stand in for a
//! [`SignedClaims`](super::SignedClaims).

use tracing::warn;

use super::{UnsignedClaims, unix_now};
use crate::config::Config;
use crate::error::{Reason, TokenVerificationError};
use crate::token::UnverifiedToken;

/// Check `sub`, `iss` and `exp` of `token` at the current time.
///
/// # Errors
///
/// Returns [`TokenVerificationError`] with `malformed_token`,
/// `missing_subject`, `missing_issuer` or `expired`.
pub fn verify_basic(config: &Config, token: &str) -> Result<UnsignedClaims, TokenVerificationError> {
    verify_basic_at(config, token, unix_now())
}

/// [`verify_basic`] against an explicit clock (seconds since epoch).
///
/// An issuer outside the configured allow-list is accepted with a warning
/// and reported through [`UnsignedClaims::issuer_listed`]. A token without
/// `exp` is accepted.
///
/// # Errors
///
/// See [`verify_basic`].
pub fn verify_basic_at(
    config: &Config,
    token: &str,
    now: u64,
) -> Result<UnsignedClaims, TokenVerificationError> {
    let claims = UnverifiedToken::parse(token)?.into_claims();

    if claims.subject().is_none() {
        return Err(TokenVerificationError::new(
            Reason::MissingSubject,
            "token has no sub claim",
        ));
    }

    let issuer = claims
        .issuer()
        .ok_or_else(|| TokenVerificationError::new(Reason::MissingIssuer, "token has no iss claim"))?;

    let issuer_listed = config.provider.is_listed_issuer(issuer);
    if !issuer_listed {
        warn!(
            issuer = %issuer,
            valid_issuers = ?config.provider.valid_issuers(),
            "Issuer not in allow-list, accepting with reduced trust"
        );
    }

    if let Some(exp) = claims.expires_at()
        && now > exp.saturating_add(config.verification.leeway_secs)
    {
        return Err(TokenVerificationError::new(
            Reason::Expired,
            format!("token expired at {exp}, now {now}"),
        ));
    }

    Ok(UnsignedClaims::new(claims, issuer_listed))
}
