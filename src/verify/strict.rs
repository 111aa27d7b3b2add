//! Full verification: RS256 signature plus audience, issuer and expiry.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tracing::debug;

use super::SignedClaims;
use crate::claims::Claims;
use crate::config::Config;
use crate::error::{Reason, TokenVerificationError, VerifyError};
use crate::keys::{KeySetSource, SigningKey, select_key_with};
use crate::token::UnverifiedToken;

/// Verify `token` against a key set resolved from `keys`.
///
/// The unverified header and claims only route the call: `kid` picks the
/// key and the claimed `iss` becomes the issuer the signed token must carry.
///
/// # Errors
///
/// Returns [`VerifyError::KeyDiscovery`] or [`VerifyError::KeySelection`]
/// when no key can be obtained, and [`VerifyError::Token`] when the token
/// itself is rejected.
pub async fn verify_strict(
    config: &Config,
    keys: &dyn KeySetSource,
    token: &str,
) -> Result<SignedClaims, VerifyError> {
    let token = token.trim();
    let unverified = UnverifiedToken::parse(token)?;

    let claimed_issuer = unverified
        .issuer()
        .ok_or_else(|| TokenVerificationError::new(Reason::MissingIssuer, "token has no iss claim"))?;

    if config.verification.enforce_issuer_allow_list
        && !config.provider.is_listed_issuer(claimed_issuer)
    {
        return Err(TokenVerificationError::new(
            Reason::IssuerMismatch,
            format!("issuer '{claimed_issuer}' is not served by any configured endpoint"),
        )
        .into());
    }

    let key_set = keys.resolve_key_set().await?;
    let key = select_key_with(&key_set, unverified.key_id(), config.verification.key_fallback)?;

    let claims = verify_signature(config, token, key, claimed_issuer)?;
    debug!(kid = %key.key_id, sub = ?claims.subject(), "Token signature verified");

    Ok(SignedClaims::new(claims, key.key_id.clone()))
}

/// Check signature and registered claims of `token` with one key.
pub(crate) fn verify_signature(
    config: &Config,
    token: &str,
    key: &SigningKey,
    expected_issuer: &str,
) -> Result<Claims, TokenVerificationError> {
    let decoding_key = DecodingKey::from_rsa_components(&key.modulus, &key.exponent).map_err(|e| {
        TokenVerificationError::new(
            Reason::SignatureInvalid,
            format!("key '{}' is not a usable RSA key: {e}", key.key_id),
        )
    })?;

    let data = jsonwebtoken::decode::<serde_json::Value>(
        token,
        &decoding_key,
        &build_validation(config, expected_issuer),
    )
    .map_err(map_jwt_error)?;

    Claims::from_value(data.claims)
        .map_err(|e| TokenVerificationError::malformed(format!("invalid claims: {e}")))
}

fn build_validation(config: &Config, expected_issuer: &str) -> Validation {
    let mut v = Validation::new(Algorithm::RS256);
    v.leeway = config.verification.leeway_secs;
    v.set_audience(&[&config.verification.audience]);
    v.set_issuer(&[expected_issuer]);
    v.set_required_spec_claims(&["exp", "aud", "iss"]);
    v
}

fn map_jwt_error(err: JwtError) -> TokenVerificationError {
    let reason = match err.kind() {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::MissingAlgorithm
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidKeyFormat => Reason::SignatureInvalid,
        ErrorKind::ExpiredSignature => Reason::Expired,
        ErrorKind::InvalidAudience => Reason::AudienceMismatch,
        ErrorKind::InvalidIssuer => Reason::IssuerMismatch,
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => Reason::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => Reason::MissingIssuer,
        _ => Reason::MalformedToken,
    };
    TokenVerificationError::new(reason, err.to_string())
}
