//! PEM → [`SigningKey`] conversion for realm-info responses.
//!
//! Development-mode realms publish only `public_key`: the base64 body of a
//! `SubjectPublicKeyInfo` with the PEM armor stripped. This module accepts
//! either that bare body or a full PEM block and produces a JWK-shaped
//! [`SigningKey`] with no network involved.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;
use x509_parser::x509::SubjectPublicKeyInfo;

use super::SigningKey;

/// Failure converting a PEM public key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PemConversionError {
    /// Body is not valid standard base64.
    #[error("public key is not valid base64: {0}")]
    InvalidBase64(String),

    /// DER does not parse as a `SubjectPublicKeyInfo`.
    #[error("public key is not a valid SubjectPublicKeyInfo: {0}")]
    InvalidDer(String),

    /// Key parsed but is not RSA.
    #[error("public key is not RSA")]
    NotRsa,
}

/// Convert a PEM (or bare base64 body) RSA public key into a [`SigningKey`].
///
/// Leading zero octets are stripped from the modulus and exponent so the
/// encoding matches what the provider would publish in its JWKS.
///
/// # Errors
///
/// Returns [`PemConversionError`] if the input is not base64, not a
/// `SubjectPublicKeyInfo`, or not an RSA key.
pub fn signing_key_from_pem(
    pem: &str,
    key_id: &str,
    algorithm: &str,
) -> Result<SigningKey, PemConversionError> {
    let body: String = pem
        .lines()
        .filter(|line| !line.trim_start().starts_with("-----"))
        .flat_map(str::split_whitespace)
        .collect();

    let der = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| PemConversionError::InvalidBase64(e.to_string()))?;

    let (_, spki) = SubjectPublicKeyInfo::from_der(&der)
        .map_err(|e| PemConversionError::InvalidDer(e.to_string()))?;

    match spki.parsed() {
        Ok(PublicKey::RSA(rsa)) => Ok(SigningKey::from_rsa_components(
            key_id,
            algorithm,
            strip_leading_zeros(rsa.modulus),
            strip_leading_zeros(rsa.exponent),
        )),
        Ok(_) => Err(PemConversionError::NotRsa),
        Err(e) => Err(PemConversionError::InvalidDer(e.to_string())),
    }
}

/// DER integers carry a sign octet; JWK integers do not.
fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len().saturating_sub(1));
    &bytes[first..]
}
