//! Shared fixtures for unit tests: RSA key material and token minting.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use crate::config::{Config, ProviderConfig};
use crate::keys::{KeySet, signing_key_from_pem};

/// PKCS#1 private key whose public half is [`PUBLIC_KEY_PEM`].
pub const SIGNING_KEY_PEM: &str = include_str!("../tests/fixtures/signing_key.pem");
/// Unrelated private key, never present in any key set.
pub const ROGUE_KEY_PEM: &str = include_str!("../tests/fixtures/rogue_key.pem");
/// SubjectPublicKeyInfo PEM block for [`SIGNING_KEY_PEM`].
pub const PUBLIC_KEY_PEM: &str = include_str!("../tests/fixtures/signing_key.pub.pem");
/// Same key as Keycloak serves it: the base64 body without armor.
pub const PUBLIC_KEY_BODY: &str = include_str!("../tests/fixtures/signing_key.pub.b64");

pub const REALM: &str = "sam-test";
pub const ISSUER: &str = "http://localhost:8080/realms/sam-test";
pub const KEY_ID: &str = "kc-signing-1";

pub fn now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap()
}

pub fn config() -> Config {
    Config {
        provider: ProviderConfig {
            endpoints: vec![
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:8080".to_string(),
            ],
            realm: REALM.to_string(),
            client_id: "myclient".to_string(),
        },
        ..Config::default()
    }
}

/// Key set holding the public half of [`SIGNING_KEY_PEM`] under `kid`.
pub fn key_set(kid: &str) -> KeySet {
    KeySet::new(vec![signing_key_from_pem(PUBLIC_KEY_BODY, kid, "RS256").unwrap()])
}

/// A realistic Keycloak access-token payload valid for five minutes.
pub fn claims() -> Value {
    let now = now();
    json!({
        "exp": now + 300,
        "iat": now,
        "jti": "0b6c1a1e-5d3f-4d8e-9a0a-1f2e3d4c5b6a",
        "iss": ISSUER,
        "aud": "account",
        "sub": "f3a1c2d4-0000-4000-8000-000000000001",
        "typ": "Bearer",
        "azp": "myclient",
        "session_state": "c0ffee",
        "realm_access": {"roles": ["offline_access", "realm-admin"]},
        "resource_access": {"account": {"roles": ["manage-account", "view-profile"]}},
        "scope": "openid email profile",
        "email_verified": true,
        "name": "Sam Tester",
        "preferred_username": "sam",
        "given_name": "Sam",
        "family_name": "Tester",
        "email": "sam@example.com"
    })
}

/// RS256-sign `claims` with the PEM private key.
pub fn mint_with(private_pem: &str, kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(ToString::to_string);
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

/// RS256-sign `claims` with [`SIGNING_KEY_PEM`] under [`KEY_ID`].
pub fn mint(claims: &Value) -> String {
    mint_with(SIGNING_KEY_PEM, Some(KEY_ID), claims)
}

/// Assemble a compact token from arbitrary JSON without signing it.
pub fn unsigned(header: &Value, payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap());
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}
