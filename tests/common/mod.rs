//! Fake identity provider and token helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Form, Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use realm_verify::config::{Config, ProviderConfig};
use realm_verify::keys::{KeySet, signing_key_from_pem};

pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
pub const ROGUE_KEY_PEM: &str = include_str!("../fixtures/rogue_key.pem");
pub const PUBLIC_KEY_BODY: &str = include_str!("../fixtures/signing_key.pub.b64");

pub const REALM: &str = "sam-test";
pub const KEY_ID: &str = "kc-signing-1";

/// Which discovery document the fake serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// 404 on both conventions
    Absent,
    /// Only on `/realms/{realm}` (Keycloak 17+)
    Modern,
    /// Only on `/auth/realms/{realm}` (Keycloak 16 and older)
    Legacy,
    /// 200 on the modern path, but without `jwks_uri`
    MissingJwksUri,
    /// Both conventions hang for [`STALL`] before answering 404
    Stall,
}

/// What `/realms/{realm}` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealmInfo {
    /// 404
    Absent,
    /// Keycloak's descriptor: `realm`, `public_key` and service URLs
    Standard,
    /// `public_key` plus only the listed optional fields
    Custom {
        realm: Option<&'static str>,
        algorithm: Option<&'static str>,
    },
    /// 200 without `public_key`
    NoPublicKey,
}

/// How long a stalled route sleeps.
pub const STALL: Duration = Duration::from_secs(30);

/// What the fake provider exposes.
#[derive(Debug, Clone, Copy)]
pub struct Surface {
    pub discovery: Discovery,
    pub realm_info: RealmInfo,
}

impl Surface {
    pub const NOTHING: Self = Self {
        discovery: Discovery::Absent,
        realm_info: RealmInfo::Absent,
    };

    pub fn discovery(discovery: Discovery) -> Self {
        Self {
            discovery,
            realm_info: RealmInfo::Absent,
        }
    }

    pub fn realm_info() -> Self {
        Self::with_realm_info(RealmInfo::Standard)
    }

    pub fn with_realm_info(realm_info: RealmInfo) -> Self {
        Self {
            discovery: Discovery::Absent,
            realm_info,
        }
    }
}

/// Request counters per route.
#[derive(Debug, Default)]
pub struct Hits {
    pub modern_discovery: AtomicUsize,
    pub legacy_discovery: AtomicUsize,
    pub jwks: AtomicUsize,
    pub realm_info: AtomicUsize,
    pub token: AtomicUsize,
}

impl Hits {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// A running fake provider on an ephemeral port.
pub struct FakeProvider {
    pub base_url: String,
    pub hits: Arc<Hits>,
}

impl FakeProvider {
    pub async fn start(surface: Surface) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(Hits::default());

        let app = router(&base_url, surface, &hits);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, hits }
    }
}

fn respond(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn not_found() -> Response {
    respond(StatusCode::NOT_FOUND, json!({"error": "Realm does not exist"}))
}

async fn stalled() -> Response {
    tokio::time::sleep(STALL).await;
    not_found()
}

fn router(base_url: &str, surface: Surface, hits: &Arc<Hits>) -> Router {
    let realm_url = format!("{base_url}/realms/{REALM}");
    let document = json!({
        "issuer": realm_url,
        "jwks_uri": format!("{realm_url}/protocol/openid-connect/certs"),
        "token_endpoint": format!("{realm_url}/protocol/openid-connect/token"),
    });
    let incomplete = json!({"issuer": realm_url});
    let jwks = serde_json::to_value(KeySet::new(vec![
        signing_key_from_pem(PUBLIC_KEY_BODY, KEY_ID, "RS256").unwrap(),
    ]))
    .unwrap();
    let realm_info = json!({
        "realm": REALM,
        "public_key": PUBLIC_KEY_BODY,
        "token-service": format!("{realm_url}/protocol/openid-connect"),
        "account-service": format!("{realm_url}/account"),
        "tokens-not-before": 0
    });

    let modern = {
        let hits = hits.clone();
        let (document, incomplete) = (document.clone(), incomplete);
        move || async move {
            hits.modern_discovery.fetch_add(1, Ordering::SeqCst);
            match surface.discovery {
                Discovery::Modern => respond(StatusCode::OK, document),
                Discovery::MissingJwksUri => respond(StatusCode::OK, incomplete),
                Discovery::Stall => stalled().await,
                _ => not_found(),
            }
        }
    };

    let legacy = {
        let hits = hits.clone();
        move || async move {
            hits.legacy_discovery.fetch_add(1, Ordering::SeqCst);
            match surface.discovery {
                Discovery::Legacy => respond(StatusCode::OK, document),
                Discovery::Stall => stalled().await,
                _ => not_found(),
            }
        }
    };

    let certs = {
        let hits = hits.clone();
        move || async move {
            hits.jwks.fetch_add(1, Ordering::SeqCst);
            respond(StatusCode::OK, jwks)
        }
    };

    let realm = {
        let hits = hits.clone();
        move || async move {
            hits.realm_info.fetch_add(1, Ordering::SeqCst);
            match surface.realm_info {
                RealmInfo::Absent => not_found(),
                RealmInfo::Standard => respond(StatusCode::OK, realm_info),
                RealmInfo::Custom { realm, algorithm } => {
                    let mut body = json!({"public_key": PUBLIC_KEY_BODY});
                    if let Some(realm) = realm {
                        body["realm"] = json!(realm);
                    }
                    if let Some(algorithm) = algorithm {
                        body["algorithm"] = json!(algorithm);
                    }
                    respond(StatusCode::OK, body)
                }
                RealmInfo::NoPublicKey => respond(
                    StatusCode::OK,
                    json!({"realm": REALM, "tokens-not-before": 0}),
                ),
            }
        }
    };

    let token = {
        let hits = hits.clone();
        move |Form(params): Form<HashMap<String, String>>| async move {
            hits.token.fetch_add(1, Ordering::SeqCst);
            let grant = params.get("grant_type").map(String::as_str);
            let refresh = params.get("refresh_token").map(String::as_str);
            match (grant, refresh) {
                (Some("refresh_token"), Some("good-refresh-token")) => respond(
                    StatusCode::OK,
                    json!({
                        "access_token": "new-access-token",
                        "refresh_token": "rotated-refresh-token",
                        "token_type": "Bearer",
                        "expires_in": 300,
                        "client_id": params.get("client_id"),
                    }),
                ),
                _ => respond(
                    StatusCode::BAD_REQUEST,
                    json!({"error": "invalid_grant", "error_description": "Invalid refresh token"}),
                ),
            }
        }
    };

    Router::new()
        .route(&format!("/realms/{REALM}/.well-known/openid_configuration"), get(modern))
        .route(&format!("/auth/realms/{REALM}/.well-known/openid_configuration"), get(legacy))
        .route(&format!("/realms/{REALM}/protocol/openid-connect/certs"), get(certs))
        .route(&format!("/realms/{REALM}"), get(realm))
        .route(&format!("/realms/{REALM}/protocol/openid-connect/token"), post(token))
}

/// Config probing `endpoints` in order for [`REALM`].
pub fn config(endpoints: &[&str]) -> Config {
    Config {
        provider: ProviderConfig {
            endpoints: endpoints.iter().map(ToString::to_string).collect(),
            realm: REALM.to_string(),
            client_id: "myclient".to_string(),
        },
        ..Config::default()
    }
}

/// Endpoint nothing listens on.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

pub fn now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap()
}

/// Access-token payload for `issuer`, valid for five minutes.
pub fn claims(issuer: &str) -> Value {
    let now = now();
    json!({
        "exp": now + 300,
        "iat": now,
        "iss": issuer,
        "aud": "account",
        "sub": "f3a1c2d4-0000-4000-8000-000000000001",
        "typ": "Bearer",
        "azp": "myclient",
        "preferred_username": "sam",
        "email": "sam@example.com",
        "realm_access": {"roles": ["offline_access", "realm-admin"]},
        "resource_access": {"myclient": {"roles": ["reader"]}}
    })
}

/// RS256-sign `claims` with `private_pem`.
pub fn mint(private_pem: &str, kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(ToString::to_string);
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}
