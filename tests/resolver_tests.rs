//! Key set resolution against fake providers
//!
//! Covers the two-pass fallback: discovery on both path conventions across
//! every endpoint, then the realm descriptor's bare PEM key.

mod common;

use std::time::{Duration, Instant};

use common::{Discovery, FakeProvider, Hits, KEY_ID, REALM, RealmInfo, STALL, Surface, UNREACHABLE};
use pretty_assertions::assert_eq;
use realm_verify::keys::{KeySetResolver, KeySetSource};

/// Discovery 404 at the first endpoint, valid at the second: keys come from
/// the second and the realm descriptor pass never runs.
#[tokio::test]
async fn test_discovery_falls_through_to_second_endpoint() {
    let first = FakeProvider::start(Surface::realm_info()).await;
    let second = FakeProvider::start(Surface::discovery(Discovery::Modern)).await;
    let config = common::config(&[&first.base_url, &second.base_url]);

    let key_set = KeySetResolver::new(&config).unwrap().resolve().await.unwrap();

    assert_eq!(key_set.key_ids(), vec![KEY_ID]);
    assert_eq!(Hits::get(&first.hits.modern_discovery), 1);
    assert_eq!(Hits::get(&first.hits.legacy_discovery), 1);
    assert_eq!(Hits::get(&second.hits.jwks), 1);
    // First endpoint serves a realm descriptor, but discovery won first
    assert_eq!(Hits::get(&first.hits.realm_info), 0);
    assert_eq!(Hits::get(&second.hits.realm_info), 0);
}

/// No discovery anywhere; the second endpoint's realm descriptor supplies a
/// single synthesized key named after the realm.
#[tokio::test]
async fn test_realm_descriptor_fallback() {
    let first = FakeProvider::start(Surface::NOTHING).await;
    let second = FakeProvider::start(Surface::realm_info()).await;
    let config = common::config(&[&first.base_url, &second.base_url]);

    let key_set = KeySetResolver::new(&config).unwrap().resolve().await.unwrap();

    assert_eq!(key_set.len(), 1);
    let key = &key_set.keys()[0];
    assert_eq!(key.algorithm, "RS256");
    assert_eq!(key.key_id, REALM);
    assert_eq!(key.exponent, "AQAB");
    assert_eq!(Hits::get(&first.hits.realm_info), 1);
    assert_eq!(Hits::get(&second.hits.modern_discovery), 1);
    assert_eq!(Hits::get(&second.hits.legacy_discovery), 1);
}

/// A descriptor without `realm` yields a key named `default` with RS256.
#[tokio::test]
async fn test_realm_descriptor_without_realm_name() {
    let provider = FakeProvider::start(Surface::with_realm_info(RealmInfo::Custom {
        realm: None,
        algorithm: None,
    }))
    .await;
    let config = common::config(&[&provider.base_url]);

    let key_set = KeySetResolver::new(&config).unwrap().resolve().await.unwrap();

    assert_eq!(key_set.key_ids(), vec!["default"]);
    assert_eq!(key_set.keys()[0].algorithm, "RS256");
}

/// An explicit `algorithm` in the descriptor is carried onto the key.
#[tokio::test]
async fn test_realm_descriptor_algorithm_is_kept() {
    let provider = FakeProvider::start(Surface::with_realm_info(RealmInfo::Custom {
        realm: Some(REALM),
        algorithm: Some("RS512"),
    }))
    .await;
    let config = common::config(&[&provider.base_url]);

    let key_set = KeySetResolver::new(&config).unwrap().resolve().await.unwrap();

    assert_eq!(key_set.key_ids(), vec![REALM]);
    assert_eq!(key_set.keys()[0].algorithm, "RS512");
}

/// A 200 descriptor without `public_key` does not end the search.
#[tokio::test]
async fn test_realm_descriptor_without_public_key_is_skipped() {
    let keyless = FakeProvider::start(Surface::with_realm_info(RealmInfo::NoPublicKey)).await;
    let good = FakeProvider::start(Surface::realm_info()).await;
    let config = common::config(&[&keyless.base_url, &good.base_url]);

    let key_set = KeySetResolver::new(&config).unwrap().resolve().await.unwrap();

    assert_eq!(key_set.key_ids(), vec![REALM]);
    assert_eq!(Hits::get(&keyless.hits.realm_info), 1);
    assert_eq!(Hits::get(&good.hits.realm_info), 1);
}

/// A hanging endpoint costs one timeout per probe, then the next endpoint
/// is tried.
#[tokio::test]
async fn test_stalled_endpoint_is_bounded_by_timeout() {
    let stalled = FakeProvider::start(Surface::discovery(Discovery::Stall)).await;
    let good = FakeProvider::start(Surface::discovery(Discovery::Modern)).await;
    let mut config = common::config(&[&stalled.base_url, &good.base_url]);
    config.discovery.timeout_secs = 1;

    let started = Instant::now();
    let key_set = KeySetResolver::new(&config).unwrap().resolve().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(key_set.key_ids(), vec![KEY_ID]);
    assert_eq!(Hits::get(&stalled.hits.modern_discovery), 1);
    assert_eq!(Hits::get(&stalled.hits.legacy_discovery), 1);
    assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(10), "elapsed {elapsed:?}");
    assert!(elapsed < STALL);
}

/// Keycloak 16 and older only serve discovery under `/auth`.
#[tokio::test]
async fn test_legacy_discovery_path() {
    let provider = FakeProvider::start(Surface::discovery(Discovery::Legacy)).await;
    let config = common::config(&[&provider.base_url]);

    let key_set = KeySetResolver::new(&config).unwrap().resolve().await.unwrap();

    assert_eq!(key_set.key_ids(), vec![KEY_ID]);
    assert_eq!(Hits::get(&provider.hits.modern_discovery), 1);
    assert_eq!(Hits::get(&provider.hits.legacy_discovery), 1);
}

/// A discovery document without `jwks_uri` counts as a failed probe.
#[tokio::test]
async fn test_discovery_document_without_jwks_uri_is_skipped() {
    let broken = FakeProvider::start(Surface::discovery(Discovery::MissingJwksUri)).await;
    let good = FakeProvider::start(Surface::discovery(Discovery::Modern)).await;
    let config = common::config(&[&broken.base_url, &good.base_url]);

    let key_set = KeySetResolver::new(&config).unwrap().resolve().await.unwrap();

    assert_eq!(key_set.key_ids(), vec![KEY_ID]);
    assert_eq!(Hits::get(&broken.hits.jwks), 0);
    assert_eq!(Hits::get(&good.hits.jwks), 1);
}

/// An endpoint that refuses connections does not stop the search.
#[tokio::test]
async fn test_unreachable_endpoint_is_skipped() {
    let provider = FakeProvider::start(Surface::discovery(Discovery::Modern)).await;
    let config = common::config(&[UNREACHABLE, &provider.base_url]);

    let key_set = KeySetResolver::new(&config).unwrap().resolve().await.unwrap();

    assert_eq!(key_set.key_ids(), vec![KEY_ID]);
}

/// Both passes exhausted: every probe is listed, in order, with its reason.
#[tokio::test]
async fn test_all_probes_failing_reports_every_attempt() {
    let first = FakeProvider::start(Surface::NOTHING).await;
    let second = FakeProvider::start(Surface::NOTHING).await;
    let config = common::config(&[&first.base_url, &second.base_url]);

    let err = KeySetResolver::new(&config).unwrap().resolve().await.unwrap_err();

    let urls: Vec<String> = err.attempts.iter().map(|a| a.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/realms/{REALM}/.well-known/openid_configuration", first.base_url),
            format!("{}/auth/realms/{REALM}/.well-known/openid_configuration", first.base_url),
            format!("{}/realms/{REALM}/.well-known/openid_configuration", second.base_url),
            format!("{}/auth/realms/{REALM}/.well-known/openid_configuration", second.base_url),
            format!("{}/realms/{REALM}", first.base_url),
            format!("{}/realms/{REALM}", second.base_url),
        ]
    );
    assert!(err.attempts.iter().all(|a| a.reason == "HTTP 404 Not Found"));
}

/// Every resolution probes again from the first endpoint.
#[tokio::test]
async fn test_resolution_is_not_cached() {
    let provider = FakeProvider::start(Surface::discovery(Discovery::Modern)).await;
    let config = common::config(&[&provider.base_url]);
    let resolver = KeySetResolver::new(&config).unwrap();

    resolver.resolve_key_set().await.unwrap();
    resolver.resolve_key_set().await.unwrap();

    assert_eq!(Hits::get(&provider.hits.modern_discovery), 2);
    assert_eq!(Hits::get(&provider.hits.jwks), 2);
}
