//! Provider exploration and unverified token inspection.
//!
//! Both operations are for operators working out why verification fails.
//! Neither trusts what it reports.

use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::claims::{Identity, RoleSet, TokenMetadata};
use crate::config::Config;
use crate::error::TokenVerificationError;
use crate::keys::DiscoveryPath;
use crate::token::UnverifiedToken;
use crate::Result;

/// Characters of a response body kept in a [`PathReport`].
pub const PREVIEW_CHARS: usize = 200;

/// Outcome of one exploratory `GET`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathOutcome {
    /// The server answered (any status).
    Response {
        /// HTTP status code
        status_code: u16,
        /// `Content-Type` header, if present
        content_type: Option<String>,
        /// Start of the body
        content_preview: String,
    },
    /// No answer.
    Error {
        /// Transport error
        error: String,
    },
}

/// One probed path on one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathReport {
    /// Path relative to the endpoint
    pub path: String,
    /// Full URL
    pub url: String,
    /// What came back
    #[serde(flatten)]
    pub outcome: PathOutcome,
}

/// Every probed path on one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointReport {
    /// Endpoint base address
    pub endpoint: String,
    /// Results in probing order
    pub paths: Vec<PathReport>,
}

/// Result of [`explore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExploreReport {
    /// Realm the realm-specific paths were built for
    pub realm: String,
    /// One report per configured endpoint, in order
    pub endpoints: Vec<EndpointReport>,
}

/// Paths probed on every endpoint.
#[must_use]
pub fn explore_paths(config: &Config) -> Vec<String> {
    let realm = &config.provider.realm;
    let document = &config.discovery.well_known_document;

    let mut paths: Vec<String> = ["/", "/realms", "/auth/realms", "/admin/realms"]
        .into_iter()
        .map(str::to_string)
        .collect();
    paths.extend(DiscoveryPath::ALL.iter().map(|p| p.realm_path(realm)));
    paths.extend(
        DiscoveryPath::ALL
            .iter()
            .map(|p| format!("{}/.well-known/{document}", p.realm_path(realm))),
    );
    paths
}

/// Probe every endpoint with the diagnostic timeout.
///
/// # Errors
///
/// Fails only if the HTTP client cannot be built; unreachable paths are
/// reported, not returned as errors.
pub async fn explore(config: &Config) -> Result<ExploreReport> {
    let http = Client::builder()
        .timeout(config.discovery.diagnostic_timeout())
        .build()?;
    Ok(explore_with(&http, config).await)
}

/// [`explore`] with a caller-supplied client.
pub async fn explore_with(http: &Client, config: &Config) -> ExploreReport {
    let paths = explore_paths(config);

    let endpoints = join_all(config.provider.base_urls().map(|endpoint| {
        let paths = &paths;
        async move {
            let reports = join_all(paths.iter().map(|path| probe_path(http, config, endpoint, path))).await;
            EndpointReport {
                endpoint: endpoint.to_string(),
                paths: reports,
            }
        }
    }))
    .await;

    ExploreReport {
        realm: config.provider.realm.clone(),
        endpoints,
    }
}

async fn probe_path(http: &Client, config: &Config, endpoint: &str, path: &str) -> PathReport {
    let url = format!("{endpoint}{path}");
    debug!(url = %url, "Exploring");

    let outcome = match http
        .get(&url)
        .timeout(config.discovery.diagnostic_timeout())
        .send()
        .await
    {
        Ok(response) => {
            let status_code = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            match response.text().await {
                Ok(body) => PathOutcome::Response {
                    status_code,
                    content_type,
                    content_preview: preview(&body),
                },
                Err(e) => PathOutcome::Error {
                    error: e.to_string(),
                },
            }
        }
        Err(e) => PathOutcome::Error {
            error: e.to_string(),
        },
    };

    PathReport {
        path: path.to_string(),
        url,
        outcome,
    }
}

/// First [`PREVIEW_CHARS`] characters of `body`, with `...` when cut.
#[must_use]
pub fn preview(body: &str) -> String {
    match body.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

/// Provider settings echoed by [`inspect_token`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
    /// Configured endpoints
    pub urls: Vec<String>,
    /// Realm
    pub realm: String,
    /// Client ID
    pub client_id: String,
    /// Issuers accepted without warning
    pub valid_issuers: Vec<String>,
}

impl ProviderSummary {
    /// Summarize `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            urls: config.provider.endpoints.clone(),
            realm: config.provider.realm.clone(),
            client_id: config.provider.client_id.clone(),
            valid_issuers: config.provider.valid_issuers(),
        }
    }
}

/// Decoded, unverified view of a token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenReport {
    /// JOSE header
    pub header: Value,
    /// Payload
    pub payload: Value,
    /// Identity projection
    pub identity: Identity,
    /// Role projection
    pub roles: RoleSet,
    /// Metadata projection
    pub metadata: TokenMetadata,
    /// Whether `iss` is in the allow-list
    pub issuer_listed: bool,
    /// Provider configuration the token was compared with
    pub provider: ProviderSummary,
}

/// Decode `token` without verifying anything.
///
/// # Errors
///
/// Returns a `malformed_token` error if the token cannot be decoded.
pub fn inspect_token(config: &Config, token: &str) -> std::result::Result<TokenReport, TokenVerificationError> {
    let parsed = UnverifiedToken::parse(token)?;
    let claims = parsed.claims();

    Ok(TokenReport {
        header: parsed.raw_header().clone(),
        payload: parsed.raw_payload().clone(),
        identity: claims.identity(),
        roles: claims.roles(),
        metadata: claims.metadata(),
        issuer_listed: parsed
            .issuer()
            .is_some_and(|iss| config.provider.is_listed_issuer(iss)),
        provider: ProviderSummary::from_config(config),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::error::Reason;
    use crate::testutil;

    #[test]
    fn explore_paths_cover_both_conventions() {
        let paths = explore_paths(&testutil::config());

        assert_eq!(
            paths,
            vec![
                "/",
                "/realms",
                "/auth/realms",
                "/admin/realms",
                "/realms/sam-test",
                "/auth/realms/sam-test",
                "/realms/sam-test/.well-known/openid_configuration",
                "/auth/realms/sam-test/.well-known/openid_configuration",
            ]
        );
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let long = "x".repeat(250);
        let cut = preview(&long);
        assert_eq!(cut.len(), 203);
        assert!(cut.ends_with("..."));

        assert_eq!(preview("short"), "short");
        assert_eq!(preview(&"y".repeat(200)), "y".repeat(200));
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(201);
        assert_eq!(preview(&body), format!("{}...", "é".repeat(200)));
    }

    #[test]
    fn path_outcome_serializes_flat() {
        let report = PathReport {
            path: "/realms".to_string(),
            url: "http://kc/realms".to_string(),
            outcome: PathOutcome::Response {
                status_code: 404,
                content_type: Some("text/html".to_string()),
                content_preview: "Not Found".to_string(),
            },
        };

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "path": "/realms",
                "url": "http://kc/realms",
                "status_code": 404,
                "content_type": "text/html",
                "content_preview": "Not Found"
            })
        );
    }

    #[test]
    fn inspect_token_reports_header_payload_and_provider() {
        // GIVEN: a signed token from a listed issuer
        let payload = testutil::claims();
        let token = testutil::mint(&payload);

        // WHEN: inspected
        let report = inspect_token(&testutil::config(), &token).unwrap();

        // THEN: everything decodes and the provider summary is attached
        assert_eq!(report.header["kid"], testutil::KEY_ID);
        assert_eq!(report.payload, payload);
        assert_eq!(report.identity.username.as_deref(), Some("sam"));
        assert!(report.roles.is_admin());
        assert!(report.issuer_listed);
        assert_eq!(report.provider.realm, "sam-test");
        assert_eq!(
            report.provider.valid_issuers,
            vec![
                "http://localhost:8080/realms/sam-test",
                "http://127.0.0.1:8080/realms/sam-test",
            ]
        );
    }

    #[test]
    fn inspect_token_rejects_garbage() {
        let err = inspect_token(&testutil::config(), "garbage").unwrap_err();
        assert_eq!(err.reason, Reason::MalformedToken);
    }
}
