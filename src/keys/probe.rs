//! Probe plan: the ordered list of URLs key resolution may try.
//!
//! The plan is plain data. Building it does no I/O.

use serde::Serialize;

use crate::config::Config;

/// Path convention for the realm prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryPath {
    /// `/realms/{realm}` (Keycloak 17+)
    Modern,
    /// `/auth/realms/{realm}` (Keycloak 16 and older)
    Legacy,
}

impl DiscoveryPath {
    /// Conventions in probing order.
    pub const ALL: [Self; 2] = [Self::Modern, Self::Legacy];

    /// Realm path under this convention.
    #[must_use]
    pub fn realm_path(self, realm: &str) -> String {
        match self {
            Self::Modern => format!("/realms/{realm}"),
            Self::Legacy => format!("/auth/realms/{realm}"),
        }
    }
}

/// What a probe expects to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum ProbeKind {
    /// OpenID discovery document advertising `jwks_uri`
    Discovery(DiscoveryPath),
    /// Realm descriptor carrying a bare `public_key`
    RealmInfo,
}

/// One URL to try.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Probe {
    /// Base address this probe belongs to
    pub endpoint: String,
    /// What the probe looks for
    pub kind: ProbeKind,
    /// Fully-formed URL
    pub url: String,
}

/// Discovery probes followed by realm-info probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbePlan {
    discovery: Vec<Probe>,
    realm_info: Vec<Probe>,
}

impl ProbePlan {
    /// Build the plan for the configured endpoints and realm.
    ///
    /// Discovery probes are endpoint-major: every convention of endpoint 1,
    /// then every convention of endpoint 2, and so on.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let realm = &config.provider.realm;
        let document = &config.discovery.well_known_document;

        let discovery = config
            .provider
            .base_urls()
            .flat_map(|endpoint| {
                DiscoveryPath::ALL.into_iter().map(move |path| Probe {
                    endpoint: endpoint.to_string(),
                    kind: ProbeKind::Discovery(path),
                    url: format!("{endpoint}{}/.well-known/{document}", path.realm_path(realm)),
                })
            })
            .collect();

        let realm_info = config
            .provider
            .base_urls()
            .map(|endpoint| Probe {
                endpoint: endpoint.to_string(),
                kind: ProbeKind::RealmInfo,
                url: format!("{endpoint}{}", DiscoveryPath::Modern.realm_path(realm)),
            })
            .collect();

        Self {
            discovery,
            realm_info,
        }
    }

    /// Discovery probes, in order.
    #[must_use]
    pub fn discovery(&self) -> &[Probe] {
        &self.discovery
    }

    /// Realm-info probes, in order.
    #[must_use]
    pub fn realm_info(&self) -> &[Probe] {
        &self.realm_info
    }

    /// Every probe in the order resolution would try it.
    pub fn iter(&self) -> impl Iterator<Item = &Probe> {
        self.discovery.iter().chain(&self.realm_info)
    }
}
