//! Token payload model and read-only projections.
//!
//! [`Claims`] keeps the decoded payload object verbatim, so serializing a
//! `Claims` yields exactly the payload it was parsed from. Typed views read
//! from that object and never fail: an absent or wrongly typed claim becomes
//! `None` or an empty collection.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Realm roles that grant administrative access.
pub const ADMIN_ROLES: [&str; 2] = ["realm-admin", "admin"];

/// The `aud` claim: a single string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "account"`
    Single(String),
    /// `"aud": ["account", "broker"]`
    Multiple(Vec<String>),
}

impl Audience {
    /// Audience values in claim order.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(aud) => vec![aud.as_str()],
            Self::Multiple(auds) => auds.iter().map(String::as_str).collect(),
        }
    }

    /// Whether `audience` is one of the values.
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(aud) => aud == audience,
            Self::Multiple(auds) => auds.iter().any(|a| a == audience),
        }
    }
}

/// Token payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims {
    payload: Map<String, Value>,
}

/// Who the token is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// `sub`
    pub subject: Option<String>,
    /// `preferred_username`
    pub username: Option<String>,
    /// `email`
    pub email: Option<String>,
    /// `name`
    pub name: Option<String>,
    /// `given_name`
    pub given_name: Option<String>,
    /// `family_name`
    pub family_name: Option<String>,
}

/// Realm and client roles granted by the token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleSet {
    /// `realm_access.roles`
    pub realm_roles: Vec<String>,
    /// `resource_access.<client>.roles`
    pub client_roles: BTreeMap<String, Vec<String>>,
}

impl RoleSet {
    /// Roles for one client; empty when the client is absent.
    #[must_use]
    pub fn client_roles(&self, client_id: &str) -> &[String] {
        self.client_roles
            .get(client_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether the realm grants `role`.
    #[must_use]
    pub fn has_realm_role(&self, role: &str) -> bool {
        self.realm_roles.iter().any(|r| r == role)
    }

    /// Whether `client_id` grants `role`.
    #[must_use]
    pub fn has_client_role(&self, client_id: &str, role: &str) -> bool {
        self.client_roles(client_id).iter().any(|r| r == role)
    }

    /// Whether any of [`ADMIN_ROLES`] is a realm role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        ADMIN_ROLES.iter().any(|role| self.has_realm_role(role))
    }
}

/// Lifetime and provenance of the token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    /// `iat`
    pub issued_at: Option<u64>,
    /// `exp`
    pub expires_at: Option<u64>,
    /// `nbf`
    pub not_before: Option<u64>,
    /// `iss`
    pub issuer: Option<String>,
    /// `aud`, flattened
    pub audience: Vec<String>,
    /// `typ`
    pub token_type: Option<String>,
    /// `azp`
    pub authorized_party: Option<String>,
}

impl TokenMetadata {
    /// Expiry as a UTC timestamp.
    #[must_use]
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at.and_then(to_utc)
    }

    /// Issue time as a UTC timestamp.
    #[must_use]
    pub fn issued_at_utc(&self) -> Option<DateTime<Utc>> {
        self.issued_at.and_then(to_utc)
    }
}

fn to_utc(secs: u64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::try_from(secs).ok()?, 0)
}

/// NumericDate: any non-negative JSON number, fractions truncated.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn numeric_date(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| secs as u64)
    })
}

fn role_list(access: &Value) -> Vec<String> {
    access
        .get("roles")
        .and_then(Value::as_array)
        .map(|roles| roles.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

impl Claims {
    /// Parse a JSON payload.
    ///
    /// # Errors
    ///
    /// Fails if `payload` is not a JSON object.
    pub fn from_value(payload: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload)
    }

    /// Back to the JSON payload.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.payload.clone())
    }

    /// The payload object.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Raw value of one claim.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// String claim; `None` when absent or not a string.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }

    /// NumericDate claim in whole seconds; `None` when absent or not a
    /// non-negative number.
    #[must_use]
    pub fn numeric_date(&self, name: &str) -> Option<u64> {
        self.payload.get(name).and_then(numeric_date)
    }

    /// `sub`, treating an empty string as absent.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.string("sub").filter(|s| !s.is_empty())
    }

    /// `iss`, treating an empty string as absent.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.string("iss").filter(|s| !s.is_empty())
    }

    /// `preferred_username`
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.string("preferred_username")
    }

    /// `exp`
    #[must_use]
    pub fn expires_at(&self) -> Option<u64> {
        self.numeric_date("exp")
    }

    /// `aud`; `None` when absent or neither a string nor a string array.
    #[must_use]
    pub fn audience(&self) -> Option<Audience> {
        self.payload
            .get("aud")
            .and_then(|aud| Audience::deserialize(aud).ok())
    }

    /// Identity projection.
    #[must_use]
    pub fn identity(&self) -> Identity {
        let owned = |name: &str| self.string(name).map(str::to_string);
        Identity {
            subject: owned("sub"),
            username: owned("preferred_username"),
            email: owned("email"),
            name: owned("name"),
            given_name: owned("given_name"),
            family_name: owned("family_name"),
        }
    }

    /// Role projection.
    #[must_use]
    pub fn roles(&self) -> RoleSet {
        RoleSet {
            realm_roles: self
                .payload
                .get("realm_access")
                .map(role_list)
                .unwrap_or_default(),
            client_roles: self
                .payload
                .get("resource_access")
                .and_then(Value::as_object)
                .map(|clients| {
                    clients
                        .iter()
                        .map(|(client, access)| (client.clone(), role_list(access)))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Metadata projection.
    #[must_use]
    pub fn metadata(&self) -> TokenMetadata {
        TokenMetadata {
            issued_at: self.numeric_date("iat"),
            expires_at: self.expires_at(),
            not_before: self.numeric_date("nbf"),
            issuer: self.string("iss").map(str::to_string),
            audience: self
                .audience()
                .map(|a| a.values().into_iter().map(str::to_string).collect())
                .unwrap_or_default(),
            token_type: self.string("typ").map(str::to_string),
            authorized_party: self.string("azp").map(str::to_string),
        }
    }
}
