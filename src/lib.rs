//! Realm Verify Library
//!
//! Bearer token verification against Keycloak-style realms whose topology,
//! version and discovery surface are not known in advance.
//!
//! # Features
//!
//! - **Two-pass key resolution**: OpenID discovery on modern and legacy
//!   paths across every candidate endpoint, then the realm descriptor's bare
//!   PEM key
//! - **Strict verification**: RS256 signature, audience, issuer and expiry
//! - **Basic verification**: claim checks only, typed apart from signed
//!   results
//! - **Claims projections**: identity, realm and client roles, metadata
//! - **Diagnostics**: provider exploration, token inspection, refresh proxy
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use realm_verify::{Config, TokenVerifier, TrustLevel};
//!
//! # async fn run(token: &str) -> realm_verify::Result<()> {
//! let verifier = TokenVerifier::new(Arc::new(Config::load(None)?))?;
//! match verifier.authenticate(token, TrustLevel::Signed).await {
//!     Ok(outcome) => println!("admin: {}", outcome.claims().roles().is_admin()),
//!     Err(unauthorized) => println!("{}", unauthorized.challenge()),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod claims;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod keys;
pub mod refresh;
pub mod token;
pub mod verify;

#[cfg(test)]
mod testutil;

pub use claims::Claims;
pub use config::Config;
pub use error::{Error, Result, Unauthorized};
pub use verify::{Authenticated, SignedClaims, TokenVerifier, TrustLevel, UnsignedClaims};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber.with(fmt::layer().with_writer(std::io::stderr)).try_init(),
    };

    installed.map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}
