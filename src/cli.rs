//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Verify Keycloak-style bearer tokens and diagnose realm discovery
#[derive(Parser, Debug)]
#[command(name = "realm-verify")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "REALM_VERIFY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Realm to verify against (overrides configuration)
    #[arg(long, global = true)]
    pub realm: Option<String>,

    /// Provider base address; repeat to probe several in order (overrides configuration)
    #[arg(long = "endpoint", global = true)]
    pub endpoints: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "REALM_VERIFY_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "REALM_VERIFY_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify a token and print its claims
    Verify {
        /// Bearer token (a leading `Bearer ` is stripped)
        #[arg(env = "REALM_VERIFY_TOKEN", hide_env_values = true)]
        token: String,

        /// Check claims only, without resolving keys or checking the signature
        #[arg(long)]
        basic: bool,
    },

    /// Decode a token without verifying it
    Inspect {
        /// Bearer token
        #[arg(env = "REALM_VERIFY_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Resolve and print the realm's signing keys
    Keys,

    /// Probe well-known provider paths on every endpoint
    Explore,

    /// Forward a refresh token to the realm's token endpoint
    Refresh {
        /// Refresh token
        #[arg(env = "REALM_VERIFY_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },
}
