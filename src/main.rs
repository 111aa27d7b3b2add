//! realm-verify - bearer token verification for Keycloak-style realms
//!
//! Every subcommand prints JSON on stdout; logs go to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use realm_verify::{
    TokenVerifier, TrustLevel,
    cli::{Cli, Command},
    config::Config,
    diagnostics,
    keys::KeySetResolver,
    refresh::RefreshProxy,
    setup_tracing,
    token::bearer_token,
};

#[tokio::main]
async fn main() -> ExitCode {
    // .env must be loaded before clap reads env-bound arguments
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        realm = %config.provider.realm,
        endpoints = config.provider.endpoints.len(),
        "realm-verify starting"
    );

    match cli.command {
        Command::Verify { token, basic } => run_verify(config, &token, basic).await,
        Command::Inspect { token } => run_inspect(&config, &token),
        Command::Keys => run_keys(&config).await,
        Command::Explore => run_explore(&config).await,
        Command::Refresh { refresh_token } => run_refresh(&config, &refresh_token).await,
    }
}

/// Load configuration and apply CLI overrides
fn load_config(cli: &Cli) -> realm_verify::Result<Config> {
    let mut config = Config::extract(cli.config.as_deref())?;
    config.apply_overrides(cli.realm.as_deref(), &cli.endpoints);
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T, success: bool) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize output: {e}");
            return ExitCode::FAILURE;
        }
    }
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn strip_bearer(token: &str) -> &str {
    bearer_token(token).unwrap_or(token)
}

async fn run_verify(config: Config, token: &str, basic: bool) -> ExitCode {
    let verifier = match TokenVerifier::new(Arc::new(config)) {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to create verifier: {e}");
            return ExitCode::FAILURE;
        }
    };

    let trust = if basic {
        TrustLevel::Unsigned
    } else {
        TrustLevel::Signed
    };

    match verifier.authenticate(strip_bearer(token), trust).await {
        Ok(outcome) => {
            let claims = outcome.claims();
            print_json(
                &json!({
                    "authenticated": outcome,
                    "identity": claims.identity(),
                    "roles": claims.roles(),
                    "is_admin": claims.roles().is_admin(),
                    "metadata": claims.metadata(),
                }),
                true,
            )
        }
        Err(unauthorized) => print_json(
            &json!({
                "error": unauthorized,
                "www_authenticate": unauthorized.challenge(),
            }),
            false,
        ),
    }
}

fn run_inspect(config: &Config, token: &str) -> ExitCode {
    match diagnostics::inspect_token(config, strip_bearer(token)) {
        Ok(report) => print_json(&report, true),
        Err(e) => print_json(&json!({ "error": e.reason, "detail": e.detail }), false),
    }
}

async fn run_keys(config: &Config) -> ExitCode {
    let resolver = match KeySetResolver::new(config) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to create resolver: {e}");
            return ExitCode::FAILURE;
        }
    };

    match resolver.resolve().await {
        Ok(key_set) => print_json(&key_set, true),
        Err(e) => print_json(
            &json!({ "error": e.to_string(), "attempts": e.attempts }),
            false,
        ),
    }
}

async fn run_explore(config: &Config) -> ExitCode {
    match diagnostics::explore(config).await {
        Ok(report) => print_json(&report, true),
        Err(e) => {
            error!("Exploration failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_refresh(config: &Config, refresh_token: &str) -> ExitCode {
    let proxy = match RefreshProxy::new(config) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create refresh proxy: {e}");
            return ExitCode::FAILURE;
        }
    };

    match proxy.refresh(refresh_token).await {
        Ok(response) => print_json(&response, true),
        Err(e) => print_json(&json!({ "error": e.to_string() }), false),
    }
}
