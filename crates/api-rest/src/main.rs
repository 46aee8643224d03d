//! Standalone single-hop server binary.
//!
//! ## Purpose
//! Runs one hop of the relay (front desk, registry or practitioner) on its own.
//!
//! ## Intended use
//! Deploy one process per hop, or use this during development to restart a single hop.
//! The workspace's main `relay-run` binary runs all three hops in one process.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{hop_router, Role};
use relay_core::CoreConfig;

/// Main entry point for a single hop
///
/// # Environment Variables
/// - `RELAY_ROLE`: `front-desk`, `registry` or `practitioner` (default: `registry`)
/// - `FRONT_DESK_ADDR`, `REGISTRY_ADDR`, `PRACTITIONER_ADDR`: listen addresses
/// - `REGISTRY_URL`, `PRACTITIONER_URL`: where the next hop is reached
/// - `PATIENT_CAPACITY`, `RELAY_TIMEOUT_MS`, `RELAY_MAX_ATTEMPTS`, `RELAY_BACKOFF_MS`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the role or any configuration variable is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("relay_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let role: Role = std::env::var("RELAY_ROLE")
        .unwrap_or_else(|_| Role::Registry.to_string())
        .parse()
        .map_err(anyhow::Error::msg)?;

    let cfg = Arc::new(CoreConfig::from_env()?);
    let addr = role.listen_addr(&cfg);

    tracing::info!("-- Starting {} on {}", role, addr);

    let app = hop_router(role, cfg).await?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
