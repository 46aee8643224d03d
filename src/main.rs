use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{Role, hop_router};
use relay_core::CoreConfig;

/// Main entry point for the clinical relay
///
/// Starts all three hops concurrently in one process:
/// - front desk on 0.0.0.0:8080 (configurable via FRONT_DESK_ADDR)
/// - registry on 0.0.0.0:8081 (configurable via REGISTRY_ADDR)
/// - practitioner on 0.0.0.0:8082 (configurable via PRACTITIONER_ADDR)
///
/// The registry is bound first so the practitioner's startup pull can reach it.
///
/// # Environment Variables
/// - `REGISTRY_URL`: where the front desk and practitioner reach the registry
///   (default: "http://127.0.0.1:8081")
/// - `PRACTITIONER_URL`: where the registry relays encounters
///   (default: "http://127.0.0.1:8082")
/// - `PATIENT_CAPACITY`: admission limit (default: 10)
/// - `RELAY_TIMEOUT_MS`, `RELAY_MAX_ATTEMPTS`, `RELAY_BACKOFF_MS`: outbound relay policy
///
/// # Returns
/// * `Ok(())` - If servers start and run successfully
/// * `Err(anyhow::Error)` - If configuration, binding or a server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("relay_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(CoreConfig::from_env()?);

    let registry_server = serve(Role::Registry, cfg.clone()).await?;
    let practitioner_server = serve(Role::Practitioner, cfg.clone()).await?;
    let front_desk_server = serve(Role::FrontDesk, cfg).await?;

    // Run all three
    let (registry_result, practitioner_result, front_desk_result) =
        tokio::join!(registry_server, practitioner_server, front_desk_server);
    registry_result??;
    practitioner_result??;
    front_desk_result??;

    Ok(())
}

/// Bind one hop and spawn its server.
async fn serve(
    role: Role,
    cfg: Arc<CoreConfig>,
) -> anyhow::Result<tokio::task::JoinHandle<std::io::Result<()>>> {
    let addr = role.listen_addr(&cfg);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("++ Starting {} on {}", role, addr);

    let app = hop_router(role, cfg).await?;
    Ok(tokio::spawn(async move { axum::serve(listener, app).await }))
}
