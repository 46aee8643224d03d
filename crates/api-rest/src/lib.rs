//! # API REST
//!
//! HTTP surface for the clinical relay.
//!
//! Handles:
//! - one axum router per hop (front desk, registry, practitioner)
//! - WebSocket subscriptions to the `patients` and `visits` topics
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (status codes, error bodies, CORS)
//!
//! All behaviour lives in `relay-core`; handlers only adapt requests and responses.

#![warn(rust_2018_idioms)]

pub mod front_desk;
pub mod practitioner;
pub mod registry;
pub mod subscriptions;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Router,
};
use relay_core::{
    CoreConfig, CoreError, EventBroadcaster, FrontDeskService, InMemoryPatientStore,
    InMemoryVisitStore, PractitionerService, RegistryService, RelayError, RelayForwarder,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use utoipa::ToSchema;

/// Health check response.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Error body returned with every 4xx/5xx.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorRes {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Map a core error to a status code and error body.
pub(crate) fn core_error_response(err: &CoreError) -> Response {
    let status = match err {
        CoreError::Decode(_) | CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Admission(_) => StatusCode::CONFLICT,
        CoreError::Store(_) | CoreError::InvalidConfig(_) => {
            tracing::error!(error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, err.to_string())
}

/// Which hop a standalone server runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    FrontDesk,
    Registry,
    Practitioner,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "front-desk" | "reception" => Ok(Role::FrontDesk),
            "registry" => Ok(Role::Registry),
            "practitioner" | "doctor" => Ok(Role::Practitioner),
            other => Err(format!(
                "unknown role '{other}', expected front-desk, registry or practitioner"
            )),
        }
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::FrontDesk => "front-desk",
            Role::Registry => "registry",
            Role::Practitioner => "practitioner",
        }
    }

    /// Address this hop listens on.
    pub fn listen_addr(&self, cfg: &CoreConfig) -> SocketAddr {
        match self {
            Role::FrontDesk => cfg.listen().front_desk,
            Role::Registry => cfg.listen().registry,
            Role::Practitioner => cfg.listen().practitioner,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire up the service for one hop and return its router.
///
/// The practitioner pulls the registry's encounters before its router is returned,
/// so the registry should already be listening. A failed pull is logged and the hop
/// starts with an uninitialized cache.
///
/// # Errors
///
/// Returns [`RelayError::Client`] if the HTTP client cannot be built.
pub async fn hop_router(role: Role, cfg: Arc<CoreConfig>) -> Result<Router, RelayError> {
    let relay = RelayForwarder::from_config(&cfg)?;

    let router = match role {
        Role::FrontDesk => front_desk::router(FrontDeskService::new(cfg, relay)),
        Role::Registry => registry::router(RegistryService::new(
            cfg,
            Arc::new(InMemoryPatientStore::new()),
            Arc::new(InMemoryVisitStore::new()),
            relay,
            EventBroadcaster::new(),
        )),
        Role::Practitioner => {
            let service = PractitionerService::new(cfg, relay, EventBroadcaster::new());
            service.sync_on_startup().await;
            practitioner::router(service)
        }
    };
    Ok(router)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("front-desk".parse::<Role>(), Ok(Role::FrontDesk));
        assert_eq!("REGISTRY".parse::<Role>(), Ok(Role::Registry));
        assert_eq!("practitioner".parse::<Role>(), Ok(Role::Practitioner));
        assert!("pharmacy".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_listen_addr() {
        let cfg = CoreConfig::default();
        assert_eq!(Role::Registry.listen_addr(&cfg), cfg.listen().registry);
        assert_eq!(
            Role::FrontDesk.to_string().parse::<Role>(),
            Ok(Role::FrontDesk)
        );
    }

    #[tokio::test]
    async fn test_registry_hop_router_serves_health() {
        let app = hop_router(Role::Registry, Arc::new(CoreConfig::default()))
            .await
            .expect("router");
        let response = test_support::get(app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
