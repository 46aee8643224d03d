//! Front desk routes.
//!
//! Reception submits JSON here. Registrations and discharges go to the registry as
//! segment messages and the registry's ACK/NACK text is returned as is. Encounters go
//! as resources.

use crate::{core_error_response, error_response, ErrorRes, HealthRes};
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use relay_core::{
    DischargeRequest, EncounterRequest, FrontDeskError, FrontDeskService, RegisterRequest,
    RelayError,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
pub struct FrontDeskState {
    service: FrontDeskService,
}

/// Reply to a forwarded encounter.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EncounterSentRes {
    pub status: String,
    /// Status code the registry answered with.
    pub registry_status: u16,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, register, discharge, send_encounter),
    components(schemas(
        HealthRes,
        ErrorRes,
        EncounterSentRes,
        RegisterRequest,
        DischargeRequest,
        EncounterRequest,
    ))
)]
struct FrontDeskApiDoc;

/// Build the front desk router.
pub fn router(service: FrontDeskService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/register", post(register))
        .route("/api/delete", post(discharge))
        .route("/api/sendEncounter", post(send_encounter))
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", FrontDeskApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(FrontDeskState { service })
}

fn relay_failure(err: &RelayError) -> Response {
    tracing::error!(error = %err, "registry unreachable");
    error_response(StatusCode::BAD_GATEWAY, err.to_string())
}

fn ack_text(text: String) -> Response {
    ([(CONTENT_TYPE, "text/plain")], text).into_response()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the front desk
#[axum::debug_handler]
async fn health(State(_state): State<FrontDeskState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Front desk is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registry reply, e.g. `ACK|A01 received` or `NACK|Too many patients`", body = String, content_type = "text/plain"),
        (status = 502, description = "Registry unreachable", body = ErrorRes)
    )
)]
/// Register a patient
///
/// Sends an admit message to the registry.
#[axum::debug_handler]
async fn register(
    State(state): State<FrontDeskState>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    match state.service.register(&request).await {
        Ok(reply) => ack_text(reply.render()),
        Err(err) => relay_failure(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/delete",
    request_body = DischargeRequest,
    responses(
        (status = 200, description = "Registry reply, e.g. `ACK|A23 received` or `NACK|Patient not found`", body = String, content_type = "text/plain"),
        (status = 502, description = "Registry unreachable", body = ErrorRes)
    )
)]
/// Discharge a patient
///
/// Sends a discharge message to the registry.
#[axum::debug_handler]
async fn discharge(
    State(state): State<FrontDeskState>,
    Json(request): Json<DischargeRequest>,
) -> Response {
    match state.service.discharge(&request).await {
        Ok(reply) => ack_text(reply.render()),
        Err(err) => relay_failure(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/sendEncounter",
    request_body(content = EncounterRequest, description = "Full Encounter resource, or the minimal form"),
    responses(
        (status = 200, description = "Registry accepted the encounter", body = EncounterSentRes),
        (status = 400, description = "Body is neither form", body = ErrorRes),
        (status = 502, description = "Registry unreachable or refused the encounter", body = ErrorRes)
    )
)]
/// Send an encounter to the registry
#[axum::debug_handler]
async fn send_encounter(State(state): State<FrontDeskState>, body: String) -> Response {
    match state.service.send_encounter(&body).await {
        Ok(registry_status) => Json(EncounterSentRes {
            status: "ok".into(),
            registry_status,
        })
        .into_response(),
        Err(FrontDeskError::Invalid(err)) => core_error_response(&err),
        Err(FrontDeskError::Relay(err)) => relay_failure(&err),
    }
}
