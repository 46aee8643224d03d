//! Practitioner routes. Reads are served from the visit cache only.

use crate::{core_error_response, error_response, subscriptions, ErrorRes, HealthRes};
use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use relay_core::{CacheEntry, CacheState, EventBroadcaster, PractitionerService};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
pub struct PractitionerState {
    service: PractitionerService,
}

impl FromRef<PractitionerState> for EventBroadcaster {
    fn from_ref(state: &PractitionerState) -> Self {
        state.service.events().clone()
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ReceivedRes {
    pub result: String,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ResyncRes {
    pub cached: usize,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, receive_encounter, receive_patient, visits_for_doctor, all_visits, resync),
    components(schemas(HealthRes, ErrorRes, ReceivedRes, ResyncRes, CacheEntry))
)]
struct PractitionerApiDoc;

/// Build the practitioner router.
pub fn router(service: PractitionerService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/fhir/encounter", post(receive_encounter))
        .route("/fhir/patient", post(receive_patient))
        .route("/visits", get(all_visits))
        .route("/visits/doctor/:name", get(visits_for_doctor))
        .route("/cache/resync", post(resync))
        .route("/ws/:topic", get(subscriptions::subscribe))
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", PractitionerApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(PractitionerState { service })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the practitioner
///
/// Reports whether the visit cache has been synced from the registry.
#[axum::debug_handler]
async fn health(State(state): State<PractitionerState>) -> Json<HealthRes> {
    let message = match state.service.cache_state() {
        CacheState::Synced => "Practitioner is alive",
        CacheState::Uninitialized => "Practitioner is alive; visit cache not synced",
    };
    Json(HealthRes {
        ok: true,
        message: message.into(),
    })
}

#[utoipa::path(
    post,
    path = "/fhir/encounter",
    request_body(content = String, content_type = "application/fhir+json", description = "Encounter relayed by the registry"),
    responses(
        (status = 200, description = "Encounter appended to the cache", body = ReceivedRes),
        (status = 400, description = "Body is not an encounter", body = ErrorRes)
    )
)]
/// Receive a relayed encounter
#[axum::debug_handler]
async fn receive_encounter(State(state): State<PractitionerState>, body: String) -> Response {
    match state.service.receive_encounter(&body) {
        Ok(_) => Json(ReceivedRes {
            result: "ok".into(),
        })
        .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "relayed encounter rejected");
            core_error_response(&err)
        }
    }
}

#[utoipa::path(
    post,
    path = "/fhir/patient",
    request_body(content = String, content_type = "application/fhir+json", description = "Patient relayed by the registry"),
    responses(
        (status = 200, description = "Patient announced on the patients topic", body = ReceivedRes),
        (status = 400, description = "Body is not a patient with a registry id", body = ErrorRes)
    )
)]
/// Receive a relayed patient
#[axum::debug_handler]
async fn receive_patient(State(state): State<PractitionerState>, body: String) -> Response {
    match state.service.receive_patient(&body) {
        Ok(_) => Json(ReceivedRes {
            result: "ok".into(),
        })
        .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "relayed patient rejected");
            core_error_response(&err)
        }
    }
}

#[utoipa::path(
    get,
    path = "/visits/doctor/{name}",
    params(
        ("name" = String, Path, description = "Doctor name, matched case-insensitively")
    ),
    responses(
        (status = 200, description = "Cached visits for the doctor", body = [CacheEntry])
    )
)]
/// List cached visits for one doctor
#[axum::debug_handler]
async fn visits_for_doctor(
    State(state): State<PractitionerState>,
    Path(name): Path<String>,
) -> Json<Vec<CacheEntry>> {
    Json(state.service.visits(Some(&name)))
}

#[utoipa::path(
    get,
    path = "/visits",
    responses(
        (status = 200, description = "Every cached visit", body = [CacheEntry])
    )
)]
/// List every cached visit
#[axum::debug_handler]
async fn all_visits(State(state): State<PractitionerState>) -> Json<Vec<CacheEntry>> {
    Json(state.service.visits(None))
}

#[utoipa::path(
    post,
    path = "/cache/resync",
    responses(
        (status = 200, description = "Cache replaced from the registry", body = ResyncRes),
        (status = 502, description = "Registry unreachable or reply unusable", body = ErrorRes)
    )
)]
/// Pull every encounter from the registry again
#[axum::debug_handler]
async fn resync(State(state): State<PractitionerState>) -> Response {
    match state.service.sync().await {
        Ok(cached) => Json(ResyncRes { cached }).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "visit cache resync failed");
            error_response(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}
