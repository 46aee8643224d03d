//! Registry routes.

use crate::{core_error_response, error_response, subscriptions, ErrorRes, HealthRes};
use axum::{
    extract::{FromRef, Path, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use relay_core::{
    ack::REASON_CAPACITY_EXCEEDED, CoreError, EventBroadcaster, NewPatient, Patient, PatientId,
    RegistryService, ResourceOutcome, Visit, VisitId, VisitStatus,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
pub struct RegistryState {
    service: RegistryService,
}

impl FromRef<RegistryState> for EventBroadcaster {
    fn from_ref(state: &RegistryState) -> Self {
        state.service.events().clone()
    }
}

/// Reply to an accepted resource.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAcceptedRes {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<PatientId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_id: Option<VisitId>,
}

/// Reply to a JSON admission.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PatientCreatedRes {
    pub id: PatientId,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        receive_segment,
        receive_resource,
        encounter_bundle,
        visits_for_doctor,
        list_patients,
        patient_from_json,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        ResourceAcceptedRes,
        PatientCreatedRes,
        Patient,
        NewPatient,
        Visit,
        VisitStatus,
    ))
)]
struct RegistryApiDoc;

/// Build the registry router.
pub fn router(service: RegistryService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/hl7", post(receive_segment))
        .route("/fhir", post(receive_resource))
        .route("/fhir/encounter", get(encounter_bundle))
        .route("/visits/doctor/:name", get(visits_for_doctor))
        .route("/api/patients", get(list_patients))
        .route("/api/patient-from-json", post(patient_from_json))
        .route("/ws/:topic", get(subscriptions::subscribe))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", RegistryApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(RegistryState { service })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the registry
#[axum::debug_handler]
async fn health(State(_state): State<RegistryState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Registry is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/hl7",
    request_body(content = String, content_type = "text/plain", description = "Pipe-delimited segment message"),
    responses(
        (status = 200, description = "ACK or NACK reply, e.g. `ACK|A01 received`", body = String, content_type = "text/plain")
    )
)]
/// Receive a segment message
///
/// Always answers 200; rejection is carried in the NACK reason.
#[axum::debug_handler]
async fn receive_segment(State(state): State<RegistryState>, body: String) -> Response {
    let reply = state.service.handle_segment(&body).await;
    ([(CONTENT_TYPE, "text/plain")], reply.render()).into_response()
}

#[utoipa::path(
    post,
    path = "/fhir",
    request_body(content = String, content_type = "application/fhir+json", description = "Patient or Encounter resource"),
    responses(
        (status = 200, description = "Resource stored", body = ResourceAcceptedRes),
        (status = 400, description = "Malformed, unsupported or unresolvable resource", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Receive a single resource
///
/// Patients are stored as given. Encounters are recorded and relayed to the
/// practitioner endpoint; a relay failure does not change this reply.
#[axum::debug_handler]
async fn receive_resource(State(state): State<RegistryState>, body: String) -> Response {
    match state.service.handle_resource(&body).await {
        Ok(ResourceOutcome::Patient(id)) => Json(ResourceAcceptedRes {
            status: "ok".into(),
            patient_id: Some(id),
            visit_id: None,
        })
        .into_response(),
        Ok(ResourceOutcome::Visit(id)) => Json(ResourceAcceptedRes {
            status: "ok".into(),
            patient_id: None,
            visit_id: Some(id),
        })
        .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "resource rejected");
            core_error_response(&err)
        }
    }
}

#[utoipa::path(
    get,
    path = "/fhir/encounter",
    responses(
        (status = 200, description = "Collection bundle of every stored encounter", body = String, content_type = "application/fhir+json"),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Export every visit as an encounter bundle
#[axum::debug_handler]
async fn encounter_bundle(State(state): State<RegistryState>) -> Response {
    let rendered = state
        .service
        .encounter_bundle()
        .and_then(|bundle| bundle.render().map_err(CoreError::from));

    match rendered {
        Ok(json) => ([(CONTENT_TYPE, fhir::FHIR_JSON)], json).into_response(),
        Err(err) => core_error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/visits/doctor/{name}",
    params(
        ("name" = String, Path, description = "Doctor name, matched case-insensitively")
    ),
    responses(
        (status = 200, description = "Visits for the doctor", body = [Visit]),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// List visits for one doctor
#[axum::debug_handler]
async fn visits_for_doctor(
    State(state): State<RegistryState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Visit>>, Response> {
    state
        .service
        .visits_for_doctor(&name)
        .map(Json)
        .map_err(|err| core_error_response(&err))
}

#[utoipa::path(
    get,
    path = "/api/patients",
    responses(
        (status = 200, description = "Registered patients", body = [Patient]),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// List registered patients
#[axum::debug_handler]
async fn list_patients(State(state): State<RegistryState>) -> Result<Json<Vec<Patient>>, Response> {
    state
        .service
        .list_patients()
        .map(Json)
        .map_err(|err| core_error_response(&err))
}

#[utoipa::path(
    post,
    path = "/api/patient-from-json",
    request_body = NewPatient,
    responses(
        (status = 200, description = "Patient admitted", body = PatientCreatedRes),
        (status = 409, description = "Patient capacity reached", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Admit a patient from JSON
///
/// Goes through the same capacity check as an admit segment message.
#[axum::debug_handler]
async fn patient_from_json(
    State(state): State<RegistryState>,
    Json(new): Json<NewPatient>,
) -> Response {
    match state.service.admit(new).await {
        Ok(patient) => Json(PatientCreatedRes { id: patient.id }).into_response(),
        Err(CoreError::Admission(_)) => {
            error_response(StatusCode::CONFLICT, REASON_CAPACITY_EXCEEDED)
        }
        Err(err) => core_error_response(&err),
    }
}
