//! Front desk hop.
//!
//! Turns reception requests into segment messages and encounter resources and
//! sends them to the registry. The registry's ACK/NACK is passed back unchanged.

use crate::config::CoreConfig;
use crate::constants::{FHIR_PATH, HL7_PATH};
use crate::domain::{NewPatient, VisitStatus};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::relay::{RelayError, RelayForwarder};
use crate::translator;
use chrono::{DateTime, NaiveDate, Utc};
use fhir::{EncounterResource, FhirError, Resource};
use hl7::Acknowledgment;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use utoipa::ToSchema;

// ============================================================================
// Requests
// ============================================================================

/// Register a patient at reception.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    /// Defaults to today when absent.
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

/// Remove a patient by id.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, ToSchema)]
pub struct DischargeRequest {
    #[serde(deserialize_with = "string_or_number")]
    #[schema(value_type = String)]
    pub id: String,
}

/// Minimal encounter form used when reception does not send a full resource.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EncounterRequest {
    /// Numeric id, or a `Patient/{id}` reference.
    #[serde(alias = "subject", deserialize_with = "string_or_number")]
    #[schema(value_type = String)]
    pub patient_id: String,

    #[serde(default, alias = "participant")]
    pub doctor_name: Option<String>,

    #[serde(default)]
    pub reason: Option<String>,

    /// Any format accepted for `period.start`.
    #[serde(default, alias = "periodStart")]
    pub visit_date: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

/// Failure to hand a request to the registry.
#[derive(Debug, thiserror::Error)]
pub enum FrontDeskError {
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone)]
pub struct FrontDeskService {
    cfg: Arc<CoreConfig>,
    relay: RelayForwarder,
}

impl FrontDeskService {
    pub fn new(cfg: Arc<CoreConfig>, relay: RelayForwarder) -> Self {
        Self { cfg, relay }
    }

    fn registry(&self, path: &str) -> String {
        format!("{}{}", self.cfg.registry_url(), path)
    }

    /// Send an admit message for a new patient.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the registry cannot be reached. A NACK is not an error.
    pub async fn register(&self, request: &RegisterRequest) -> Result<Acknowledgment, RelayError> {
        let now = Utc::now();
        let patient = NewPatient {
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            birth_date: request.birth_date.unwrap_or_else(|| now.date_naive()),
        };
        let header = translator::front_desk_header(now.naive_utc());
        let message = translator::admit_message(&patient, &header);

        self.relay
            .post_segment(&self.registry(HL7_PATH), &message.render())
            .await
    }

    /// Send a discharge message. The id is passed through; the registry validates it.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the registry cannot be reached. A NACK is not an error.
    pub async fn discharge(&self, request: &DischargeRequest) -> Result<Acknowledgment, RelayError> {
        let header = translator::front_desk_header(Utc::now().naive_utc());
        let message = translator::discharge_message(&request.id, &header);

        self.relay
            .post_segment(&self.registry(HL7_PATH), &message.render())
            .await
    }

    /// Send an encounter, given either as a full resource or as an [`EncounterRequest`].
    ///
    /// Returns the registry's status code.
    ///
    /// # Errors
    ///
    /// Returns [`FrontDeskError::Invalid`] if the body is neither form, and
    /// [`FrontDeskError::Relay`] if the registry cannot be reached or refuses it.
    pub async fn send_encounter(&self, body: &str) -> Result<u16, FrontDeskError> {
        let encounter = encounter_from_payload(body, Utc::now())?;
        let status = self
            .relay
            .forward(&Resource::Encounter(encounter), &self.registry(FHIR_PATH))
            .await?;
        Ok(status)
    }
}

impl std::fmt::Debug for FrontDeskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontDeskService")
            .field("registry_url", &self.cfg.registry_url())
            .finish()
    }
}

/// Accept a full encounter resource as is, or build one from the minimal form.
///
/// # Errors
///
/// Returns [`CoreError`] if the body is a resource of another type, is not JSON, or
/// the minimal form has a non-numeric patient id.
pub fn encounter_from_payload(body: &str, now: DateTime<Utc>) -> CoreResult<EncounterResource> {
    match Resource::parse(body) {
        Ok(Resource::Encounter(encounter)) => Ok(encounter),
        Ok(other) => {
            Err(ValidationError::UnsupportedResource(other.resource_type().to_string()).into())
        }
        Err(FhirError::MissingResourceType) => {
            let request: EncounterRequest =
                serde_json::from_str(body).map_err(FhirError::InvalidJson)?;
            Ok(encounter_from_request(&request, now)?)
        }
        Err(err) => Err(err.into()),
    }
}

/// Build an in-progress encounter from the minimal form.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidPatientId`] if the patient id is not numeric.
pub fn encounter_from_request(
    request: &EncounterRequest,
    now: DateTime<Utc>,
) -> Result<EncounterResource, ValidationError> {
    let raw_id = request.patient_id.trim();
    let patient_id = match raw_id.strip_prefix(crate::constants::PATIENT_REFERENCE_PREFIX) {
        Some(id) => translator::parse_patient_id(id),
        None => translator::parse_patient_id(raw_id),
    }?;

    let start = request
        .visit_date
        .as_deref()
        .and_then(translator::parse_period_start)
        .unwrap_or(now);

    Ok(EncounterResource {
        id: None,
        status: Some(VisitStatus::InProgress.code().to_string()),
        subject: Some(translator::subject_reference(patient_id)),
        participant_display: request.doctor_name.clone(),
        period_start: Some(translator::format_period_start(start)),
        reason_text: request.reason.clone(),
    })
}
