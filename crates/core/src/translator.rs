//! Mapping between the wire carriers and the domain entities.
//!
//! Everything here is pure. The current date or time is passed in by the caller, so
//! lossy defaults stay deterministic under test. Nothing here touches a store;
//! callers resolve references and persist the results.

use crate::constants::{
    PATIENT_REFERENCE_PREFIX, REASON_NOT_SPECIFIED, SENDING_APPLICATION, SENDING_FACILITY,
    UNKNOWN, UNKNOWN_NAME,
};
use crate::domain::{CacheEntry, NewPatient, NewVisit, Patient, PatientId, Visit, VisitStatus};
use crate::error::ValidationError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use fhir::{EncounterResource, PatientResource};
use hl7::{AdmitPatient, DischargePatient, Header, SegmentMessage};

const SEGMENT_DATE_FORMAT: &str = "%Y%m%d";
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";
const NAIVE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ============================================================================
// Segment message <-> Patient
// ============================================================================

/// Build a patient from an admit message.
///
/// Missing names become `UNKNOWN`. A missing or unparsable birth date becomes `today`.
pub fn patient_from_admit(admit: &AdmitPatient, today: NaiveDate) -> NewPatient {
    NewPatient {
        first_name: name_or_unknown(admit.given.as_deref()),
        last_name: name_or_unknown(admit.family.as_deref()),
        birth_date: admit
            .birth_date
            .as_deref()
            .and_then(parse_segment_date)
            .unwrap_or(today),
    }
}

/// Read the numeric patient id out of a discharge message.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidPatientId`] if the id is absent or not numeric.
pub fn patient_id_from_discharge(discharge: &DischargePatient) -> Result<PatientId, ValidationError> {
    parse_patient_id(discharge.external_id.as_deref().unwrap_or_default())
}

/// Parse a decimal patient id.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidPatientId`] if `raw` is not a non-negative integer.
pub fn parse_patient_id(raw: &str) -> Result<PatientId, ValidationError> {
    raw.trim()
        .parse()
        .map_err(|_| ValidationError::InvalidPatientId(raw.to_string()))
}

/// Header used by the front desk on outbound segment messages.
pub fn front_desk_header(now: NaiveDateTime) -> Header {
    Header::new(SENDING_APPLICATION, SENDING_FACILITY, now)
}

/// Render an admit message for a patient.
pub fn admit_message(patient: &NewPatient, header: &Header) -> SegmentMessage {
    AdmitPatient::to_message(
        &patient.last_name,
        &patient.first_name,
        patient.birth_date,
        header,
    )
}

/// Render a discharge message for an external patient id.
pub fn discharge_message(external_id: &str, header: &Header) -> SegmentMessage {
    DischargePatient::to_message(external_id.trim(), header)
}

// ============================================================================
// Patient <-> Patient resource
// ============================================================================

pub fn patient_to_resource(patient: &Patient) -> PatientResource {
    PatientResource {
        id: Some(patient.id.to_string()),
        family: Some(patient.last_name.clone()),
        given: vec![patient.first_name.clone()],
        birth_date: Some(patient.birth_date.format(ISO_DATE_FORMAT).to_string()),
    }
}

/// Build a patient from a resource. Defaults match [`patient_from_admit`].
pub fn patient_from_resource(resource: &PatientResource, today: NaiveDate) -> NewPatient {
    NewPatient {
        first_name: name_or_unknown(resource.given.first().map(String::as_str)),
        last_name: name_or_unknown(resource.family.as_deref()),
        birth_date: resource
            .birth_date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), ISO_DATE_FORMAT).ok())
            .unwrap_or(today),
    }
}

// ============================================================================
// Visit <-> Encounter resource
// ============================================================================

pub fn subject_reference(patient_id: PatientId) -> String {
    format!("{PATIENT_REFERENCE_PREFIX}{patient_id}")
}

/// Parse a `Patient/{id}` subject reference.
///
/// # Errors
///
/// Returns [`ValidationError::BadSubjectReference`] if the prefix is missing or the id
/// is not numeric.
pub fn parse_subject_reference(reference: &str) -> Result<PatientId, ValidationError> {
    reference
        .trim()
        .strip_prefix(PATIENT_REFERENCE_PREFIX)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| ValidationError::BadSubjectReference(reference.to_string()))
}

/// Build a visit from an encounter.
///
/// The subject is required. Missing participant, reason or start are defaulted; an
/// unrecognised status becomes [`VisitStatus::Unknown`].
///
/// # Errors
///
/// Returns [`ValidationError`] if the subject is missing or malformed.
pub fn visit_from_encounter(
    encounter: &EncounterResource,
    now: DateTime<Utc>,
) -> Result<NewVisit, ValidationError> {
    let subject = encounter
        .subject
        .as_deref()
        .ok_or(ValidationError::MissingField("subject"))?;

    Ok(NewVisit {
        patient_id: parse_subject_reference(subject)?,
        doctor_name: text_or(encounter.participant_display.as_deref(), UNKNOWN),
        start_time: encounter
            .period_start
            .as_deref()
            .and_then(parse_period_start)
            .unwrap_or(now),
        reason: text_or(encounter.reason_text.as_deref(), REASON_NOT_SPECIFIED),
        status: encounter
            .status
            .as_deref()
            .map(VisitStatus::from_code)
            .unwrap_or_default(),
    })
}

pub fn visit_to_encounter(visit: &Visit) -> EncounterResource {
    EncounterResource {
        id: Some(visit.id.to_string()),
        status: Some(visit.status.code().to_string()),
        subject: Some(subject_reference(visit.patient_id)),
        participant_display: Some(visit.doctor_name.clone()),
        period_start: Some(format_period_start(visit.start_time)),
        reason_text: Some(visit.reason.clone()),
    }
}

/// Parse `period.start`: RFC 3339, a naive date-time taken as UTC, or a bare date
/// taken as midnight UTC.
pub fn parse_period_start(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, NAIVE_DATETIME_FORMAT) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, ISO_DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn format_period_start(start: DateTime<Utc>) -> String {
    start.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ============================================================================
// Encounter resource -> practitioner cache
// ============================================================================

/// Flatten an encounter for the practitioner read cache.
///
/// The visit date is the calendar date as written in `period.start`, before any
/// timezone conversion.
pub fn cache_entry_from_encounter(encounter: &EncounterResource) -> CacheEntry {
    let visit_date = encounter
        .period_start
        .as_deref()
        .and_then(|raw| raw.trim().get(..10))
        .and_then(|date| NaiveDate::parse_from_str(date, ISO_DATE_FORMAT).ok())
        .map(|date| date.format(ISO_DATE_FORMAT).to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    CacheEntry {
        patient_ref: text_or(encounter.subject.as_deref(), UNKNOWN),
        doctor_name: text_or(encounter.participant_display.as_deref(), UNKNOWN),
        visit_date,
        status: encounter
            .status
            .as_deref()
            .map(|code| code.trim().to_lowercase())
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| VisitStatus::Unknown.code().to_string()),
        reason: text_or(encounter.reason_text.as_deref(), REASON_NOT_SPECIFIED),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_segment_date(raw: &str) -> Option<NaiveDate> {
    raw.trim()
        .get(..8)
        .and_then(|date| NaiveDate::parse_from_str(date, SEGMENT_DATE_FORMAT).ok())
}

fn name_or_unknown(name: Option<&str>) -> String {
    text_or(name, UNKNOWN_NAME)
}

fn text_or(value: Option<&str>, fallback: &str) -> String {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
