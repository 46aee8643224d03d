//! Domain entities owned by the hops.
//!
//! These are the typed records that sit between the two wire formats. Codecs
//! produce flat carriers; the translator maps those onto the types here.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Store-assigned patient identifier.
pub type PatientId = u64;

/// Store-assigned visit identifier.
pub type VisitId = u64;

// ============================================================================
// Patients
// ============================================================================

/// A registered patient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: PatientId,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
}

/// A patient that has not been stored yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
}

impl NewPatient {
    pub fn with_id(self, id: PatientId) -> Patient {
        Patient {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            birth_date: self.birth_date,
        }
    }
}

// ============================================================================
// Visits
// ============================================================================

/// Lifecycle status of a visit.
///
/// Domain JSON uses `SCREAMING_SNAKE_CASE`; the resource form uses the lowercase
/// codes returned by [`VisitStatus::code`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitStatus {
    Scheduled,
    Arrived,
    Triaged,
    InProgress,
    OnLeave,
    Finished,
    Cancelled,
    EnteredInError,
    #[default]
    Unknown,
}

impl VisitStatus {
    /// Interpret a status code. Case and `_`/`-` are ignored; anything else is `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "planned" | "scheduled" => VisitStatus::Scheduled,
            "arrived" => VisitStatus::Arrived,
            "triaged" => VisitStatus::Triaged,
            "in-progress" => VisitStatus::InProgress,
            "onleave" | "on-leave" => VisitStatus::OnLeave,
            "finished" => VisitStatus::Finished,
            "cancelled" => VisitStatus::Cancelled,
            "entered-in-error" => VisitStatus::EnteredInError,
            _ => VisitStatus::Unknown,
        }
    }

    /// Resource-form status code.
    pub fn code(&self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "planned",
            VisitStatus::Arrived => "arrived",
            VisitStatus::Triaged => "triaged",
            VisitStatus::InProgress => "in-progress",
            VisitStatus::OnLeave => "onleave",
            VisitStatus::Finished => "finished",
            VisitStatus::Cancelled => "cancelled",
            VisitStatus::EnteredInError => "entered-in-error",
            VisitStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A recorded visit. Only `status` may change after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: VisitId,
    pub patient_id: PatientId,
    pub doctor_name: String,
    pub start_time: DateTime<Utc>,
    pub reason: String,
    pub status: VisitStatus,
}

/// A visit that has not been stored yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewVisit {
    pub patient_id: PatientId,
    pub doctor_name: String,
    pub start_time: DateTime<Utc>,
    pub reason: String,
    pub status: VisitStatus,
}

impl NewVisit {
    pub fn with_id(self, id: VisitId) -> Visit {
        Visit {
            id,
            patient_id: self.patient_id,
            doctor_name: self.doctor_name,
            start_time: self.start_time,
            reason: self.reason,
            status: self.status,
        }
    }
}

// ============================================================================
// Practitioner cache
// ============================================================================

/// Flattened visit held by the practitioner read cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Subject reference as received, for example `Patient/5`.
    pub patient_ref: String,
    pub doctor_name: String,
    /// `YYYY-MM-DD`, or `Unknown`.
    pub visit_date: String,
    /// Resource-form status code.
    pub status: String,
    pub reason: String,
}
