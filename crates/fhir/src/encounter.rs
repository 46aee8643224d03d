//! FHIR-aligned encounter wire models and translation helpers.
//!
//! An encounter links a patient, a practitioner, a time period, a status and a
//! reason. The flat [`EncounterResource`] carries exactly the fields the relay reads:
//! - `id`
//! - `subject.reference`
//! - `participant[0].individual.display`
//! - `period.start`
//! - `status`
//! - `reasonCode[0].text`
//!
//! Values are kept as strings here. Interpreting the status code or the start time
//! is left to the caller.

use crate::{expect_resource_type, from_wire_value, FhirResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const RESOURCE_TYPE: &str = "Encounter";

// ============================================================================
// Public domain-level types
// ============================================================================

/// Flat carrier for encounter resource data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncounterResource {
    pub id: Option<String>,

    /// Status code, for example `in-progress`.
    pub status: Option<String>,

    /// Subject reference, for example `Patient/5`.
    pub subject: Option<String>,

    /// Display name of the first participant.
    pub participant_display: Option<String>,

    /// `period.start` as written on the wire.
    pub period_start: Option<String>,

    /// Text of the first reason code.
    pub reason_text: Option<String>,
}

// ============================================================================
// Public Encounter operations
// ============================================================================

/// Encounter resource operations.
pub struct Encounter;

impl Encounter {
    /// Parse an encounter resource from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if the text is not valid JSON, `resourceType` is
    /// missing or not `Encounter`, or a read field has an unexpected shape.
    pub fn parse(json_text: &str) -> FhirResult<EncounterResource> {
        let value: Value = serde_json::from_str(json_text)?;
        Self::from_value(value)
    }

    /// Render an encounter resource as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if serialisation fails.
    pub fn render(data: &EncounterResource) -> FhirResult<String> {
        Ok(serde_json::to_string(&domain_to_wire(data))?)
    }

    pub(crate) fn from_value(value: Value) -> FhirResult<EncounterResource> {
        expect_resource_type(&value, RESOURCE_TYPE)?;
        let wire: EncounterWire = from_wire_value(value, RESOURCE_TYPE)?;
        Ok(wire_to_domain(wire))
    }

    pub(crate) fn to_value(data: &EncounterResource) -> FhirResult<Value> {
        Ok(serde_json::to_value(domain_to_wire(data))?)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
struct EncounterWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<ReferenceWire>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    participant: Vec<ParticipantWire>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    period: Option<PeriodWire>,

    #[serde(rename = "reasonCode", default, skip_serializing_if = "Vec::is_empty")]
    reason_code: Vec<CodeableConceptWire>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
struct ReferenceWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    display: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
struct ParticipantWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    individual: Option<ReferenceWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
struct PeriodWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    end: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
struct CodeableConceptWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn wire_to_domain(wire: EncounterWire) -> EncounterResource {
    EncounterResource {
        id: wire.id,
        status: wire.status,
        subject: wire.subject.and_then(|s| s.reference),
        participant_display: wire
            .participant
            .into_iter()
            .next()
            .and_then(|p| p.individual)
            .and_then(|i| i.display),
        period_start: wire.period.and_then(|p| p.start),
        reason_text: wire.reason_code.into_iter().next().and_then(|r| r.text),
    }
}

fn domain_to_wire(data: &EncounterResource) -> EncounterWire {
    EncounterWire {
        resource_type: RESOURCE_TYPE.to_string(),
        id: data.id.clone(),
        status: data.status.clone(),
        subject: data.subject.as_ref().map(|reference| ReferenceWire {
            reference: Some(reference.clone()),
            display: None,
        }),
        participant: data
            .participant_display
            .as_ref()
            .map(|display| {
                vec![ParticipantWire {
                    individual: Some(ReferenceWire {
                        reference: None,
                        display: Some(display.clone()),
                    }),
                }]
            })
            .unwrap_or_default(),
        period: data.period_start.as_ref().map(|start| PeriodWire {
            start: Some(start.clone()),
            end: None,
        }),
        reason_code: data
            .reason_text
            .as_ref()
            .map(|text| vec![CodeableConceptWire { text: Some(text.clone()) }])
            .unwrap_or_default(),
    }
}
