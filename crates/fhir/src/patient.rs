//! FHIR-aligned patient wire models and translation helpers.
//!
//! Responsibilities:
//! - Define the flat [`PatientResource`] carrier for callers
//! - Define a wire model for serialisation/deserialisation
//! - Translate between the two
//!
//! Notes:
//! - Only the first entry of `name` is read; further names are dropped
//! - Unknown keys are tolerated, since upstream payloads carry `meta`, `text`, etc.

use crate::{expect_resource_type, from_wire_value, FhirResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const RESOURCE_TYPE: &str = "Patient";

// ============================================================================
// Public domain-level types
// ============================================================================

/// Flat carrier for patient resource data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatientResource {
    /// Logical id assigned by the registry, if any.
    pub id: Option<String>,

    /// Family name (surname).
    pub family: Option<String>,

    /// Given names, first name first.
    pub given: Vec<String>,

    /// Date of birth, ISO 8601 `YYYY-MM-DD`.
    pub birth_date: Option<String>,
}

// ============================================================================
// Public Patient operations
// ============================================================================

/// Patient resource operations.
///
/// This is a zero-sized type used for namespacing patient-related operations.
pub struct Patient;

impl Patient {
    /// Parse a patient resource from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if:
    /// - the text is not valid JSON,
    /// - `resourceType` is missing or is not `Patient`,
    /// - any field has an unexpected type.
    pub fn parse(json_text: &str) -> FhirResult<PatientResource> {
        let value: Value = serde_json::from_str(json_text)?;
        Self::from_value(value)
    }

    /// Render a patient resource as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if serialisation fails.
    pub fn render(data: &PatientResource) -> FhirResult<String> {
        Ok(serde_json::to_string(&domain_to_wire(data))?)
    }

    pub(crate) fn from_value(value: Value) -> FhirResult<PatientResource> {
        expect_resource_type(&value, RESOURCE_TYPE)?;
        let wire: PatientWire = from_wire_value(value, RESOURCE_TYPE)?;
        Ok(wire_to_domain(wire))
    }

    pub(crate) fn to_value(data: &PatientResource) -> FhirResult<Value> {
        Ok(serde_json::to_value(domain_to_wire(data))?)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
struct PatientWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    name: Vec<HumanNameWire>,

    #[serde(
        rename = "birthDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    birth_date: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
struct HumanNameWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    family: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    given: Vec<String>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn wire_to_domain(wire: PatientWire) -> PatientResource {
    let first_name = wire.name.into_iter().next();
    let (family, given) = match first_name {
        Some(name) => (name.family, name.given),
        None => (None, Vec::new()),
    };

    PatientResource {
        id: wire.id,
        family,
        given,
        birth_date: wire.birth_date,
    }
}

fn domain_to_wire(data: &PatientResource) -> PatientWire {
    let name = if data.family.is_some() || !data.given.is_empty() {
        vec![HumanNameWire {
            family: data.family.clone(),
            given: data.given.clone(),
        }]
    } else {
        vec![]
    };

    PatientWire {
        resource_type: RESOURCE_TYPE.to_string(),
        id: data.id.clone(),
        name,
        birth_date: data.birth_date.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FhirError;

    #[test]
    fn parses_sample_json() {
        let input = r#"{
            "resourceType": "Patient",
            "id": "5",
            "meta": {"lastUpdated": "2024-05-01T10:00:00Z"},
            "name": [
                {"use": "official", "family": "Ivanova", "given": ["Anna", "Petrovna"]},
                {"use": "nickname", "given": ["Anya"]}
            ],
            "birthDate": "1990-05-01"
        }"#;

        let patient = Patient::parse(input).expect("parse json");
        assert_eq!(patient.id.as_deref(), Some("5"));
        assert_eq!(patient.family.as_deref(), Some("Ivanova"));
        assert_eq!(patient.given, vec!["Anna", "Petrovna"]);
        assert_eq!(patient.birth_date.as_deref(), Some("1990-05-01"));
    }

    #[test]
    fn render_then_parse_keeps_fields() {
        let data = PatientResource {
            id: Some("7".into()),
            family: Some("Smith".into()),
            given: vec!["John".into()],
            birth_date: Some("1980-01-31".into()),
        };

        let json = Patient::render(&data).expect("render");
        assert!(json.contains(r#""resourceType":"Patient""#));
        assert_eq!(Patient::parse(&json).expect("reparse"), data);
    }

    #[test]
    fn renders_minimal_patient() {
        let json = Patient::render(&PatientResource::default()).expect("render");
        assert_eq!(json, r#"{"resourceType":"Patient"}"#);
    }

    #[test]
    fn rejects_wrong_resource_type() {
        let err = Patient::parse(r#"{"resourceType": "Encounter"}"#).expect_err("wrong type");
        match err {
            FhirError::InvalidInput(msg) => {
                assert!(msg.contains("Patient"));
                assert!(msg.contains("Encounter"));
            }
            other => panic!("expected InvalidInput error, got {other:?}"),
        }
    }

    #[test]
    fn reports_path_of_wrong_types() {
        let input = r#"{"resourceType": "Patient", "name": [{"given": "Anna"}]}"#;
        let err = Patient::parse(input).expect_err("wrong type");
        match err {
            FhirError::Translation(msg) => assert!(msg.contains("given"), "{msg}"),
            other => panic!("expected Translation error, got {other:?}"),
        }
    }
}
