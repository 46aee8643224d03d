//! FHIR wire/boundary support for the clinical relay.
//!
//! This crate provides **wire models** and **format/translation helpers** for the
//! JSON resources exchanged between the registry and the practitioner endpoint:
//! - Patient and Encounter resources
//! - collection Bundles used for full resync
//!
//! This crate focuses on:
//! - serialisation/deserialisation of the JSON resource form
//! - a closed [`Resource`] sum type for dispatch
//! - flat carriers exposing only the fields the relay reads
//!
//! Untyped JSON values are confined to this crate. Callers only ever see the flat
//! carriers ([`PatientResource`], [`EncounterResource`]) and [`Bundle`].

pub mod bundle;
pub mod encounter;
pub mod patient;
pub mod resource;

// Re-export facades
pub use encounter::Encounter;
pub use patient::Patient;

// Re-export public domain-level types
pub use bundle::Bundle;
pub use encounter::EncounterResource;
pub use patient::PatientResource;
pub use resource::Resource;

/// Media type for resource payloads.
pub const FHIR_JSON: &str = "application/fhir+json";

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("missing resourceType")]
    MissingResourceType,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

/// Deserialize a typed wire struct from a JSON value, naming the failing field path.
pub(crate) fn from_wire_value<T>(value: serde_json::Value, resource_type: &str) -> FhirResult<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>"
        } else {
            path.as_str()
        };
        FhirError::Translation(format!(
            "{resource_type} schema mismatch at {path}: {source}"
        ))
    })
}

/// Check that a JSON value is an object carrying the expected `resourceType`.
pub(crate) fn expect_resource_type(value: &serde_json::Value, expected: &str) -> FhirResult<()> {
    match resource_type_of(value)? {
        actual if actual == expected => Ok(()),
        actual => Err(FhirError::InvalidInput(format!(
            "Expected resourceType '{expected}', got '{actual}'"
        ))),
    }
}

pub(crate) fn resource_type_of(value: &serde_json::Value) -> FhirResult<&str> {
    let object = value
        .as_object()
        .ok_or_else(|| FhirError::InvalidInput("resource must be a JSON object".into()))?;
    object
        .get("resourceType")
        .and_then(serde_json::Value::as_str)
        .filter(|rt| !rt.is_empty())
        .ok_or(FhirError::MissingResourceType)
}
