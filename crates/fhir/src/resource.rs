//! Closed sum type over the resources the relay understands.

use crate::bundle::{self, Bundle};
use crate::encounter::{self, Encounter, EncounterResource};
use crate::patient::{self, Patient, PatientResource};
use crate::{resource_type_of, FhirError, FhirResult};
use serde_json::Value;

/// A decoded resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    Patient(PatientResource),
    Encounter(EncounterResource),
    Bundle(Bundle),
    /// Any other well-formed resource; carries its `resourceType`.
    Unsupported(String),
}

impl Resource {
    /// Decode a single resource or bundle from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the payload is not well-formed JSON, is not an
    /// object, has no `resourceType`, or a known resource has malformed fields.
    pub fn parse(json_text: &str) -> FhirResult<Self> {
        let value: Value = serde_json::from_str(json_text)?;
        Self::from_value(value)
    }

    /// Encode as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] for [`Resource::Unsupported`], which has
    /// no content to render.
    pub fn render(&self) -> FhirResult<String> {
        Ok(serde_json::to_string(&self.to_value()?)?)
    }

    pub fn resource_type(&self) -> &str {
        match self {
            Resource::Patient(_) => patient::RESOURCE_TYPE,
            Resource::Encounter(_) => encounter::RESOURCE_TYPE,
            Resource::Bundle(_) => bundle::RESOURCE_TYPE,
            Resource::Unsupported(resource_type) => resource_type,
        }
    }

    pub(crate) fn from_value(value: Value) -> FhirResult<Self> {
        let resource_type = resource_type_of(&value)?.to_string();
        match resource_type.as_str() {
            patient::RESOURCE_TYPE => Patient::from_value(value).map(Resource::Patient),
            encounter::RESOURCE_TYPE => Encounter::from_value(value).map(Resource::Encounter),
            bundle::RESOURCE_TYPE => Bundle::from_value(value).map(Resource::Bundle),
            _ => Ok(Resource::Unsupported(resource_type)),
        }
    }

    pub(crate) fn to_value(&self) -> FhirResult<Value> {
        match self {
            Resource::Patient(data) => Patient::to_value(data),
            Resource::Encounter(data) => Encounter::to_value(data),
            Resource::Bundle(bundle) => bundle.to_value(),
            Resource::Unsupported(resource_type) => Err(FhirError::InvalidInput(format!(
                "cannot render unsupported resource '{resource_type}'"
            ))),
        }
    }
}

impl From<PatientResource> for Resource {
    fn from(data: PatientResource) -> Self {
        Resource::Patient(data)
    }
}

impl From<EncounterResource> for Resource {
    fn from(data: EncounterResource) -> Self {
        Resource::Encounter(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_resource_type() {
        let patient = Resource::parse(r#"{"resourceType": "Patient", "id": "1"}"#).expect("patient");
        assert!(matches!(patient, Resource::Patient(_)));
        assert_eq!(patient.resource_type(), "Patient");

        let encounter =
            Resource::parse(r#"{"resourceType": "Encounter", "status": "planned"}"#).expect("encounter");
        assert!(matches!(encounter, Resource::Encounter(_)));

        let bundle = Resource::parse(r#"{"resourceType": "Bundle", "entry": []}"#).expect("bundle");
        assert!(matches!(bundle, Resource::Bundle(_)));
    }

    #[test]
    fn unknown_types_are_unsupported_not_errors() {
        let resource = Resource::parse(r#"{"resourceType": "Observation", "status": "final"}"#)
            .expect("well-formed observation");
        assert_eq!(resource, Resource::Unsupported("Observation".into()));
        assert_eq!(resource.resource_type(), "Observation");
        assert!(resource.render().is_err());
    }

    #[test]
    fn missing_resource_type_is_a_decode_error() {
        assert!(matches!(
            Resource::parse(r#"{"id": "1"}"#),
            Err(FhirError::MissingResourceType)
        ));
        assert!(matches!(
            Resource::parse(r#"{"resourceType": ""}"#),
            Err(FhirError::MissingResourceType)
        ));
        assert!(matches!(
            Resource::parse(r#"["Patient"]"#),
            Err(FhirError::InvalidInput(_))
        ));
        assert!(matches!(
            Resource::parse("HELLO"),
            Err(FhirError::InvalidJson(_))
        ));
    }

    #[test]
    fn renders_through_the_matching_codec() {
        let resource = Resource::from(EncounterResource {
            subject: Some("Patient/2".into()),
            ..Default::default()
        });
        let json = resource.render().expect("render");
        assert_eq!(Resource::parse(&json).expect("reparse"), resource);
    }
}
