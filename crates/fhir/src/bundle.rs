//! Collection bundles used for bulk sync.
//!
//! A bundle is rendered as a `collection` with one `entry[].resource` per member.
//! On parse, entries without a `resource` are skipped and members of an unknown
//! type are kept as [`Resource::Unsupported`] so callers can count what they ignore.

use crate::resource::Resource;
use crate::{expect_resource_type, from_wire_value, FhirResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const RESOURCE_TYPE: &str = "Bundle";
const COLLECTION: &str = "collection";

/// An ordered sequence of resources.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bundle {
    pub entries: Vec<Resource>,
}

impl Bundle {
    pub fn new(entries: Vec<Resource>) -> Self {
        Self { entries }
    }

    /// Parse a bundle from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if the text is not a well-formed bundle or any
    /// member fails to decode.
    pub fn parse(json_text: &str) -> FhirResult<Self> {
        let value: Value = serde_json::from_str(json_text)?;
        Self::from_value(value)
    }

    /// Render the bundle as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if a member cannot be rendered.
    pub fn render(&self) -> FhirResult<String> {
        Ok(serde_json::to_string(&self.to_value()?)?)
    }

    /// Members that are encounters, in bundle order.
    pub fn encounters(&self) -> impl Iterator<Item = &crate::EncounterResource> {
        self.entries.iter().filter_map(|entry| match entry {
            Resource::Encounter(encounter) => Some(encounter),
            _ => None,
        })
    }

    pub(crate) fn from_value(value: Value) -> FhirResult<Self> {
        expect_resource_type(&value, RESOURCE_TYPE)?;
        let wire: BundleWire = from_wire_value(value, RESOURCE_TYPE)?;
        let entries = wire
            .entry
            .into_iter()
            .filter_map(|entry| entry.resource)
            .map(Resource::from_value)
            .collect::<FhirResult<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub(crate) fn to_value(&self) -> FhirResult<Value> {
        let entry = self
            .entries
            .iter()
            .map(|resource| {
                Ok(BundleEntryWire {
                    resource: Some(resource.to_value()?),
                })
            })
            .collect::<FhirResult<Vec<_>>>()?;

        let wire = BundleWire {
            resource_type: RESOURCE_TYPE.to_string(),
            bundle_type: Some(COLLECTION.to_string()),
            entry,
        };
        Ok(serde_json::to_value(wire)?)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct BundleWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    bundle_type: Option<String>,

    #[serde(default)]
    entry: Vec<BundleEntryWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct BundleEntryWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EncounterResource;

    #[test]
    fn parses_collection_of_encounters() {
        let input = r#"{
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                {"resource": {"resourceType": "Encounter", "id": "1", "subject": {"reference": "Patient/1"}}},
                {"fullUrl": "urn:uuid:skipped"},
                {"resource": {"resourceType": "Observation", "id": "9"}},
                {"resource": {"resourceType": "Encounter", "id": "2", "subject": {"reference": "Patient/2"}}}
            ]
        }"#;

        let bundle = Bundle::parse(input).expect("parse bundle");
        assert_eq!(bundle.entries.len(), 3);
        assert_eq!(bundle.entries[1], Resource::Unsupported("Observation".into()));

        let ids: Vec<_> = bundle.encounters().filter_map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn empty_bundle_has_no_entries() {
        let bundle = Bundle::parse(r#"{"resourceType": "Bundle"}"#).expect("parse");
        assert!(bundle.entries.is_empty());

        let json = Bundle::default().render().expect("render");
        let value: Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["resourceType"], "Bundle");
        assert_eq!(value["type"], "collection");
        assert_eq!(value["entry"], serde_json::json!([]));
    }

    #[test]
    fn render_then_parse_keeps_members() {
        let bundle = Bundle::new(vec![Resource::Encounter(EncounterResource {
            id: Some("3".into()),
            status: Some("finished".into()),
            subject: Some("Patient/4".into()),
            participant_display: Some("Dr. Grey".into()),
            period_start: Some("2024-02-03T04:05:06+00:00".into()),
            reason_text: Some("Follow-up".into()),
        })]);

        let json = bundle.render().expect("render");
        let value: Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["type"], "collection");
        assert_eq!(value["entry"][0]["resource"]["resourceType"], "Encounter");

        assert_eq!(Bundle::parse(&json).expect("reparse"), bundle);
    }

    #[test]
    fn unsupported_members_cannot_be_rendered() {
        let bundle = Bundle::new(vec![Resource::Unsupported("Observation".into())]);
        assert!(bundle.render().is_err());
    }
}
