//! FHIR `MedicationDispense` wire model (the record being edited).
//!
//! Responsibilities:
//! - Define the wire model the dispensing core edits and the fetch collaborator persists
//! - Provide read accessors for the nested elements the editor targets
//! - Describe the create/replace/delete requests for a record (no I/O is performed here)

use crate::datatypes::{CodeableConcept, Dosage, Quantity, Reference};
use crate::medication_request::MEDICATION_REQUEST;
use crate::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const MEDICATION_DISPENSE: &str = "MedicationDispense";

/// One act of dispensing against an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationDispense {
    pub resource_type: String,
    /// Server-assigned id; absent until the record has been created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorizing_prescription: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication_reference: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication_codeable_concept: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub performer: Vec<Performer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Reference>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_prepared: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_handed_over: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dosage_instruction: Vec<Dosage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitution: Option<Substitution>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Who performed the dispense.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performer {
    pub actor: Reference,
}

/// Whether a substitution was made, and how/why.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Substitution {
    pub was_substituted: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reason: Vec<CodeableConcept>,
}

impl Substitution {
    /// No substitution, with type and reason set to the empty coded value.
    pub fn none() -> Self {
        Self {
            was_substituted: false,
            type_: Some(CodeableConcept::empty()),
            reason: vec![CodeableConcept::empty()],
        }
    }

    pub fn type_code(&self) -> Option<&str> {
        self.type_.as_ref()?.first_code()
    }

    pub fn reason_code(&self) -> Option<&str> {
        self.reason.first()?.first_code()
    }

    /// True when neither type nor reason carries a selection.
    pub fn is_cleared(&self) -> bool {
        self.type_
            .as_ref()
            .map_or(true, CodeableConcept::is_empty_value)
            && self.reason.iter().all(CodeableConcept::is_empty_value)
    }
}

/// How a record should be persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistMethod {
    /// The record has no id yet.
    Create,
    /// The record replaces an existing server copy.
    Replace,
}

impl PersistMethod {
    pub fn http_method(self) -> &'static str {
        match self {
            PersistMethod::Create => "POST",
            PersistMethod::Replace => "PUT",
        }
    }
}

/// Description of a save request, relative to the FHIR base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistRequest {
    pub method: PersistMethod,
    pub path: String,
}

impl Default for MedicationDispense {
    fn default() -> Self {
        Self {
            resource_type: MEDICATION_DISPENSE.to_owned(),
            id: None,
            status: None,
            authorizing_prescription: Vec::new(),
            medication_reference: None,
            medication_codeable_concept: None,
            subject: None,
            performer: Vec::new(),
            location: None,
            type_: None,
            quantity: None,
            when_prepared: None,
            when_handed_over: None,
            dosage_instruction: Vec::new(),
            substitution: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Resource for MedicationDispense {
    const RESOURCE_TYPE: &'static str = MEDICATION_DISPENSE;

    fn resource_type(&self) -> &str {
        &self.resource_type
    }
}

impl MedicationDispense {
    /// The concrete medication reference string, if the record selects a formulation.
    pub fn medication_reference_str(&self) -> Option<&str> {
        self.medication_reference.as_ref()?.literal()
    }

    /// Literal reference of the originating order (`MedicationRequest/<id>`).
    pub fn authorizing_reference(&self) -> Option<&str> {
        self.authorizing_prescription.first()?.literal()
    }

    /// Id of the originating order.
    pub fn authorizing_request_id(&self) -> Option<&str> {
        self.authorizing_prescription
            .first()?
            .target_id(MEDICATION_REQUEST)
    }

    /// The single dosage instruction the workflow edits.
    pub fn dosage(&self) -> Option<&Dosage> {
        self.dosage_instruction.first()
    }

    pub fn dose_quantity(&self) -> Option<&Quantity> {
        self.dosage()?.dose_quantity()
    }

    /// Save request: create when there is no id yet, replace otherwise.
    pub fn persist_request(&self) -> PersistRequest {
        match self.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => PersistRequest {
                method: PersistMethod::Replace,
                path: format!("{MEDICATION_DISPENSE}/{id}"),
            },
            None => PersistRequest {
                method: PersistMethod::Create,
                path: MEDICATION_DISPENSE.to_owned(),
            },
        }
    }

    /// Path of the delete request for a stored record.
    pub fn delete_path(id: &str) -> String {
        format!("{MEDICATION_DISPENSE}/{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_resource, render_resource};

    const SAMPLE: &str = r#"{
  "resourceType": "MedicationDispense",
  "id": "d-1",
  "status": "completed",
  "authorizingPrescription": [{"reference": "MedicationRequest/a1b2", "type": "MedicationRequest"}],
  "medicationReference": {"reference": "Medication/222", "display": "Aspirin 325mg"},
  "performer": [{"actor": {"reference": "Practitioner/pr1"}}],
  "location": {"reference": "Location/l1"},
  "quantity": {"value": 30.0, "code": "TAB"},
  "whenHandedOver": "2024-01-06T09:30:00Z",
  "dosageInstruction": [{"text": "Take with water", "doseAndRate": [{"doseQuantity": {"value": 1.0, "code": "TAB"}}]}],
  "substitution": {
    "wasSubstituted": true,
    "type": {"coding": [{"code": "G"}]},
    "reason": [{"coding": [{"code": "OS"}]}]
  },
  "note": [{"text": "kept"}]
}"#;

    #[test]
    fn parses_dispense() {
        let dispense: MedicationDispense = parse_resource(SAMPLE).expect("parse dispense");
        assert_eq!(dispense.medication_reference_str(), Some("Medication/222"));
        assert_eq!(
            dispense.authorizing_reference(),
            Some("MedicationRequest/a1b2")
        );
        assert_eq!(dispense.authorizing_request_id(), Some("a1b2"));
        assert_eq!(dispense.dose_quantity().and_then(|q| q.value), Some(1.0));

        let substitution = dispense.substitution.as_ref().expect("substitution");
        assert!(substitution.was_substituted);
        assert_eq!(substitution.type_code(), Some("G"));
        assert_eq!(substitution.reason_code(), Some("OS"));
        assert!(!substitution.is_cleared());
        assert!(dispense.extra.contains_key("note"));
    }

    #[test]
    fn round_trips_sample_json() {
        let dispense: MedicationDispense = parse_resource(SAMPLE).expect("parse");
        let output = render_resource(&dispense).expect("render");
        let reparsed: MedicationDispense = parse_resource(&output).expect("reparse");
        assert_eq!(dispense, reparsed);
    }

    #[test]
    fn none_substitution_is_cleared() {
        let none = Substitution::none();
        assert!(!none.was_substituted);
        assert!(none.is_cleared());
        assert_eq!(none.type_code(), None);
        assert_eq!(none.reason.len(), 1);
    }

    #[test]
    fn persist_request_depends_on_id() {
        let mut dispense = MedicationDispense::default();
        assert_eq!(
            dispense.persist_request(),
            PersistRequest {
                method: PersistMethod::Create,
                path: "MedicationDispense".into()
            }
        );

        dispense.id = Some("d-1".into());
        let request = dispense.persist_request();
        assert_eq!(request.method, PersistMethod::Replace);
        assert_eq!(request.method.http_method(), "PUT");
        assert_eq!(request.path, "MedicationDispense/d-1");
        assert_eq!(MedicationDispense::delete_path("d-1"), "MedicationDispense/d-1");
    }
}
