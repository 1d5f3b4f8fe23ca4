//! FHIR `MedicationRequest` wire model (the order being filled).
//!
//! The dispensing core only reads orders; nothing here mutates them.

use crate::datatypes::{
    parse_fhir_datetime, CodeableConcept, Dosage, Period, Quantity, Reference,
};
use crate::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const MEDICATION_REQUEST: &str = "MedicationRequest";

/// A medication order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRequest {
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Recorded FHIR status, e.g. `active`, `completed`, `cancelled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication_reference: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication_codeable_concept: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authored_on: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dosage_instruction: Vec<Dosage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispense_request: Option<DispenseRequest>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Supply-related parts of an order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispenseRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_period: Option<Period>,
    /// Number of refills authorised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_repeats_allowed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for MedicationRequest {
    fn default() -> Self {
        Self {
            resource_type: MEDICATION_REQUEST.to_owned(),
            id: None,
            status: None,
            intent: None,
            medication_reference: None,
            medication_codeable_concept: None,
            subject: None,
            encounter: None,
            authored_on: None,
            dosage_instruction: Vec::new(),
            dispense_request: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Resource for MedicationRequest {
    const RESOURCE_TYPE: &'static str = MEDICATION_REQUEST;

    fn resource_type(&self) -> &str {
        &self.resource_type
    }
}

impl MedicationRequest {
    /// The concrete medication reference string, when the order names a formulation.
    ///
    /// Orders placed against a concept only (no formulation) return `None`.
    pub fn medication_reference_str(&self) -> Option<&str> {
        self.medication_reference.as_ref()?.literal()
    }

    /// `MedicationRequest/<id>`, the form used by `authorizingPrescription`.
    pub fn literal_reference(&self) -> Option<String> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("{MEDICATION_REQUEST}/{id}"))
    }

    /// `authoredOn` parsed as UTC, if present and well formed.
    pub fn authored_on_utc(&self) -> Option<DateTime<Utc>> {
        self.authored_on.as_deref().and_then(parse_fhir_datetime)
    }

    /// Quantity requested for dispensing.
    pub fn requested_quantity(&self) -> Option<&Quantity> {
        self.dispense_request.as_ref()?.quantity.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_resource, render_resource, FhirError};

    const SAMPLE: &str = r#"{
  "resourceType": "MedicationRequest",
  "id": "a1b2",
  "meta": {"lastUpdated": "2024-01-05T10:00:00.000+00:00"},
  "status": "active",
  "intent": "order",
  "medicationReference": {"reference": "Medication/111", "type": "Medication", "display": "Aspirin 81mg"},
  "subject": {"reference": "Patient/p1"},
  "encounter": {"reference": "Encounter/e1"},
  "authoredOn": "2024-01-05T10:00:00+00:00",
  "dosageInstruction": [{
    "text": "Take with water",
    "timing": {"code": {"coding": [{"code": "BID"}], "text": "Twice daily"}},
    "route": {"coding": [{"code": "PO"}], "text": "Oral"},
    "doseAndRate": [{"doseQuantity": {"value": 1.0, "unit": "Tablet", "code": "TAB"}}]
  }],
  "dispenseRequest": {
    "numberOfRepeatsAllowed": 2,
    "quantity": {"value": 30.0, "unit": "Tablet", "code": "TAB"}
  }
}"#;

    #[test]
    fn parses_order() {
        let order: MedicationRequest = parse_resource(SAMPLE).expect("parse order");
        assert_eq!(order.medication_reference_str(), Some("Medication/111"));
        assert_eq!(order.literal_reference().as_deref(), Some("MedicationRequest/a1b2"));
        assert_eq!(order.requested_quantity().and_then(|q| q.value), Some(30.0));
        assert_eq!(
            order
                .dispense_request
                .as_ref()
                .and_then(|d| d.number_of_repeats_allowed),
            Some(2)
        );
        assert!(order.authored_on_utc().is_some());
        assert!(order.extra.contains_key("meta"));
    }

    #[test]
    fn render_keeps_unknown_elements() {
        let order: MedicationRequest = parse_resource(SAMPLE).expect("parse order");
        let rendered = render_resource(&order).expect("render");
        let reparsed: MedicationRequest = parse_resource(&rendered).expect("reparse");
        assert_eq!(order, reparsed);
        assert!(rendered.contains("lastUpdated"));
    }

    #[test]
    fn rejects_other_resource_types() {
        let err = parse_resource::<MedicationRequest>(r#"{"resourceType": "Patient"}"#)
            .expect_err("should reject Patient");
        match err {
            FhirError::InvalidInput(msg) => assert!(msg.contains("Patient")),
            other => panic!("expected InvalidInput error, got {other:?}"),
        }
    }

    #[test]
    fn reports_path_of_wrong_types() {
        let input = r#"{
  "resourceType": "MedicationRequest",
  "dispenseRequest": {"numberOfRepeatsAllowed": "two"}
}"#;
        let err = parse_resource::<MedicationRequest>(input).expect_err("should reject");
        match err {
            FhirError::Translation(msg) => {
                assert!(msg.contains("numberOfRepeatsAllowed"), "{msg}");
            }
            other => panic!("expected Translation error, got {other:?}"),
        }
    }

    #[test]
    fn concept_only_order_has_no_reference() {
        let order = MedicationRequest {
            medication_codeable_concept: Some(CodeableConcept::from_code("1234AAA")),
            ..MedicationRequest::default()
        };
        assert_eq!(order.medication_reference_str(), None);
        assert_eq!(order.literal_reference(), None);
    }
}
