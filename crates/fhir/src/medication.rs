//! FHIR `Medication` wire model: a formulation that a dispense may select.

use crate::datatypes::CodeableConcept;
use crate::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const MEDICATION: &str = "Medication";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Medication {
    fn default() -> Self {
        Self {
            resource_type: MEDICATION.to_owned(),
            id: None,
            code: None,
            status: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Resource for Medication {
    const RESOURCE_TYPE: &'static str = MEDICATION;

    fn resource_type(&self) -> &str {
        &self.resource_type
    }
}

impl Medication {
    /// `Medication/<id>`.
    pub fn literal_reference(&self) -> Option<String> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("{MEDICATION}/{id}"))
    }

    /// Name shown for this formulation: code text, then first coding display, then id.
    pub fn drug_name(&self) -> String {
        let code = self.code.as_ref();
        code.and_then(|c| c.text.clone())
            .or_else(|| code.and_then(|c| c.coding.iter().find_map(|x| x.display.clone())))
            .or_else(|| self.id.clone())
            .unwrap_or_default()
    }
}
