//! FHIR `ValueSet` wire model, used for substitution type and reason codes.

use crate::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const VALUE_SET: &str = "ValueSet";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSet {
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose: Option<ValueSetCompose>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetCompose {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<ComposeInclude>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeInclude {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concept: Vec<ValueSetConcept>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetConcept {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Default for ValueSet {
    fn default() -> Self {
        Self {
            resource_type: VALUE_SET.to_owned(),
            id: None,
            url: None,
            compose: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Resource for ValueSet {
    const RESOURCE_TYPE: &'static str = VALUE_SET;

    fn resource_type(&self) -> &str {
        &self.resource_type
    }
}

impl ValueSet {
    /// Concepts of the first include that names no `system`.
    ///
    /// That include lists the local concept dictionary entries, whose codes are the ids the
    /// dispense record stores. Mapped includes (SNOMED, RxNorm...) are ignored.
    pub fn local_concepts(&self) -> &[ValueSetConcept] {
        self.compose
            .as_ref()
            .and_then(|c| c.include.iter().find(|i| i.system.is_none()))
            .map_or(&[], |i| i.concept.as_slice())
    }
}
