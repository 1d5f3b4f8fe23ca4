//! Order-entry configuration payload.
//!
//! This is an OpenMRS REST payload rather than a FHIR resource, but it travels through the same
//! fetch collaborator and supplies the canonical route, unit and frequency lists.

use crate::{FhirError, FhirResult};
use serde::{Deserialize, Serialize};

/// One canonical option: an opaque id and its display text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub uuid: String,
    #[serde(default)]
    pub display: String,
}

impl ConfigEntry {
    pub fn new(uuid: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            display: display.into(),
        }
    }
}

/// Canonical lists used to populate the editable dosing fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfig {
    #[serde(default)]
    pub drug_routes: Vec<ConfigEntry>,
    #[serde(default)]
    pub drug_dosing_units: Vec<ConfigEntry>,
    #[serde(default)]
    pub drug_dispensing_units: Vec<ConfigEntry>,
    #[serde(default)]
    pub order_frequencies: Vec<ConfigEntry>,
}

impl OrderConfig {
    /// Parse the configuration payload from JSON text.
    ///
    /// Unknown members (duration units, care settings...) are ignored.
    pub fn parse(json_text: &str) -> FhirResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        let config = serde_path_to_error::deserialize::<_, OrderConfig>(&mut deserializer)
            .map_err(|err| {
                let path = err.path().to_string();
                FhirError::Translation(format!(
                    "Order config schema mismatch at {path}: {}",
                    err.into_inner()
                ))
            })?;
        deserializer.end()?;
        Ok(config)
    }
}
