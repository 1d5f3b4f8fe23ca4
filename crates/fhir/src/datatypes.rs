//! FHIR complex datatypes shared by the resource models.
//!
//! Only the elements the dispensing workflow reads or writes are modelled. `Dosage` and
//! `Timing` keep any other elements in a flattened map because edits to a single dosage field
//! must carry every sibling element across unchanged.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A code defined by a terminology system.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// A concept that may be defined by one or more codings, plus free text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// The "empty coded value": a single coding with no code.
    ///
    /// This is what a cleared selection looks like on the wire, as opposed to the element
    /// being absent altogether.
    pub fn empty() -> Self {
        Self {
            coding: vec![Coding::default()],
            text: None,
        }
    }

    /// A concept holding exactly one coding with the given code and nothing else.
    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            coding: vec![Coding {
                code: Some(code.into()),
                ..Coding::default()
            }],
            text: None,
        }
    }

    /// Code of the first coding, if any.
    pub fn first_code(&self) -> Option<&str> {
        self.coding.first().and_then(|c| c.code.as_deref())
    }

    /// Code of the first coding that has no `system`.
    ///
    /// Codings without a system carry the local concept identifier.
    pub fn local_code(&self) -> Option<&str> {
        self.coding
            .iter()
            .find(|c| c.system.is_none())
            .and_then(|c| c.code.as_deref())
    }

    /// True when no coding carries a code and there is no text.
    pub fn is_empty_value(&self) -> bool {
        self.coding.iter().all(|c| c.code.is_none()) && self.text.is_none()
    }
}

/// A reference from one resource to another.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    /// A reference holding only the given literal reference string.
    pub fn to(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Self::default()
        }
    }

    /// The literal reference, when it is present and non-empty.
    pub fn literal(&self) -> Option<&str> {
        self.reference.as_deref().filter(|r| !r.is_empty())
    }

    /// Id part of a `<resource_type>/<id>` reference.
    pub fn target_id(&self, resource_type: &str) -> Option<&str> {
        self.literal()?
            .strip_prefix(resource_type)?
            .strip_prefix('/')
            .filter(|id| !id.is_empty())
    }
}

/// A measured amount.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quantity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Quantity {
    /// A quantity carrying only a value and a unit code.
    ///
    /// Any `unit` display or `system` is deliberately absent.
    pub fn with_code(value: Option<f64>, code: Option<String>) -> Self {
        Self {
            value,
            code,
            ..Self::default()
        }
    }
}

/// A time range.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// When a medication should be taken.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    /// Frequency code, e.g. "twice daily".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Amount of medication per dose.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseAndRate {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_quantity: Option<Quantity>,
}

/// How a medication should be taken.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dosage {
    /// Free-text patient instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_needed_boolean: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_and_rate: Option<Vec<DoseAndRate>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Dosage {
    /// Dose quantity of the first dose-and-rate entry.
    pub fn dose_quantity(&self) -> Option<&Quantity> {
        self.dose_and_rate
            .as_ref()?
            .first()?
            .dose_quantity
            .as_ref()
    }

    /// Frequency concept from the timing element.
    pub fn frequency(&self) -> Option<&CodeableConcept> {
        self.timing.as_ref()?.code.as_ref()
    }
}

/// Parse a FHIR `dateTime` (or `date`) into UTC.
///
/// Accepts full RFC 3339 values, local date-times without an offset (read as UTC), and bare
/// dates (read as midnight UTC). Returns `None` for anything else.
pub fn parse_fhir_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    // OpenMRS renders offsets without a colon, e.g. 2024-01-05T10:00:00.000+0000
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
