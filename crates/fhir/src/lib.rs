//! FHIR wire/boundary support for the dispensing workflow.
//!
//! This crate provides **wire models** and **parse/render helpers** for the resources that
//! cross the boundary between the dispensing core and the fetch collaborator:
//! - `MedicationRequest` (the order being filled)
//! - `MedicationDispense` (the record being edited)
//! - `Medication` (formulations a dispense may select)
//! - `ValueSet` (substitution type/reason codes)
//! - the order-entry configuration payload (routes, units, frequencies)
//!
//! This crate focuses on:
//! - FHIR JSON alignment (camelCase, optional elements omitted when absent)
//! - serialisation/deserialisation with path-aware error reporting
//! - small accessors that the core uses to read nested elements
//!
//! It performs no I/O. Unmodelled elements of the top-level resources are kept in a
//! flattened map so a parsed resource renders back with its unknown fields intact.

pub mod bundle;
pub mod datatypes;
pub mod medication;
pub mod medication_dispense;
pub mod medication_request;
pub mod order_config;
pub mod value_set;

pub use bundle::parse_resources;
pub use datatypes::{
    parse_fhir_datetime, CodeableConcept, Coding, DoseAndRate, Dosage, Period, Quantity,
    Reference, Timing,
};
pub use medication::Medication;
pub use medication_dispense::{
    MedicationDispense, Performer, PersistMethod, PersistRequest, Substitution,
};
pub use medication_request::{DispenseRequest, MedicationRequest};
pub use order_config::{ConfigEntry, OrderConfig};
pub use value_set::{ComposeInclude, ValueSet, ValueSetCompose, ValueSetConcept};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

/// A top-level FHIR resource carrying a `resourceType` discriminator.
pub trait Resource: Serialize + DeserializeOwned {
    /// The `resourceType` value this model accepts.
    const RESOURCE_TYPE: &'static str;

    /// The `resourceType` found on this instance.
    fn resource_type(&self) -> &str;
}

/// Parse a resource from FHIR JSON text.
///
/// This uses `serde_path_to_error` to surface a best-effort "path" (e.g.
/// `dosageInstruction[0].doseAndRate`) to the failing field when the JSON does not match the
/// wire model.
///
/// # Errors
///
/// Returns [`FhirError`] if:
/// - the text is not valid JSON, or has trailing content,
/// - any modelled field has an unexpected type,
/// - `resourceType` does not match `R::RESOURCE_TYPE`.
pub fn parse_resource<R: Resource>(json_text: &str) -> FhirResult<R> {
    let mut deserializer = serde_json::Deserializer::from_str(json_text);

    let wire = match serde_path_to_error::deserialize::<_, R>(&mut deserializer) {
        Ok(parsed) => parsed,
        Err(err) => return Err(schema_mismatch(R::RESOURCE_TYPE, err)),
    };
    deserializer.end()?;

    check_resource_type(wire)
}

/// Parse a resource from an already-decoded JSON value (for example a bundle entry).
pub fn resource_from_value<R: Resource>(value: serde_json::Value) -> FhirResult<R> {
    let wire = match serde_path_to_error::deserialize::<_, R>(value) {
        Ok(parsed) => parsed,
        Err(err) => return Err(schema_mismatch(R::RESOURCE_TYPE, err)),
    };

    check_resource_type(wire)
}

/// Render a resource as pretty-printed FHIR JSON.
pub fn render_resource<R: Resource>(resource: &R) -> FhirResult<String> {
    serde_json::to_string_pretty(resource).map_err(|e| {
        FhirError::Translation(format!("Failed to serialize {}: {e}", R::RESOURCE_TYPE))
    })
}

fn schema_mismatch(
    resource_type: &str,
    err: serde_path_to_error::Error<serde_json::Error>,
) -> FhirError {
    let path = err.path().to_string();
    let source = err.into_inner();
    let path = if path.is_empty() || path == "." {
        "<root>"
    } else {
        path.as_str()
    };
    FhirError::Translation(format!("{resource_type} schema mismatch at {path}: {source}"))
}

fn check_resource_type<R: Resource>(wire: R) -> FhirResult<R> {
    if wire.resource_type() != R::RESOURCE_TYPE {
        return Err(FhirError::InvalidInput(format!(
            "Expected resourceType '{}', got '{}'",
            R::RESOURCE_TYPE,
            wire.resource_type()
        )));
    }
    Ok(wire)
}
