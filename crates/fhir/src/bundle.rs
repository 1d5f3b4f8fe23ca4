//! Reading several resources at once from a searchset `Bundle` or a plain JSON array.

use crate::{resource_from_value, FhirError, FhirResult, Resource};
use serde_json::Value;

/// Parse resources of type `R` from either a JSON array or a `Bundle`.
///
/// Bundle entries carrying a different `resourceType` (for example included `Medication`
/// resources in a `MedicationRequest` search) are skipped. Array elements must all be `R`.
pub fn parse_resources<R: Resource>(json_text: &str) -> FhirResult<Vec<R>> {
    let value: Value = serde_json::from_str(json_text)?;

    match value {
        Value::Array(items) => items.into_iter().map(resource_from_value).collect(),
        Value::Object(mut map) => {
            if map.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
                return Ok(vec![resource_from_value(Value::Object(map))?]);
            }
            let entries = match map.remove("entry") {
                Some(Value::Array(entries)) => entries,
                _ => Vec::new(),
            };
            entries
                .into_iter()
                .filter_map(|mut entry| entry.get_mut("resource").map(Value::take))
                .filter(|resource| {
                    resource.get("resourceType").and_then(Value::as_str) == Some(R::RESOURCE_TYPE)
                })
                .map(resource_from_value)
                .collect()
        }
        _ => Err(FhirError::InvalidInput(format!(
            "Expected a {} resource, an array, or a Bundle",
            R::RESOURCE_TYPE
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MedicationRequest;

    #[test]
    fn reads_bundle_and_skips_included_resources() {
        let input = r#"{
  "resourceType": "Bundle",
  "type": "searchset",
  "entry": [
    {"resource": {"resourceType": "MedicationRequest", "id": "a"}},
    {"resource": {"resourceType": "Medication", "id": "m"}},
    {"resource": {"resourceType": "MedicationRequest", "id": "b"}}
  ]
}"#;
        let orders: Vec<MedicationRequest> = parse_resources(input).expect("parse bundle");
        let ids: Vec<_> = orders.iter().filter_map(|o| o.id.as_deref()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn reads_array_and_single_resource() {
        let orders: Vec<MedicationRequest> =
            parse_resources(r#"[{"resourceType": "MedicationRequest", "id": "a"}]"#)
                .expect("parse array");
        assert_eq!(orders.len(), 1);

        let single: Vec<MedicationRequest> =
            parse_resources(r#"{"resourceType": "MedicationRequest", "id": "z"}"#)
                .expect("parse single");
        assert_eq!(single[0].id.as_deref(), Some("z"));
    }

    #[test]
    fn rejects_scalars_and_foreign_array_items() {
        assert!(parse_resources::<MedicationRequest>("42").is_err());
        assert!(parse_resources::<MedicationRequest>(r#"[{"resourceType": "Patient"}]"#).is_err());
    }
}
