//! Field-level edits of a dispense record.
//!
//! Every edit produces a new record; the input is only borrowed. Edits reaching into the
//! dosage keep the record to a single dosage instruction with a single dose-and-rate entry,
//! creating them when absent.
//!
//! Unit edits (dispensing unit, dose unit) replace the whole quantity with `{value, code}`:
//! a `unit` display or `system` inherited from the order describes the old code and must not
//! survive the switch.

use crate::{DispenseError, DispenseResult};
use dispense_types::{InputError, NonNegativeNumber};
use fhir::{
    CodeableConcept, Dosage, DoseAndRate, MedicationDispense, Quantity, Reference, Substitution,
};

/// One change to one field of a dispense record.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldEdit {
    QuantityValue(NonNegativeNumber),
    QuantityUnit(String),
    DoseValue(NonNegativeNumber),
    DoseUnit(String),
    Route(String),
    Frequency(String),
    Instructions(String),
    /// Select a formulation; clears any coded-concept medication.
    Medication {
        reference: String,
        display: Option<String>,
    },
    SubstitutionType(String),
    SubstitutionReason(String),
    /// Replace the substitution sub-record. Written by the detector only; the workflow
    /// refuses it as a user edit.
    Substitution(Substitution),
}

impl FieldEdit {
    /// Quantity edit from raw form input.
    ///
    /// # Errors
    ///
    /// [`DispenseError::InvalidNumericInput`] when the text is not a non-negative number.
    pub fn quantity_value(input: &str) -> DispenseResult<Self> {
        parse_number("quantity", input).map(FieldEdit::QuantityValue)
    }

    /// Dose edit from raw form input.
    pub fn dose_value(input: &str) -> DispenseResult<Self> {
        parse_number("dose", input).map(FieldEdit::DoseValue)
    }

    /// Edits behind the modify-details privilege.
    ///
    /// Free-text instructions and the substitution type/reason stay editable for everyone who
    /// can dispense.
    pub fn requires_modify_privilege(&self) -> bool {
        matches!(
            self,
            FieldEdit::QuantityValue(_)
                | FieldEdit::QuantityUnit(_)
                | FieldEdit::DoseValue(_)
                | FieldEdit::DoseUnit(_)
                | FieldEdit::Route(_)
                | FieldEdit::Frequency(_)
                | FieldEdit::Medication { .. }
        )
    }

    /// Edits whose value is derived from other fields rather than entered.
    pub fn is_derived(&self) -> bool {
        matches!(self, FieldEdit::Substitution(_))
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            FieldEdit::QuantityValue(_) => "quantity",
            FieldEdit::QuantityUnit(_) => "quantity unit",
            FieldEdit::DoseValue(_) => "dose",
            FieldEdit::DoseUnit(_) => "dose unit",
            FieldEdit::Route(_) => "route",
            FieldEdit::Frequency(_) => "frequency",
            FieldEdit::Instructions(_) => "patient instructions",
            FieldEdit::Medication { .. } => "medication",
            FieldEdit::SubstitutionType(_) => "substitution type",
            FieldEdit::SubstitutionReason(_) => "substitution reason",
            FieldEdit::Substitution(_) => "substitution",
        }
    }
}

fn parse_number(field: &'static str, input: &str) -> DispenseResult<NonNegativeNumber> {
    NonNegativeNumber::parse(input)
        .map_err(|source: InputError| DispenseError::InvalidNumericInput { field, source })
}

/// Apply one edit, returning the edited copy.
pub fn apply(record: &MedicationDispense, edit: &FieldEdit) -> MedicationDispense {
    let mut next = record.clone();

    match edit {
        FieldEdit::QuantityValue(value) => {
            next.quantity.get_or_insert_with(Quantity::default).value = Some(value.get());
        }
        FieldEdit::QuantityUnit(code) => {
            let value = record.quantity.as_ref().and_then(|q| q.value);
            next.quantity = Some(Quantity::with_code(value, Some(code.clone())));
        }
        FieldEdit::DoseValue(value) => {
            let entry = single_dose_and_rate(&mut next);
            entry.dose_quantity.get_or_insert_with(Quantity::default).value = Some(value.get());
        }
        FieldEdit::DoseUnit(code) => {
            let value = record.dose_quantity().and_then(|q| q.value);
            let entry = single_dose_and_rate(&mut next);
            entry.dose_quantity = Some(Quantity::with_code(value, Some(code.clone())));
        }
        FieldEdit::Route(code) => {
            single_dosage(&mut next).route = Some(CodeableConcept::from_code(code.clone()));
        }
        FieldEdit::Frequency(code) => {
            let timing = single_dosage(&mut next).timing.get_or_insert_with(Default::default);
            timing.code = Some(CodeableConcept::from_code(code.clone()));
        }
        FieldEdit::Instructions(text) => {
            single_dosage(&mut next).text = Some(text.clone());
        }
        FieldEdit::Medication { reference, display } => {
            next.medication_codeable_concept = None;
            next.medication_reference = Some(Reference {
                reference: Some(reference.clone()),
                type_: None,
                display: display.clone(),
            });
        }
        FieldEdit::SubstitutionType(code) => {
            let substitution = next.substitution.get_or_insert_with(Substitution::none);
            substitution.type_ = Some(CodeableConcept::from_code(code.clone()));
        }
        FieldEdit::SubstitutionReason(code) => {
            let substitution = next.substitution.get_or_insert_with(Substitution::none);
            substitution.reason = vec![CodeableConcept::from_code(code.clone())];
        }
        FieldEdit::Substitution(substitution) => {
            next.substitution = Some(substitution.clone());
        }
    }

    next
}

/// True when `after` differs from `before` in any field behind the modify-details privilege:
/// quantity and its unit, dose and its unit, route, frequency, or the medication.
pub fn changes_gated_fields(before: &MedicationDispense, after: &MedicationDispense) -> bool {
    let route = |r: &MedicationDispense| r.dosage().and_then(|d| d.route.clone());
    let frequency = |r: &MedicationDispense| r.dosage().and_then(|d| d.frequency().cloned());

    before.quantity != after.quantity
        || before.dose_quantity() != after.dose_quantity()
        || route(before) != route(after)
        || frequency(before) != frequency(after)
        || before.medication_reference != after.medication_reference
        || before.medication_codeable_concept != after.medication_codeable_concept
}

/// Apply an edit to the record at `position`, returning the new collection.
///
/// # Errors
///
/// [`DispenseError::RecordNotFound`] when `position` is out of range.
pub fn update_at(
    collection: &[MedicationDispense],
    position: usize,
    edit: &FieldEdit,
) -> DispenseResult<Vec<MedicationDispense>> {
    let target = collection
        .get(position)
        .ok_or(DispenseError::RecordNotFound(position))?;
    let updated = apply(target, edit);
    replace_at(collection, position, updated)
}

/// Replace the record at `position` wholesale, returning the new collection.
pub fn replace_at(
    collection: &[MedicationDispense],
    position: usize,
    record: MedicationDispense,
) -> DispenseResult<Vec<MedicationDispense>> {
    if position >= collection.len() {
        return Err(DispenseError::RecordNotFound(position));
    }
    let mut next = collection.to_vec();
    next[position] = record;
    Ok(next)
}

/// The record's only dosage instruction, created when missing and truncated to one.
fn single_dosage(record: &mut MedicationDispense) -> &mut Dosage {
    record.dosage_instruction.truncate(1);
    if record.dosage_instruction.is_empty() {
        record.dosage_instruction.push(Dosage::default());
    }
    &mut record.dosage_instruction[0]
}

/// The only dose-and-rate entry of the only dosage instruction.
fn single_dose_and_rate(record: &mut MedicationDispense) -> &mut DoseAndRate {
    let entries = single_dosage(record)
        .dose_and_rate
        .get_or_insert_with(Vec::new);
    entries.truncate(1);
    if entries.is_empty() {
        entries.push(DoseAndRate::default());
    }
    &mut entries[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir::{Coding, Timing};

    fn record() -> MedicationDispense {
        let mut timing = Timing {
            code: Some(CodeableConcept {
                coding: vec![Coding {
                    code: Some("f-bid".into()),
                    ..Coding::default()
                }],
                text: Some("Twice daily".into()),
            }),
            ..Timing::default()
        };
        timing
            .extra
            .insert("repeat".into(), serde_json::json!({"duration": 5}));

        MedicationDispense {
            id: Some("d-1".into()),
            medication_reference: Some(Reference::to("Medication/111")),
            quantity: Some(Quantity {
                value: Some(30.0),
                unit: Some("Tablet".into()),
                system: Some("http://x".into()),
                code: Some("u-tab".into()),
            }),
            dosage_instruction: vec![Dosage {
                text: Some("Take with water".into()),
                timing: Some(timing),
                route: Some(CodeableConcept::from_code("r-oral")),
                dose_and_rate: Some(vec![DoseAndRate {
                    type_: None,
                    dose_quantity: Some(Quantity {
                        value: Some(2.0),
                        code: Some("mg".into()),
                        unit: Some("milligram".into()),
                        system: Some("http://x".into()),
                    }),
                }]),
                ..Dosage::default()
            }],
            substitution: Some(Substitution::none()),
            ..MedicationDispense::default()
        }
    }

    #[test]
    fn dose_unit_switch_drops_display_and_system() {
        let before = record();
        let snapshot = before.clone();

        let after = apply(&before, &FieldEdit::DoseUnit("mL".into()));

        assert_eq!(
            after.dose_quantity(),
            Some(&Quantity::with_code(Some(2.0), Some("mL".into())))
        );
        assert_eq!(before, snapshot);
        // Only the dose quantity changed.
        let mut expected = snapshot.clone();
        expected.dosage_instruction[0].dose_and_rate.as_mut().unwrap()[0].dose_quantity =
            Some(Quantity::with_code(Some(2.0), Some("mL".into())));
        assert_eq!(after, expected);
    }

    #[test]
    fn quantity_unit_switch_keeps_value_only() {
        let after = apply(&record(), &FieldEdit::QuantityUnit("u-box".into()));
        assert_eq!(
            after.quantity,
            Some(Quantity::with_code(Some(30.0), Some("u-box".into())))
        );
    }

    #[test]
    fn quantity_value_keeps_unit_fields() {
        let edit = FieldEdit::quantity_value("12").expect("valid quantity");
        let after = apply(&record(), &edit);
        let quantity = after.quantity.expect("quantity");
        assert_eq!(quantity.value, Some(12.0));
        assert_eq!(quantity.unit.as_deref(), Some("Tablet"));
        assert_eq!(quantity.code.as_deref(), Some("u-tab"));
    }

    #[test]
    fn dose_value_keeps_unit_fields() {
        let edit = FieldEdit::dose_value("2.5").expect("valid dose");
        let after = apply(&record(), &edit);
        let dose = after.dose_quantity().expect("dose");
        assert_eq!(dose.value, Some(2.5));
        assert_eq!(dose.unit.as_deref(), Some("milligram"));
    }

    #[test]
    fn invalid_numbers_are_rejected_at_the_boundary() {
        let err = FieldEdit::quantity_value("-3").expect_err("negative");
        match err {
            DispenseError::InvalidNumericInput { field, source } => {
                assert_eq!(field, "quantity");
                assert_eq!(source, InputError::Negative("-3".into()));
            }
            other => panic!("expected InvalidNumericInput, got {other:?}"),
        }
        assert!(FieldEdit::dose_value("abc").is_err());
        assert!(FieldEdit::dose_value("").is_err());
    }

    #[test]
    fn frequency_edit_keeps_other_timing_fields() {
        let after = apply(&record(), &FieldEdit::Frequency("f-tid".into()));
        let timing = after.dosage_instruction[0].timing.as_ref().expect("timing");
        assert_eq!(timing.code, Some(CodeableConcept::from_code("f-tid")));
        assert_eq!(
            timing.extra.get("repeat"),
            Some(&serde_json::json!({"duration": 5}))
        );
    }

    #[test]
    fn route_and_instructions_edits() {
        let after = apply(&record(), &FieldEdit::Route("r-iv".into()));
        assert_eq!(
            after.dosage_instruction[0].route,
            Some(CodeableConcept::from_code("r-iv"))
        );
        assert_eq!(
            after.dosage_instruction[0].text.as_deref(),
            Some("Take with water")
        );

        let after = apply(&after, &FieldEdit::Instructions("At night".into()));
        assert_eq!(after.dosage_instruction[0].text.as_deref(), Some("At night"));
    }

    #[test]
    fn medication_edit_clears_coded_concept() {
        let mut before = record();
        before.medication_reference = None;
        before.medication_codeable_concept = Some(CodeableConcept::from_code("concept-1"));

        let after = apply(
            &before,
            &FieldEdit::Medication {
                reference: "Medication/222".into(),
                display: Some("Aspirin 325mg".into()),
            },
        );
        assert_eq!(after.medication_codeable_concept, None);
        assert_eq!(after.medication_reference_str(), Some("Medication/222"));
        assert_eq!(
            after
                .medication_reference
                .as_ref()
                .and_then(|r| r.display.as_deref()),
            Some("Aspirin 325mg")
        );
    }

    #[test]
    fn substitution_type_and_reason_edits() {
        let after = apply(&record(), &FieldEdit::SubstitutionType("G".into()));
        let after = apply(&after, &FieldEdit::SubstitutionReason("OS".into()));
        let substitution = after.substitution.expect("substitution");
        assert_eq!(substitution.type_code(), Some("G"));
        assert_eq!(substitution.reason_code(), Some("OS"));
        assert_eq!(substitution.reason.len(), 1);
    }

    #[test]
    fn dosage_edits_create_missing_containers() {
        let bare = MedicationDispense::default();
        let after = apply(&bare, &FieldEdit::DoseUnit("mL".into()));
        assert_eq!(after.dosage_instruction.len(), 1);
        assert_eq!(
            after.dose_quantity(),
            Some(&Quantity::with_code(None, Some("mL".into())))
        );
        assert!(bare.dosage_instruction.is_empty());
    }

    #[test]
    fn update_at_rebuilds_only_the_target() {
        let collection = vec![record(), record()];
        let snapshot = collection.clone();

        let next = update_at(&collection, 1, &FieldEdit::Route("r-iv".into())).expect("update");
        assert_eq!(collection, snapshot);
        assert_eq!(next[0], snapshot[0]);
        assert_eq!(
            next[1].dosage_instruction[0].route,
            Some(CodeableConcept::from_code("r-iv"))
        );

        let err = update_at(&collection, 2, &FieldEdit::Route("r-iv".into()))
            .expect_err("out of range");
        assert!(matches!(err, DispenseError::RecordNotFound(2)));
    }

    #[test]
    fn gated_field_changes_are_detected() {
        let before = record();
        for edit in [
            FieldEdit::quantity_value("999").expect("valid"),
            FieldEdit::QuantityUnit("u-box".into()),
            FieldEdit::dose_value("9").expect("valid"),
            FieldEdit::DoseUnit("mL".into()),
            FieldEdit::Route("r-iv".into()),
            FieldEdit::Frequency("f-tid".into()),
            FieldEdit::Medication {
                reference: "Medication/222".into(),
                display: None,
            },
        ] {
            assert!(
                changes_gated_fields(&before, &apply(&before, &edit)),
                "{}",
                edit.field_name()
            );
        }

        for edit in [
            FieldEdit::Instructions("At night".into()),
            FieldEdit::SubstitutionType("G".into()),
            FieldEdit::SubstitutionReason("OS".into()),
        ] {
            assert!(
                !changes_gated_fields(&before, &apply(&before, &edit)),
                "{}",
                edit.field_name()
            );
        }
    }

    #[test]
    fn gated_edits() {
        assert!(FieldEdit::Route("r".into()).requires_modify_privilege());
        assert!(!FieldEdit::Instructions("t".into()).requires_modify_privilege());
        assert!(!FieldEdit::SubstitutionReason("r".into()).requires_modify_privilege());
        assert!(FieldEdit::Substitution(Substitution::none()).is_derived());
        assert!(!FieldEdit::Route("r".into()).is_derived());
    }
}
