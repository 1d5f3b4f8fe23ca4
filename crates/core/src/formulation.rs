//! Formulation selection for a dispense record.
//!
//! A record either points at a concrete formulation (`Medication/<id>`) or carries a coded
//! concept. The drug search needs to know which of the two it is looking at.

use crate::editor::FieldEdit;
use fhir::medication::MEDICATION;
use fhir::{Medication, MedicationDispense};

/// What the formulation lookup should search for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MedicationLookup {
    /// Formulations of the concept with this local id.
    Concept(String),
    /// The formulation behind this literal reference.
    Reference(String),
}

/// Local concept id of the record's coded-concept medication.
pub fn concept_id(record: &MedicationDispense) -> Option<&str> {
    record
        .medication_codeable_concept
        .as_ref()?
        .local_code()
        .filter(|code| !code.is_empty())
}

/// Lookup key for the record's medication; the concept wins when both are present.
pub fn medication_lookup(record: &MedicationDispense) -> Option<MedicationLookup> {
    if let Some(id) = concept_id(record) {
        return Some(MedicationLookup::Concept(id.to_owned()));
    }
    record
        .medication_reference_str()
        .map(|r| MedicationLookup::Reference(r.to_owned()))
}

/// The formulation the record currently points at, if it is among `formulations`.
pub fn selected_formulation<'a>(
    formulations: &'a [Medication],
    record: &MedicationDispense,
) -> Option<&'a Medication> {
    let id = record
        .medication_reference
        .as_ref()?
        .target_id(MEDICATION)?;
    formulations
        .iter()
        .find(|m| m.id.as_deref() == Some(id))
}

/// Edit that points a record at `formulation`.
///
/// Returns `None` for a formulation without an id.
pub fn select_formulation(formulation: &Medication) -> Option<FieldEdit> {
    let reference = formulation.literal_reference()?;
    Some(FieldEdit::Medication {
        reference,
        display: Some(formulation.drug_name()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor;
    use fhir::{CodeableConcept, Coding, Reference};

    fn formulation(id: &str, text: &str) -> Medication {
        Medication {
            id: Some(id.into()),
            code: Some(CodeableConcept {
                coding: vec![],
                text: Some(text.into()),
            }),
            ..Medication::default()
        }
    }

    #[test]
    fn finds_the_selected_formulation() {
        let formulations = vec![
            formulation("111", "Aspirin 81mg"),
            formulation("222", "Aspirin 325mg"),
        ];
        let record = MedicationDispense {
            medication_reference: Some(Reference::to("Medication/222")),
            ..MedicationDispense::default()
        };
        assert_eq!(
            selected_formulation(&formulations, &record).and_then(|m| m.id.as_deref()),
            Some("222")
        );

        let elsewhere = MedicationDispense {
            medication_reference: Some(Reference::to("Medication/999")),
            ..MedicationDispense::default()
        };
        assert!(selected_formulation(&formulations, &elsewhere).is_none());
        assert!(selected_formulation(&formulations, &MedicationDispense::default()).is_none());
    }

    #[test]
    fn selecting_a_formulation_sets_reference_and_display() {
        let record = MedicationDispense {
            medication_codeable_concept: Some(CodeableConcept::from_code("c-1")),
            ..MedicationDispense::default()
        };
        let edit = select_formulation(&formulation("222", "Aspirin 325mg")).expect("edit");
        let after = editor::apply(&record, &edit);

        assert_eq!(after.medication_reference_str(), Some("Medication/222"));
        assert_eq!(
            after
                .medication_reference
                .as_ref()
                .and_then(|r| r.display.as_deref()),
            Some("Aspirin 325mg")
        );
        assert_eq!(after.medication_codeable_concept, None);
        assert!(select_formulation(&Medication::default()).is_none());
    }

    #[test]
    fn lookup_prefers_local_concept() {
        let record = MedicationDispense {
            medication_codeable_concept: Some(CodeableConcept {
                coding: vec![
                    Coding {
                        system: Some("http://snomed.info/sct".into()),
                        code: Some("387458008".into()),
                        display: None,
                    },
                    Coding {
                        code: Some("71617AAAAAA".into()),
                        ..Coding::default()
                    },
                ],
                text: None,
            }),
            medication_reference: Some(Reference::to("Medication/111")),
            ..MedicationDispense::default()
        };
        assert_eq!(
            medication_lookup(&record),
            Some(MedicationLookup::Concept("71617AAAAAA".into()))
        );

        let by_reference = MedicationDispense {
            medication_reference: Some(Reference::to("Medication/111")),
            ..MedicationDispense::default()
        };
        assert_eq!(
            medication_lookup(&by_reference),
            Some(MedicationLookup::Reference("Medication/111".into()))
        );
        assert_eq!(medication_lookup(&MedicationDispense::default()), None);
    }
}
