//! Builds the initial dispense records for a fill.

use crate::config::PharmacyConfig;
use crate::constants::DISPENSE_STATUS_COMPLETED;
use crate::session::SessionContext;
use crate::status::{compute_status, PrescriptionStatus};
use chrono::{DateTime, Utc};
use fhir::{
    CodeableConcept, Dosage, DoseAndRate, MedicationDispense, MedicationRequest, Performer,
    Quantity, Reference, Substitution,
};

/// One dispense record per active order, in order.
///
/// Orders that are not [`PrescriptionStatus::Active`] at `now` are skipped.
pub fn initiate_dispenses(
    orders: &[MedicationRequest],
    session: &SessionContext,
    config: &PharmacyConfig,
    now: DateTime<Utc>,
) -> Vec<MedicationDispense> {
    let dispenses: Vec<MedicationDispense> = orders
        .iter()
        .filter(|order| {
            compute_status(order, config.expiration_period_in_days(), now)
                == PrescriptionStatus::Active
        })
        .map(|order| initiate_dispense(order, session, config, now))
        .collect();

    tracing::info!(
        orders = orders.len(),
        dispenses = dispenses.len(),
        "initiated dispense records"
    );
    dispenses
}

/// Build the initial dispense record for one order, regardless of its status.
pub fn initiate_dispense(
    order: &MedicationRequest,
    session: &SessionContext,
    config: &PharmacyConfig,
    now: DateTime<Utc>,
) -> MedicationDispense {
    let requested = order.requested_quantity();

    MedicationDispense {
        status: Some(DISPENSE_STATUS_COMPLETED.to_owned()),
        authorizing_prescription: order
            .literal_reference()
            .map(|reference| Reference {
                reference: Some(reference),
                type_: Some(fhir::medication_request::MEDICATION_REQUEST.to_owned()),
                display: None,
            })
            .into_iter()
            .collect(),
        medication_reference: order.medication_reference.clone(),
        medication_codeable_concept: order.medication_codeable_concept.clone(),
        subject: order.subject.clone(),
        performer: vec![Performer {
            actor: Reference::to(session.performer_reference()),
        }],
        location: Some(Reference::to(session.location_reference())),
        type_: Some(CodeableConcept::from_code(config.dispense_type_code())),
        quantity: Some(Quantity {
            value: requested.and_then(|q| q.value),
            code: requested.and_then(|q| q.code.clone()),
            unit: requested.and_then(|q| q.unit.clone()),
            system: requested.and_then(|q| q.system.clone()),
        }),
        when_prepared: Some(now),
        when_handed_over: Some(now),
        dosage_instruction: vec![initial_dosage(order.dosage_instruction.first())],
        substitution: Some(Substitution::none()),
        ..MedicationDispense::default()
    }
}

fn initial_dosage(ordered: Option<&Dosage>) -> Dosage {
    let dose_and_rate = ordered
        .and_then(|d| d.dose_and_rate.clone())
        .filter(|entries| !entries.is_empty())
        .unwrap_or_else(|| {
            vec![DoseAndRate {
                type_: None,
                dose_quantity: Some(Quantity::default()),
            }]
        });

    Dosage {
        text: ordered.and_then(|d| d.text.clone()),
        timing: ordered.and_then(|d| d.timing.clone()),
        as_needed_boolean: Some(false),
        route: ordered.and_then(|d| d.route.clone()),
        dose_and_rate: Some(dose_and_rate),
        ..Dosage::default()
    }
}
