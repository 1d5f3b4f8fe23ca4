//! Substitution detection.
//!
//! A dispense is a substitution when it hands over a different formulation from the one that
//! was ordered. The rule only compares concrete `Medication/<id>` references: an order or
//! dispense expressed as a coded concept is never considered substituted.
//!
//! [`detect`] is the pure rule. [`SubstitutionTracker`] decides *when* to apply it by diffing
//! the `(order reference, record reference)` pair seen on each update cycle.

use fhir::Substitution;

/// Compute the substitution sub-record for a pair of medication references.
///
/// - both present and different: flagged, keeping any type/reason already entered
/// - otherwise: not flagged, type and reason reset to the empty coded value
pub fn detect(
    order_reference: Option<&str>,
    record_reference: Option<&str>,
    current: Option<&Substitution>,
) -> Substitution {
    if is_substitution(order_reference, record_reference) {
        Substitution {
            was_substituted: true,
            ..current.cloned().unwrap_or_else(Substitution::none)
        }
    } else {
        Substitution::none()
    }
}

/// True when both references are concrete and differ.
pub fn is_substitution(order_reference: Option<&str>, record_reference: Option<&str>) -> bool {
    match (concrete(order_reference), concrete(record_reference)) {
        (Some(ordered), Some(dispensed)) => ordered != dispensed,
        _ => false,
    }
}

fn concrete(reference: Option<&str>) -> Option<&str> {
    reference.map(str::trim).filter(|r| !r.is_empty())
}

/// The pair of inputs the substitution rule depends on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubstitutionInputs {
    pub order_reference: Option<String>,
    pub record_reference: Option<String>,
}

impl SubstitutionInputs {
    pub fn new(order_reference: Option<&str>, record_reference: Option<&str>) -> Self {
        Self {
            order_reference: order_reference.map(str::to_owned),
            record_reference: record_reference.map(str::to_owned),
        }
    }
}

/// Remembers the last input pair the rule ran against.
///
/// A fresh tracker has seen nothing, so the first observation always triggers.
#[derive(Clone, Debug, Default)]
pub struct SubstitutionTracker {
    last: Option<SubstitutionInputs>,
}

impl SubstitutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `inputs` and report whether they differ from the previous observation.
    pub fn observe(&mut self, inputs: SubstitutionInputs) -> bool {
        if self.last.as_ref() == Some(&inputs) {
            return false;
        }
        self.last = Some(inputs);
        true
    }

    pub fn last(&self) -> Option<&SubstitutionInputs> {
        self.last.as_ref()
    }
}
