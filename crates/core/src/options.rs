//! Selectable option lists for the editable dispense fields.
//!
//! Two merge policies exist:
//! - Order-config lists (routes, dosing units, dispensing units, frequencies) **accumulate**:
//!   [`reconcile`] appends canonical entries whose id is new and never removes anything, so a
//!   value selected before the configuration arrived stays selectable afterwards.
//! - Value-set lists (substitution type and reason) are **rebuilt** from each value set
//!   arrival by [`from_value_set`], because a value set is complete when it arrives.

use fhir::{CodeableConcept, ConfigEntry, MedicationDispense, OrderConfig, ValueSet};
use indexmap::IndexMap;
use serde::Serialize;

/// A selectable `{id, text}` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub id: String,
    pub text: String,
}

/// An ordered option list keyed by id.
///
/// Insertion order is display order. An id appears at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: IndexMap<String, String>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option unless its id is already present or blank.
    ///
    /// Returns `true` when the set grew.
    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<String>) -> bool {
        let id = id.into();
        if id.trim().is_empty() || self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, text.into());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(id, text)| (id.as_str(), text.as_str()))
    }

    /// Options in display order.
    pub fn to_options(&self) -> Vec<SelectOption> {
        self.iter()
            .map(|(id, text)| SelectOption {
                id: id.to_owned(),
                text: text.to_owned(),
            })
            .collect()
    }

    /// Record the currently selected value of a field as selectable.
    ///
    /// The text falls back to the id when the concept carries no display text.
    pub fn observe_selection(&mut self, id: Option<&str>, text: Option<&str>) -> bool {
        match id {
            Some(id) => self.insert(id, text.unwrap_or(id)),
            None => false,
        }
    }
}

impl Serialize for OptionSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.to_options())
    }
}

impl FromIterator<SelectOption> for OptionSet {
    fn from_iter<I: IntoIterator<Item = SelectOption>>(iter: I) -> Self {
        let mut set = Self::new();
        for option in iter {
            set.insert(option.id, option.text);
        }
        set
    }
}

/// Merge a canonical list into the accumulated options for one field.
///
/// Every current entry is kept in place; canonical entries with a new id are appended in
/// canonical order. Applying the same canonical list twice changes nothing the second time.
pub fn reconcile(current: &OptionSet, canonical: &[ConfigEntry]) -> OptionSet {
    let mut merged = current.clone();
    for entry in canonical {
        merged.insert(entry.uuid.as_str(), entry.display.as_str());
    }
    merged
}

/// Build an option list from the local concepts of a value set (id = code, text = display).
pub fn from_value_set(value_set: &ValueSet) -> OptionSet {
    let mut options = OptionSet::new();
    for concept in value_set.local_concepts() {
        let text = concept.display.as_deref().unwrap_or(&concept.code);
        options.insert(concept.code.as_str(), text);
    }
    options
}

/// Option lists backing every choice field of one dispense record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FieldOptions {
    pub routes: OptionSet,
    pub dosing_units: OptionSet,
    pub dispensing_units: OptionSet,
    pub frequencies: OptionSet,
    pub substitution_types: OptionSet,
    pub substitution_reasons: OptionSet,
}

impl FieldOptions {
    /// Options seeded with the record's current selections.
    pub fn for_record(record: &MedicationDispense) -> Self {
        let mut options = Self::default();
        options.observe_record(record);
        options
    }

    /// Add the record's current route, units and frequency to their lists.
    pub fn observe_record(&mut self, record: &MedicationDispense) {
        if let Some(quantity) = record.quantity.as_ref() {
            self.dispensing_units
                .observe_selection(quantity.code.as_deref(), quantity.unit.as_deref());
        }

        let Some(dosage) = record.dosage() else {
            return;
        };
        if let Some(dose) = dosage.dose_quantity() {
            self.dosing_units
                .observe_selection(dose.code.as_deref(), dose.unit.as_deref());
        }
        if let Some(route) = dosage.route.as_ref() {
            observe_concept(&mut self.routes, route);
        }
        if let Some(frequency) = dosage.frequency() {
            observe_concept(&mut self.frequencies, frequency);
        }
    }

    /// Fold a newly arrived order configuration into the four accumulating lists.
    pub fn apply_order_config(&mut self, config: &OrderConfig) {
        self.routes = reconcile(&self.routes, &config.drug_routes);
        self.dosing_units = reconcile(&self.dosing_units, &config.drug_dosing_units);
        self.dispensing_units = reconcile(&self.dispensing_units, &config.drug_dispensing_units);
        self.frequencies = reconcile(&self.frequencies, &config.order_frequencies);
    }

    pub fn apply_substitution_types(&mut self, value_set: &ValueSet) {
        self.substitution_types = from_value_set(value_set);
    }

    pub fn apply_substitution_reasons(&mut self, value_set: &ValueSet) {
        self.substitution_reasons = from_value_set(value_set);
    }
}

fn observe_concept(options: &mut OptionSet, concept: &CodeableConcept) {
    let display = concept
        .text
        .as_deref()
        .or_else(|| concept.coding.first().and_then(|c| c.display.as_deref()));
    options.observe_selection(concept.first_code(), display);
}
