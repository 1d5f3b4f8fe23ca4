//! The in-memory fill workflow.
//!
//! Dispense records live in an arena addressed by generational [`RecordHandle`]s. Derived
//! results (reference data, the related order, substitution recomputation) always name the
//! handle they were requested for; once a record is discarded its handle goes stale and any
//! late result for it is dropped instead of written.
//!
//! Every change to a record goes through [`editor::apply`]. After each update cycle the
//! substitution rule is re-applied to the post-update `(order reference, record reference)`
//! pair, so `wasSubstituted` always matches the references and a record that is not
//! substituted never keeps a type or reason.

use crate::assembler;
use crate::config::PharmacyConfig;
use crate::editor::{self, FieldEdit};
use crate::options::{self, FieldOptions, OptionSet};
use crate::session::{PrivilegeCheck, SessionContext};
use crate::substitution::{self, SubstitutionInputs, SubstitutionTracker};
use crate::{DispenseError, DispenseResult};
use chrono::{DateTime, Utc};
use fhir::{MedicationDispense, MedicationRequest, OrderConfig, PersistRequest, ValueSet};

/// Address of one record in a [`DispenseWorkflow`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordHandle {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
struct Entry {
    record: MedicationDispense,
    options: FieldOptions,
    /// Medication reference of the related order, once known.
    order_reference: Option<String>,
    tracker: SubstitutionTracker,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    entry: Option<Entry>,
}

/// Records being edited for one fill, with their option lists.
pub struct DispenseWorkflow {
    config: PharmacyConfig,
    session: SessionContext,
    privileges: Box<dyn PrivilegeCheck>,
    slots: Vec<Slot>,
    order_config: Option<OrderConfig>,
    substitution_types: Option<OptionSet>,
    substitution_reasons: Option<OptionSet>,
}

impl DispenseWorkflow {
    pub fn new(
        config: PharmacyConfig,
        session: SessionContext,
        privileges: impl PrivilegeCheck + 'static,
    ) -> Self {
        Self {
            config,
            session,
            privileges: Box::new(privileges),
            slots: Vec::new(),
            order_config: None,
            substitution_types: None,
            substitution_reasons: None,
        }
    }

    pub fn config(&self) -> &PharmacyConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Seed one record per active order.
    ///
    /// The orders double as the related orders of the new records, so substitution tracking
    /// starts from the ordered medication.
    pub fn start(&mut self, orders: &[MedicationRequest], now: DateTime<Utc>) -> Vec<RecordHandle> {
        let records = assembler::initiate_dispenses(orders, &self.session, &self.config, now);
        let handles: Vec<RecordHandle> = records
            .into_iter()
            .map(|record| {
                let order_reference = orders
                    .iter()
                    .find(|o| {
                        o.literal_reference().as_deref() == record.authorizing_reference()
                    })
                    .and_then(|o| o.medication_reference_str())
                    .map(str::to_owned);
                self.insert_entry(record, order_reference)
            })
            .collect();

        tracing::info!(records = handles.len(), "dispense workflow started");
        handles
    }

    /// Add an existing record, for example one loaded for editing.
    ///
    /// Its related order is unknown until [`Self::on_related_order`] delivers it.
    pub fn insert(&mut self, record: MedicationDispense) -> RecordHandle {
        self.insert_entry(record, None)
    }

    fn insert_entry(
        &mut self,
        record: MedicationDispense,
        order_reference: Option<String>,
    ) -> RecordHandle {
        let mut options = FieldOptions::for_record(&record);
        if let Some(config) = self.order_config.as_ref() {
            options.apply_order_config(config);
        }
        if let Some(types) = self.substitution_types.as_ref() {
            options.substitution_types = types.clone();
        }
        if let Some(reasons) = self.substitution_reasons.as_ref() {
            options.substitution_reasons = reasons.clone();
        }

        let mut entry = Entry {
            record,
            options,
            order_reference,
            tracker: SubstitutionTracker::new(),
        };
        recompute_substitution(&mut entry);

        match self.slots.iter().position(|slot| slot.entry.is_none()) {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.entry = Some(entry);
                RecordHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                RecordHandle {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    fn entry(&self, handle: RecordHandle) -> Option<&Entry> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)?
            .entry
            .as_ref()
    }

    fn entry_mut(&mut self, handle: RecordHandle) -> Option<&mut Entry> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)?
            .entry
            .as_mut()
    }

    pub fn contains(&self, handle: RecordHandle) -> bool {
        self.entry(handle).is_some()
    }

    pub fn record(&self, handle: RecordHandle) -> Option<&MedicationDispense> {
        self.entry(handle).map(|e| &e.record)
    }

    pub fn options(&self, handle: RecordHandle) -> Option<&FieldOptions> {
        self.entry(handle).map(|e| &e.options)
    }

    /// Live records in arena order.
    pub fn records(&self) -> impl Iterator<Item = (RecordHandle, &MedicationDispense)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry.as_ref().map(|entry| {
                (
                    RecordHandle {
                        index,
                        generation: slot.generation,
                    },
                    &entry.record,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the session user may change gated fields.
    pub fn can_modify(&self) -> bool {
        self.session.user.as_ref().is_some_and(|user| {
            self.privileges
                .has_privilege(self.config.modify_details_privilege(), user)
        })
    }

    /// Fold a newly arrived order configuration into every record's option lists.
    pub fn on_order_config(&mut self, config: OrderConfig) {
        for entry in self.slots.iter_mut().filter_map(|s| s.entry.as_mut()) {
            entry.options.apply_order_config(&config);
        }
        tracing::debug!("order config applied");
        self.order_config = Some(config);
    }

    /// Rebuild the substitution type options from a value set.
    ///
    /// A value set other than the configured one is ignored. Returns whether it was applied.
    pub fn on_substitution_types(&mut self, value_set: &ValueSet) -> bool {
        if !matches_configured(self.config.substitution_type_value_set(), value_set) {
            tracing::debug!(value_set = ?value_set.id, "ignoring substitution type value set");
            return false;
        }
        let types = options::from_value_set(value_set);
        for entry in self.slots.iter_mut().filter_map(|s| s.entry.as_mut()) {
            entry.options.substitution_types = types.clone();
        }
        self.substitution_types = Some(types);
        true
    }

    /// Rebuild the substitution reason options from a value set.
    pub fn on_substitution_reasons(&mut self, value_set: &ValueSet) -> bool {
        if !matches_configured(self.config.substitution_reason_value_set(), value_set) {
            tracing::debug!(value_set = ?value_set.id, "ignoring substitution reason value set");
            return false;
        }
        let reasons = options::from_value_set(value_set);
        for entry in self.slots.iter_mut().filter_map(|s| s.entry.as_mut()) {
            entry.options.substitution_reasons = reasons.clone();
        }
        self.substitution_reasons = Some(reasons);
        true
    }

    /// Reference of the order a record was dispensed against, for fetching it.
    pub fn authorizing_prescription(&self, handle: RecordHandle) -> Option<&str> {
        self.record(handle)?.authorizing_reference()
    }

    /// Deliver the related order of a record.
    ///
    /// Dropped (returns `false`) when the record was discarded in the meantime or the order is
    /// not the one the record was dispensed against.
    pub fn on_related_order(&mut self, handle: RecordHandle, order: &MedicationRequest) -> bool {
        let Some(entry) = self.entry_mut(handle) else {
            tracing::debug!(?handle, "dropping related order for discarded record");
            return false;
        };
        if !is_authorizing(&entry.record, order) {
            tracing::debug!(
                ?handle,
                order = order.id.as_deref().unwrap_or("<unsaved>"),
                "dropping unrelated order"
            );
            return false;
        }
        entry.order_reference = order.medication_reference_str().map(str::to_owned);
        recompute_substitution(entry);
        true
    }

    /// Replace a record wholesale, as the rendering layer's `updateRecord` does.
    ///
    /// # Errors
    ///
    /// - [`DispenseError::NotPermitted`] when the replacement changes a gated field and
    ///   [`Self::can_modify`] is false
    /// - [`DispenseError::StaleHandle`] when the record was discarded
    pub fn update_record(
        &mut self,
        handle: RecordHandle,
        record: MedicationDispense,
    ) -> DispenseResult<()> {
        let can_modify = self.can_modify();
        let entry = self.entry_mut(handle).ok_or(DispenseError::StaleHandle)?;
        if !can_modify && editor::changes_gated_fields(&entry.record, &record) {
            return Err(DispenseError::NotPermitted);
        }
        entry.options.observe_record(&record);
        entry.record = record;
        recompute_substitution(entry);
        Ok(())
    }

    /// Apply one user edit.
    ///
    /// # Errors
    ///
    /// - [`DispenseError::InvalidInput`] for [`FieldEdit::Substitution`], which only the
    ///   workflow writes
    /// - [`DispenseError::NotPermitted`] for a gated edit when [`Self::can_modify`] is false
    /// - [`DispenseError::StaleHandle`] when the record was discarded
    pub fn apply_edit(&mut self, handle: RecordHandle, edit: FieldEdit) -> DispenseResult<()> {
        self.apply_cycle(handle, None, &[edit])
    }

    /// One update cycle: optionally a related order, then edits, then one recomputation.
    ///
    /// Either every edit is applied or none is.
    pub fn apply_cycle(
        &mut self,
        handle: RecordHandle,
        related_order: Option<&MedicationRequest>,
        edits: &[FieldEdit],
    ) -> DispenseResult<()> {
        if let Some(edit) = edits.iter().find(|e| e.is_derived()) {
            return Err(DispenseError::InvalidInput(format!(
                "{} is derived from the medication references",
                edit.field_name()
            )));
        }
        if edits.iter().any(FieldEdit::requires_modify_privilege) && !self.can_modify() {
            return Err(DispenseError::NotPermitted);
        }
        let entry = self.entry_mut(handle).ok_or(DispenseError::StaleHandle)?;

        if let Some(order) = related_order {
            if is_authorizing(&entry.record, order) {
                entry.order_reference = order.medication_reference_str().map(str::to_owned);
            } else {
                tracing::debug!(?handle, "ignoring unrelated order in update cycle");
            }
        }

        for edit in edits {
            tracing::debug!(?handle, field = edit.field_name(), "applying edit");
            entry.record = editor::apply(&entry.record, edit);
        }
        entry.options.observe_record(&entry.record);
        recompute_substitution(entry);
        Ok(())
    }

    /// Save request for a record.
    pub fn persist_request(&self, handle: RecordHandle) -> Option<PersistRequest> {
        self.record(handle).map(MedicationDispense::persist_request)
    }

    /// Remove a record. Its handle, and every copy of it, goes stale.
    pub fn discard(&mut self, handle: RecordHandle) -> Option<MedicationDispense> {
        let slot = self
            .slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)?;
        let entry = slot.entry.take()?;
        slot.generation += 1;
        Some(entry.record)
    }

    /// Discard every record.
    pub fn cancel(&mut self) {
        for slot in self.slots.iter_mut().filter(|s| s.entry.is_some()) {
            slot.entry = None;
            slot.generation += 1;
        }
        tracing::info!("dispense workflow cancelled");
    }

    /// The live records, in arena order, ending the workflow.
    pub fn into_records(self) -> Vec<MedicationDispense> {
        self.slots
            .into_iter()
            .filter_map(|slot| slot.entry.map(|e| e.record))
            .collect()
    }
}

fn is_authorizing(record: &MedicationDispense, order: &MedicationRequest) -> bool {
    match (record.authorizing_reference(), order.literal_reference()) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => false,
    }
}

fn matches_configured(configured: Option<&str>, value_set: &ValueSet) -> bool {
    match configured {
        Some(id) => value_set.id.as_deref() == Some(id),
        None => true,
    }
}

fn recompute_substitution(entry: &mut Entry) {
    let inputs = SubstitutionInputs::new(
        entry.order_reference.as_deref(),
        entry.record.medication_reference_str(),
    );
    let pair_changed = entry.tracker.observe(inputs);

    let detected = substitution::detect(
        entry.order_reference.as_deref(),
        entry.record.medication_reference_str(),
        entry.record.substitution.as_ref(),
    );
    if entry.record.substitution.as_ref() == Some(&detected) {
        return;
    }
    tracing::debug!(
        was_substituted = detected.was_substituted,
        pair_changed,
        "substitution recomputed"
    );
    entry.record = editor::apply(&entry.record, &FieldEdit::Substitution(detected));
}
