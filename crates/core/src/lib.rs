//! # Dispense Core
//!
//! Core logic for editing medication dispense records before they are saved.
//!
//! This crate keeps a dispense record internally consistent while a user edits it:
//! - option lists for routes, units and frequencies accumulate as reference data arrives
//! - substitution is re-derived whenever the ordered or dispensed medication changes
//! - every field edit produces a new record, leaving its input untouched
//! - orders are classified (active, completed, expired, cancelled) for display
//!
//! **No I/O**: fetching orders, configuration and value sets, saving records and checking
//! privileges belong to the host. The core only describes the save and delete requests.

pub mod assembler;
pub mod config;
pub mod constants;
pub mod editor;
pub mod error;
pub mod formulation;
pub mod options;
pub mod session;
pub mod status;
pub mod substitution;
pub mod workflow;

pub use assembler::{initiate_dispense, initiate_dispenses};
pub use config::PharmacyConfig;
pub use editor::{update_at, FieldEdit};
pub use error::{DispenseError, DispenseResult};
pub use formulation::MedicationLookup;
pub use options::{FieldOptions, OptionSet, SelectOption};
pub use session::{PrivilegeCheck, SessionContext, User, UserPrivileges};
pub use status::{compute_status, PrescriptionStatus};
pub use workflow::{DispenseWorkflow, RecordHandle};
