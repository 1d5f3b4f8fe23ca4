//! Prescription lifecycle classification.
//!
//! Display logic uses this to tag orders, and the assembler uses it to pick which orders may
//! seed a new dispense. Classification is pure: the current time is an argument.

use crate::constants::{CANCELLED_ORDER_STATUSES, COMPLETED_ORDER_STATUS};
use chrono::{DateTime, Duration, Utc};
use fhir::MedicationRequest;
use serde::Serialize;

/// Lifecycle status of an order from the pharmacy's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrescriptionStatus {
    Active,
    Completed,
    Expired,
    Cancelled,
}

impl PrescriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PrescriptionStatus::Active => "active",
            PrescriptionStatus::Completed => "completed",
            PrescriptionStatus::Expired => "expired",
            PrescriptionStatus::Cancelled => "cancelled",
        }
    }

    /// Label of the warning tag shown next to an order. Active orders carry no tag.
    pub fn tag_label(self) -> Option<&'static str> {
        match self {
            PrescriptionStatus::Active => None,
            PrescriptionStatus::Completed => Some("Completed"),
            PrescriptionStatus::Expired => Some("Expired"),
            PrescriptionStatus::Cancelled => Some("Cancelled"),
        }
    }
}

impl std::fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an order. First match wins:
/// 1. a cancellation status → `Cancelled`
/// 2. `completed` → `Completed`
/// 3. authored more than `expiration_period_in_days` before `now` → `Expired`
/// 4. otherwise `Active`
///
/// An order without a readable `authoredOn` is never expired, and neither is one whose
/// window ends beyond the representable date range.
pub fn compute_status(
    order: &MedicationRequest,
    expiration_period_in_days: u32,
    now: DateTime<Utc>,
) -> PrescriptionStatus {
    let status = order.status.as_deref().map(str::trim).unwrap_or_default();

    if CANCELLED_ORDER_STATUSES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(status))
    {
        return PrescriptionStatus::Cancelled;
    }

    if status.eq_ignore_ascii_case(COMPLETED_ORDER_STATUS) {
        return PrescriptionStatus::Completed;
    }

    match order.authored_on_utc() {
        Some(authored_on) => match expires_at(authored_on, expiration_period_in_days) {
            Some(expiry) if expiry < now => PrescriptionStatus::Expired,
            _ => PrescriptionStatus::Active,
        },
        None => {
            if let Some(raw) = order.authored_on.as_deref() {
                tracing::warn!(
                    order = order.id.as_deref().unwrap_or("<unsaved>"),
                    authored_on = raw,
                    "unreadable authoredOn; treating order as not expired"
                );
            }
            PrescriptionStatus::Active
        }
    }
}

/// End of the window, or `None` when it lies beyond the representable range.
fn expires_at(
    authored_on: DateTime<Utc>,
    expiration_period_in_days: u32,
) -> Option<DateTime<Utc>> {
    Duration::try_days(i64::from(expiration_period_in_days))
        .and_then(|window| authored_on.checked_add_signed(window))
}
