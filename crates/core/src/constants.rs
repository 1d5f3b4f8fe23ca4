//! Constants used throughout the dispensing core.

/// Default number of days after which an unfulfilled order is considered expired.
pub const DEFAULT_EXPIRATION_PERIOD_IN_DAYS: u32 = 90;

/// Upper bound on the expiration window: one hundred years.
pub const MAX_EXPIRATION_PERIOD_IN_DAYS: u32 = 36_500;

/// Privilege required to change quantities, dosing, route, frequency or formulation.
pub const PRIVILEGE_CREATE_DISPENSE_MODIFY_DETAILS: &str =
    "o3: Dispensing Create Dispense Modify Details";

/// Role that passes every privilege check.
pub const SUPERUSER_ROLE: &str = "System Developer";

/// Concept code stamped on the `type` of every new dispense record.
pub const DEFAULT_DISPENSE_TYPE_CODE: &str = "04affd1a-49ab-44e5-a6d1-c0a3fffceb7d";

/// Status given to a freshly assembled dispense: the act is recorded as already done.
pub const DISPENSE_STATUS_COMPLETED: &str = "completed";

/// Order statuses that count as cancelled.
pub const CANCELLED_ORDER_STATUSES: &[&str] = &["cancelled", "stopped", "entered-in-error"];

/// Order status that counts as fulfilled.
pub const COMPLETED_ORDER_STATUS: &str = "completed";

pub const PRACTITIONER: &str = "Practitioner";
pub const LOCATION: &str = "Location";
