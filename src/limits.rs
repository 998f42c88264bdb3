//! Hard bounds on stored data. Every mutation validates against these before
//! touching the WAL, so a misbehaving caller cannot grow the store without
//! bound.

/// Max slots in the catalog.
pub const MAX_SLOTS: usize = 64;

/// Max per-slot capacity an admin can configure.
pub const MAX_SLOT_CAPACITY: u32 = 1_000;

/// Max length of a slot's display label.
pub const MAX_LABEL_LEN: usize = 64;

/// Max length of a customer name, email, or phone field.
pub const MAX_FIELD_LEN: usize = 128;

/// Max length of a rejection/cancellation reason or free-form note.
pub const MAX_REASON_LEN: usize = 512;

/// Max bookings held in one (slot, date) bucket, active or settled.
pub const MAX_BOOKINGS_PER_SLOT_DAY: usize = 2_048;

/// Max waitlist entries queued on one (slot, date) bucket.
pub const MAX_WAITLIST_PER_SLOT_DAY: usize = 256;

/// Audit trail keeps only this many records, most recent first.
pub const MAX_AUDIT_RECORDS: usize = 100;

/// Max services in the catalog.
pub const MAX_SERVICES: usize = 128;

/// Max length of a message template body.
pub const MAX_TEMPLATE_LEN: usize = 2_000;

/// Max length of a template name or settings field.
pub const MAX_SETTING_LEN: usize = 128;
