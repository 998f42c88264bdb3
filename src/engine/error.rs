use crate::model::{BookingId, BookingStatus, EntryId, SlotId};

/// Every way an engine operation can fail. Errors are structured outcomes:
/// nothing panics past the API boundary, and a failed operation leaves all
/// state unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed request: a required field is missing or out of shape.
    Validation(&'static str),
    /// An active booking already exists for this (email, date, slot).
    DuplicateBooking {
        email: String,
        date: String,
        slot_id: SlotId,
    },
    SlotNotFound(SlotId),
    BookingNotFound(BookingId),
    WaitlistEntryNotFound(EntryId),
    /// Admission would overshoot the slot's capacity. Only reachable from
    /// waitlist promotion: pending bookings reserve capacity at creation, so
    /// approval never re-checks.
    CapacityExceeded {
        slot_id: SlotId,
        capacity: u32,
    },
    /// Promotion against a slot whose `enabled` flag is off.
    SlotDisabled(SlotId),
    /// Transition out of a terminal status, or any other move the state
    /// machine does not allow.
    InvalidTransition {
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },
    LimitExceeded(&'static str),
    /// WAL I/O failure; the in-memory state was not touched.
    Storage(String),
}

impl EngineError {
    /// Stable taxonomy tag for surface bindings.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::DuplicateBooking { .. } => "duplicate_booking",
            EngineError::SlotNotFound(_)
            | EngineError::BookingNotFound(_)
            | EngineError::WaitlistEntryNotFound(_) => "not_found",
            EngineError::CapacityExceeded { .. } => "capacity_exceeded",
            EngineError::SlotDisabled(_) => "slot_disabled",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::Storage(_) => "storage",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::DuplicateBooking { email, date, slot_id } => {
                write!(f, "{email} already has an active booking for slot {slot_id} on {date}")
            }
            EngineError::SlotNotFound(id) => write!(f, "slot not found: {id}"),
            EngineError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::WaitlistEntryNotFound(id) => write!(f, "waitlist entry not found: {id}"),
            EngineError::CapacityExceeded { slot_id, capacity } => {
                write!(f, "slot {slot_id} is full: all {capacity} places occupied")
            }
            EngineError::SlotDisabled(id) => write!(f, "slot {id} is disabled"),
            EngineError::InvalidTransition { id, from, to } => {
                write!(f, "booking {id}: cannot move from {from} to {to}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
