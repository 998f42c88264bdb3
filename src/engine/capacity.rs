use crate::limits::*;
use crate::model::*;

use super::EngineError;

// ── Capacity accounting ──────────────────────────────────────────

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Count the bookings in a slot-key bucket that consume capacity. Derived
/// from the live booking set on every call, never cached.
pub fn occupied(bookings: &[Booking]) -> u32 {
    bookings
        .iter()
        .filter(|b| b.status.counts_against_capacity())
        .count() as u32
}

/// Compute the occupancy report for one slot against one day's bookings.
/// A disabled slot reports 0/0 regardless of what is booked on it.
pub fn status_of(slot: &Slot, bookings: &[Booking]) -> SlotStatus {
    if !slot.enabled {
        return SlotStatus {
            slot_id: slot.id,
            label: slot.label.clone(),
            capacity: 0,
            occupied: 0,
            available: 0,
            state: SlotState::Disabled,
        };
    }
    let occupied = occupied(bookings);
    SlotStatus {
        slot_id: slot.id,
        label: slot.label.clone(),
        capacity: slot.capacity,
        occupied,
        available: slot.capacity.saturating_sub(occupied),
        state: if occupied >= slot.capacity {
            SlotState::Full
        } else {
            SlotState::Available
        },
    }
}

/// True if the bucket already holds an active booking for this customer.
/// Settled bookings (rejected, cancelled) do not block a re-request.
pub fn has_active_booking(bookings: &[Booking], email: &str) -> bool {
    bookings
        .iter()
        .any(|b| b.email == email && b.status.counts_against_capacity())
}

// ── Request validation ───────────────────────────────────────────

/// Shape check for calendar-day keys: `YYYY-MM-DD`. Dates are opaque keys;
/// the engine does not interpret the calendar.
pub(crate) fn valid_date(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && [0, 1, 2, 3, 5, 6, 8, 9].iter().all(|&i| b[i].is_ascii_digit())
}

pub(crate) fn validate_request(req: &BookingRequest) -> Result<(), EngineError> {
    if req.name.trim().is_empty() {
        return Err(EngineError::Validation("name is required"));
    }
    if req.email.trim().is_empty() {
        return Err(EngineError::Validation("email is required"));
    }
    if req.phone.trim().is_empty() {
        return Err(EngineError::Validation("phone is required"));
    }
    if !valid_date(&req.date) {
        return Err(EngineError::Validation("date must be YYYY-MM-DD"));
    }
    for field in [&req.name, &req.email, &req.phone] {
        if field.len() > MAX_FIELD_LEN {
            return Err(EngineError::LimitExceeded("customer field too long"));
        }
    }
    if let Some(ref service) = req.service
        && service.len() > MAX_FIELD_LEN {
            return Err(EngineError::LimitExceeded("service name too long"));
        }
    if let Some(ref notes) = req.notes
        && notes.len() > MAX_REASON_LEN {
            return Err(EngineError::LimitExceeded("notes too long"));
        }
    Ok(())
}
