use std::time::Instant;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::capacity::{self, now_ms};
use super::{Engine, EngineError, apply_to_catalog, apply_to_services};

/// Default catalog installed into an empty store: five two-hour windows at
/// capacity 3.
const DEFAULT_SLOTS: &[(&str, u32)] = &[
    ("09:00 - 11:00", 3),
    ("11:00 - 13:00", 3),
    ("13:00 - 15:00", 3),
    ("15:00 - 17:00", 3),
    ("17:00 - 19:00", 3),
];

/// Default service list: (name, duration in minutes, price).
const DEFAULT_SERVICES: &[(&str, u32, u32)] = &[
    ("Standard appointment", 60, 50),
    ("Extended appointment", 120, 90),
    ("Consultation", 30, 25),
    ("Follow-up visit", 45, 40),
    ("Assessment", 90, 70),
];

impl Engine {
    // ── Slot catalog ─────────────────────────────────────────

    pub async fn add_slot(&self, label: &str, capacity: u32) -> Result<Slot, EngineError> {
        if label.trim().is_empty() {
            return Err(EngineError::Validation("label is required"));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(EngineError::LimitExceeded("slot label too long"));
        }
        if capacity > MAX_SLOT_CAPACITY {
            return Err(EngineError::LimitExceeded("slot capacity too large"));
        }
        let mut slots = self.catalog.write().await;
        if slots.len() >= MAX_SLOTS {
            return Err(EngineError::LimitExceeded("too many slots"));
        }

        let id = slots.iter().map(|s| s.id).max().map_or(1, |m| m + 1);
        let events = [
            Event::SlotAdded {
                id,
                label: label.to_string(),
                capacity,
            },
            self.audit_event("SLOT_ADD", format!("added slot: {label}")),
        ];
        self.commit_catalog(&mut slots, &events).await?;
        Ok(Slot {
            id,
            label: label.to_string(),
            capacity,
            enabled: true,
        })
    }

    /// Merge a partial update into a slot. `id` is immutable; capacity and
    /// enabled are the expected knobs.
    pub async fn update_slot(&self, id: SlotId, patch: SlotPatch) -> Result<Slot, EngineError> {
        let mut slots = self.catalog.write().await;
        let slot = slots
            .iter()
            .find(|s| s.id == id)
            .ok_or(EngineError::SlotNotFound(id))?;

        let label = patch.label.clone().unwrap_or_else(|| slot.label.clone());
        let capacity = patch.capacity.unwrap_or(slot.capacity);
        let enabled = patch.enabled.unwrap_or(slot.enabled);
        if label.trim().is_empty() {
            return Err(EngineError::Validation("label is required"));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(EngineError::LimitExceeded("slot label too long"));
        }
        if capacity > MAX_SLOT_CAPACITY {
            return Err(EngineError::LimitExceeded("slot capacity too large"));
        }

        let details = format!(
            "updated slot {}: {}",
            slot.label,
            serde_json::to_string(&patch).unwrap_or_default()
        );
        let events = [
            Event::SlotUpdated {
                id,
                label: label.clone(),
                capacity,
                enabled,
            },
            self.audit_event("SLOT_UPDATE", details),
        ];
        self.commit_catalog(&mut slots, &events).await?;
        Ok(Slot {
            id,
            label,
            capacity,
            enabled,
        })
    }

    // ── Booking lifecycle ────────────────────────────────────

    /// Admit a booking request, or queue it on the waitlist when the slot is
    /// full or disabled. The capacity check and the insert run under the
    /// slot key's write lock: concurrent creates cannot both take the last
    /// place.
    pub async fn create_booking(&self, request: BookingRequest) -> Result<CreateOutcome, EngineError> {
        let started = Instant::now();
        let result = self.admit_or_waitlist(request).await;
        observability::record_op("create_booking", started, result.is_ok());
        result
    }

    async fn admit_or_waitlist(&self, request: BookingRequest) -> Result<CreateOutcome, EngineError> {
        capacity::validate_request(&request)?;
        let slot = self.slot(request.slot_id).await?;

        let key = request.slot_key();
        let day = self.day_bucket(&key);
        let mut guard = day.write().await;

        if capacity::has_active_booking(&guard.bookings, &request.email) {
            return Err(EngineError::DuplicateBooking {
                email: request.email.clone(),
                date: request.date.clone(),
                slot_id: request.slot_id,
            });
        }

        let status = capacity::status_of(&slot, &guard.bookings);
        match status.state {
            SlotState::Full | SlotState::Disabled => {
                if guard.waitlist.len() >= MAX_WAITLIST_PER_SLOT_DAY {
                    return Err(EngineError::LimitExceeded("waitlist full for this slot"));
                }
                let entry = WaitlistEntry {
                    id: self.next_id(),
                    request,
                    added_at: now_ms(),
                };
                let events = [
                    Event::WaitlistJoined { entry: entry.clone() },
                    self.audit_event(
                        "WAITLIST_ADD",
                        format!("added {} to waitlist for {key}", entry.request.name),
                    ),
                ];
                self.commit_day(&key, &mut guard, &events).await?;
                tracing::info!(slot_key = %key, entry_id = entry.id, "slot unavailable, request waitlisted");
                Ok(CreateOutcome::Waitlisted(entry))
            }
            SlotState::Available => {
                if guard.bookings.len() >= MAX_BOOKINGS_PER_SLOT_DAY {
                    return Err(EngineError::LimitExceeded("too many bookings for this slot"));
                }
                let booking = Booking::admit(self.next_id(), request, now_ms());
                let events = [
                    Event::BookingCreated {
                        booking: booking.clone(),
                    },
                    self.audit_event(
                        "BOOKING_CREATE",
                        format!("new booking: {} for {}", booking.name, booking.date),
                    ),
                ];
                self.commit_day(&key, &mut guard, &events).await?;
                Ok(CreateOutcome::Booked(booking))
            }
        }
    }

    /// Approve a pending booking. Pure status change: pending bookings
    /// reserved their place at creation, so approval never re-checks
    /// capacity.
    pub async fn approve_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        let started = Instant::now();
        let result = self.transition(id, BookingStatus::Confirmed, "").await;
        observability::record_op("approve_booking", started, result.is_ok());
        result.map(|outcome| outcome.booking)
    }

    pub async fn reject_booking(&self, id: BookingId, reason: &str) -> Result<TransitionOutcome, EngineError> {
        let started = Instant::now();
        let result = self.transition(id, BookingStatus::Rejected, reason).await;
        observability::record_op("reject_booking", started, result.is_ok());
        result
    }

    pub async fn cancel_booking(&self, id: BookingId, reason: &str) -> Result<TransitionOutcome, EngineError> {
        let started = Instant::now();
        let result = self.transition(id, BookingStatus::Cancelled, reason).await;
        observability::record_op("cancel_booking", started, result.is_ok());
        result
    }

    async fn transition(
        &self,
        id: BookingId,
        to: BookingStatus,
        reason: &str,
    ) -> Result<TransitionOutcome, EngineError> {
        if reason.len() > MAX_REASON_LEN {
            return Err(EngineError::LimitExceeded("reason too long"));
        }
        let (key, mut guard) = self.resolve_booking_write(id).await?;
        let from = guard
            .booking(id)
            .ok_or(EngineError::BookingNotFound(id))?
            .status;
        if !from.allows(to) {
            return Err(EngineError::InvalidTransition { id, from, to });
        }

        let reason = (!reason.is_empty()).then(|| reason.to_string());
        let note = reason
            .clone()
            .unwrap_or_else(|| format!("status changed to {to}"));
        let events = [
            Event::BookingTransitioned {
                id,
                slot_key: key.clone(),
                status: to,
                timestamp: now_ms(),
                note,
                reason,
            },
            self.audit_event(
                "BOOKING_UPDATE",
                format!("booking {id} changed from {from} to {to}"),
            ),
        ];
        self.commit_day(&key, &mut guard, &events).await?;

        let booking = guard
            .booking(id)
            .cloned()
            .ok_or(EngineError::BookingNotFound(id))?;

        // Rejection and cancellation free a place; surface the head of the
        // FIFO queue as a promotion opportunity. Promotion itself stays an
        // explicit, separately invoked operation.
        let promotion_candidate = if !to.counts_against_capacity() {
            guard.waitlist.first().cloned()
        } else {
            None
        };
        if let Some(candidate) = &promotion_candidate {
            tracing::info!(
                slot_key = %key,
                entry_id = candidate.id,
                customer = %candidate.request.name,
                "capacity freed, waitlist candidate available"
            );
        }

        Ok(TransitionOutcome {
            booking,
            promotion_candidate,
        })
    }

    // ── Waitlist promotion ───────────────────────────────────

    /// Convert a waitlist entry into a pending booking. Re-runs the full
    /// admission check; on failure the entry stays queued and nothing
    /// changes, so the operation is safely retryable.
    pub async fn promote_from_waitlist(&self, entry_id: EntryId) -> Result<Booking, EngineError> {
        let started = Instant::now();
        let result = self.promote(entry_id).await;
        observability::record_op("promote_from_waitlist", started, result.is_ok());
        result
    }

    async fn promote(&self, entry_id: EntryId) -> Result<Booking, EngineError> {
        let (key, mut guard) = self.resolve_entry_write(entry_id).await?;
        let entry = guard
            .waitlist_entry(entry_id)
            .cloned()
            .ok_or(EngineError::WaitlistEntryNotFound(entry_id))?;
        let slot = self.slot(entry.request.slot_id).await?;

        if capacity::has_active_booking(&guard.bookings, &entry.request.email) {
            return Err(EngineError::DuplicateBooking {
                email: entry.request.email.clone(),
                date: entry.request.date.clone(),
                slot_id: entry.request.slot_id,
            });
        }
        match capacity::status_of(&slot, &guard.bookings).state {
            SlotState::Disabled => return Err(EngineError::SlotDisabled(slot.id)),
            SlotState::Full => {
                return Err(EngineError::CapacityExceeded {
                    slot_id: slot.id,
                    capacity: slot.capacity,
                });
            }
            SlotState::Available => {}
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_SLOT_DAY {
            return Err(EngineError::LimitExceeded("too many bookings for this slot"));
        }

        let booking = Booking::admit(self.next_id(), entry.request.clone(), now_ms());
        let events = [
            Event::WaitlistLeft {
                id: entry_id,
                slot_key: key.clone(),
            },
            Event::BookingCreated {
                booking: booking.clone(),
            },
            self.audit_event(
                "WAITLIST_PROMOTE",
                format!("promoted {} from waitlist for {key}", booking.name),
            ),
        ];
        self.commit_day(&key, &mut guard, &events).await?;
        Ok(booking)
    }

    // ── Service catalog ──────────────────────────────────────

    pub async fn add_service(&self, name: &str, duration: u32, price: u32) -> Result<Service, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::Validation("service name is required"));
        }
        if name.len() > MAX_FIELD_LEN {
            return Err(EngineError::LimitExceeded("service name too long"));
        }
        let mut services = self.services.write().await;
        if services.len() >= MAX_SERVICES {
            return Err(EngineError::LimitExceeded("too many services"));
        }

        let id = services.iter().map(|s| s.id).max().map_or(1, |m| m + 1);
        let events = [
            Event::ServiceAdded {
                id,
                name: name.to_string(),
                duration,
                price,
            },
            self.audit_event("SERVICE_ADD", format!("added service: {name}")),
        ];
        self.commit_services(&mut services, &events).await?;
        Ok(Service {
            id,
            name: name.to_string(),
            duration,
            price,
        })
    }

    /// Remove a service. Unknown ids are a no-op, as in the source system.
    pub async fn delete_service(&self, id: ServiceId) -> Result<(), EngineError> {
        let mut services = self.services.write().await;
        if !services.iter().any(|s| s.id == id) {
            return Ok(());
        }
        let events = [
            Event::ServiceRemoved { id },
            self.audit_event("SERVICE_DELETE", format!("deleted service id: {id}")),
        ];
        self.commit_services(&mut services, &events).await
    }

    // ── Settings and templates ───────────────────────────────

    pub async fn update_settings(&self, settings: Settings) -> Result<(), EngineError> {
        for field in [&settings.business_name, &settings.currency, &settings.admin_password] {
            if field.len() > MAX_SETTING_LEN {
                return Err(EngineError::LimitExceeded("settings field too long"));
            }
        }
        let mut current = self.settings.write().await;
        self.persist(&[Event::SettingsChanged {
            settings: settings.clone(),
        }])
        .await?;
        *current = settings;
        Ok(())
    }

    /// Insert or replace a message template.
    pub async fn update_template(&self, name: &str, text: &str) -> Result<(), EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::Validation("template name is required"));
        }
        if name.len() > MAX_SETTING_LEN {
            return Err(EngineError::LimitExceeded("template name too long"));
        }
        if text.len() > MAX_TEMPLATE_LEN {
            return Err(EngineError::LimitExceeded("template too long"));
        }
        let mut templates = self.templates.write().await;
        self.persist(&[Event::TemplateChanged {
            name: name.to_string(),
            text: text.to_string(),
        }])
        .await?;
        templates.set(name, text);
        Ok(())
    }

    // ── Seed data ────────────────────────────────────────────

    /// Install the default slot and service catalogs into an empty store.
    /// Returns whether anything was seeded; a store with any slots or
    /// services is left untouched.
    pub async fn seed_defaults(&self) -> Result<bool, EngineError> {
        let mut slots = self.catalog.write().await;
        let mut services = self.services.write().await;
        if !slots.is_empty() || !services.is_empty() {
            return Ok(false);
        }

        let mut events = Vec::new();
        for (i, (label, capacity)) in DEFAULT_SLOTS.iter().enumerate() {
            events.push(Event::SlotAdded {
                id: i as SlotId + 1,
                label: (*label).to_string(),
                capacity: *capacity,
            });
        }
        for (i, (name, duration, price)) in DEFAULT_SERVICES.iter().enumerate() {
            events.push(Event::ServiceAdded {
                id: i as ServiceId + 1,
                name: (*name).to_string(),
                duration: *duration,
                price: *price,
            });
        }

        self.persist(&events).await?;
        for event in &events {
            apply_to_catalog(&mut slots, event);
            apply_to_services(&mut services, event);
        }
        tracing::info!(slots = slots.len(), services = services.len(), "seeded default catalog");
        Ok(true)
    }
}
