mod capacity;
mod error;
mod mutations;
mod queries;

pub use capacity::{has_active_booking, occupied, status_of};
pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use crate::audit::AuditTrail;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability;
use crate::template::TemplateSet;
use crate::wal::Wal;

pub type SharedDayState = Arc<RwLock<DayState>>;

/// Timestamp-derived id generator: `max(now_ms, last + 1)`. Ids stay unique
/// under bursts and monotonic across restarts (the generator is reseeded
/// from the replayed maximum at open).
struct IdGen {
    last: AtomicI64,
}

impl IdGen {
    fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    fn observe(&self, id: i64) {
        self.last.fetch_max(id, Ordering::SeqCst);
    }

    fn next(&self) -> i64 {
        let now = capacity::now_ms();
        loop {
            let last = self.last.load(Ordering::SeqCst);
            let candidate = now.max(last + 1);
            if self
                .last
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return candidate;
            }
        }
    }
}

/// The booking engine: slot catalog, per-slotKey booking/waitlist buckets,
/// audit trail, settings, and message templates, all rebuilt from the WAL at
/// open.
///
/// Bookings and waitlist entries are sharded by slot key. Every admission
/// decision (capacity check, then insert) runs under that bucket's write
/// lock, so two concurrent creates for the same slot key cannot both observe
/// a free place.
pub struct Engine {
    catalog: RwLock<Vec<Slot>>,
    days: DashMap<SlotKey, SharedDayState>,
    /// Reverse lookup: booking id → its slot-key bucket.
    booking_index: DashMap<BookingId, SlotKey>,
    /// Reverse lookup: waitlist entry id → its slot-key bucket.
    entry_index: DashMap<EntryId, SlotKey>,
    services: RwLock<Vec<Service>>,
    settings: RwLock<Settings>,
    templates: RwLock<TemplateSet>,
    audit: RwLock<AuditTrail>,
    wal: Mutex<Wal>,
    pub notify: Arc<NotifyHub>,
    ids: IdGen,
}

/// Apply a bucket-scoped event to a day state (no locking — the caller holds
/// the bucket's write lock, or owns it exclusively during replay). Keeps the
/// reverse indexes in step.
fn apply_to_day(
    day: &mut DayState,
    event: &Event,
    booking_index: &DashMap<BookingId, SlotKey>,
    entry_index: &DashMap<EntryId, SlotKey>,
) {
    match event {
        Event::BookingCreated { booking } => {
            booking_index.insert(booking.id, booking.slot_key.clone());
            day.bookings.push(booking.clone());
        }
        Event::BookingTransitioned {
            id,
            status,
            timestamp,
            note,
            reason,
            ..
        } => {
            if let Some(booking) = day.booking_mut(*id) {
                booking.apply_transition(*status, *timestamp, note, reason.as_deref());
            }
        }
        Event::WaitlistJoined { entry } => {
            entry_index.insert(entry.id, entry.slot_key());
            day.waitlist.push(entry.clone());
            metrics::gauge!(observability::WAITLIST_DEPTH).increment(1.0);
        }
        Event::WaitlistLeft { id, .. } => {
            if day.remove_waitlist(*id).is_some() {
                metrics::gauge!(observability::WAITLIST_DEPTH).decrement(1.0);
            }
            entry_index.remove(id);
        }
        // Catalog and store-wide events never reach a day bucket.
        _ => {}
    }
}

/// Apply a catalog event to the slot list (caller holds the catalog lock).
fn apply_to_catalog(slots: &mut Vec<Slot>, event: &Event) {
    match event {
        Event::SlotAdded { id, label, capacity } => {
            slots.push(Slot {
                id: *id,
                label: label.clone(),
                capacity: *capacity,
                enabled: true,
            });
        }
        Event::SlotUpdated {
            id,
            label,
            capacity,
            enabled,
        } => {
            if let Some(slot) = slots.iter_mut().find(|s| s.id == *id) {
                slot.label = label.clone();
                slot.capacity = *capacity;
                slot.enabled = *enabled;
            }
        }
        _ => {}
    }
}

/// Apply a service-catalog event (caller holds the services lock).
fn apply_to_services(services: &mut Vec<Service>, event: &Event) {
    match event {
        Event::ServiceAdded {
            id,
            name,
            duration,
            price,
        } => {
            services.push(Service {
                id: *id,
                name: name.clone(),
                duration: *duration,
                price: *price,
            });
        }
        Event::ServiceRemoved { id } => {
            services.retain(|s| s.id != *id);
        }
        _ => {}
    }
}

impl Engine {
    /// Open the engine, replaying the WAL at `wal_path` into memory.
    pub fn open(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;

        let engine = Self {
            catalog: RwLock::new(Vec::new()),
            days: DashMap::new(),
            booking_index: DashMap::new(),
            entry_index: DashMap::new(),
            services: RwLock::new(Vec::new()),
            settings: RwLock::new(Settings::default()),
            templates: RwLock::new(TemplateSet::default()),
            audit: RwLock::new(AuditTrail::new()),
            wal: Mutex::new(wal),
            notify,
            ids: IdGen::new(),
        };

        // Replay — we are the sole owner of every lock here, so try_write
        // always succeeds instantly. Never block_on inside: open may run in
        // an async context.
        for event in &events {
            match event {
                Event::BookingCreated { booking } => engine.ids.observe(booking.id),
                Event::WaitlistJoined { entry } => engine.ids.observe(entry.id),
                Event::AuditRecorded { record } => engine.ids.observe(record.id),
                _ => {}
            }
            engine.apply_replayed(event);
        }

        Ok(engine)
    }

    fn apply_replayed(&self, event: &Event) {
        match event {
            Event::SlotAdded { .. } | Event::SlotUpdated { .. } => {
                let mut slots = self.catalog.try_write().expect("replay: uncontended write");
                apply_to_catalog(&mut slots, event);
            }
            Event::ServiceAdded { .. } | Event::ServiceRemoved { .. } => {
                let mut services = self.services.try_write().expect("replay: uncontended write");
                apply_to_services(&mut services, event);
            }
            Event::SettingsChanged { settings } => {
                *self.settings.try_write().expect("replay: uncontended write") = settings.clone();
            }
            Event::TemplateChanged { name, text } => {
                self.templates
                    .try_write()
                    .expect("replay: uncontended write")
                    .set(name, text);
            }
            Event::AuditRecorded { record } => {
                self.audit
                    .try_write()
                    .expect("replay: uncontended write")
                    .push(record.clone());
            }
            _ => {
                let Some(key) = event.slot_key() else { return };
                let day = self.day_bucket(&key);
                let mut guard = day.try_write().expect("replay: uncontended write");
                apply_to_day(&mut guard, event, &self.booking_index, &self.entry_index);
            }
        }
    }

    /// Get or lazily create the bucket for a slot key.
    pub(super) fn day_bucket(&self, key: &SlotKey) -> SharedDayState {
        self.days
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::new(DayState::new(key.slot_id, &key.date))))
            .value()
            .clone()
    }

    pub(super) fn day_of(&self, key: &SlotKey) -> Option<SharedDayState> {
        self.days.get(key).map(|e| e.value().clone())
    }

    pub(super) fn next_id(&self) -> i64 {
        self.ids.next()
    }

    /// Durably append a mutation's event batch: one WAL flush for the whole
    /// batch. Nothing is applied in memory if the append fails.
    pub(super) async fn persist(&self, events: &[Event]) -> Result<(), EngineError> {
        let started = Instant::now();
        let mut wal = self.wal.lock().await;
        let result = wal.append_batch(events);
        metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(events.len() as f64);
        metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        result.map_err(|e| EngineError::Storage(e.to_string()))
    }

    /// Persist, apply, and broadcast a batch that targets one day bucket.
    /// The caller holds the bucket's write lock; audit records in the batch
    /// go to the audit trail instead.
    pub(super) async fn commit_day(
        &self,
        key: &SlotKey,
        day: &mut DayState,
        events: &[Event],
    ) -> Result<(), EngineError> {
        self.persist(events).await?;
        for event in events {
            match event {
                Event::AuditRecorded { record } => self.audit.write().await.push(record.clone()),
                _ => {
                    apply_to_day(day, event, &self.booking_index, &self.entry_index);
                    self.notify.send(key, event);
                }
            }
        }
        Ok(())
    }

    /// Persist and apply a catalog batch (caller holds the catalog lock).
    pub(super) async fn commit_catalog(
        &self,
        slots: &mut Vec<Slot>,
        events: &[Event],
    ) -> Result<(), EngineError> {
        self.persist(events).await?;
        for event in events {
            match event {
                Event::AuditRecorded { record } => self.audit.write().await.push(record.clone()),
                _ => apply_to_catalog(slots, event),
            }
        }
        Ok(())
    }

    /// Persist and apply a service-catalog batch (caller holds the services
    /// lock).
    pub(super) async fn commit_services(
        &self,
        services: &mut Vec<Service>,
        events: &[Event],
    ) -> Result<(), EngineError> {
        self.persist(events).await?;
        for event in events {
            match event {
                Event::AuditRecorded { record } => self.audit.write().await.push(record.clone()),
                _ => apply_to_services(services, event),
            }
        }
        Ok(())
    }

    /// Lookup booking id → bucket, acquire its write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        id: BookingId,
    ) -> Result<(SlotKey, tokio::sync::OwnedRwLockWriteGuard<DayState>), EngineError> {
        let key = self
            .booking_index
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::BookingNotFound(id))?;
        let day = self.day_of(&key).ok_or(EngineError::BookingNotFound(id))?;
        Ok((key, day.write_owned().await))
    }

    /// Lookup waitlist entry id → bucket, acquire its write lock.
    pub(super) async fn resolve_entry_write(
        &self,
        id: EntryId,
    ) -> Result<(SlotKey, tokio::sync::OwnedRwLockWriteGuard<DayState>), EngineError> {
        let key = self
            .entry_index
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::WaitlistEntryNotFound(id))?;
        let day = self
            .day_of(&key)
            .ok_or(EngineError::WaitlistEntryNotFound(id))?;
        Ok((key, day.write_owned().await))
    }

    pub(super) fn audit_event(&self, action: &str, details: String) -> Event {
        Event::AuditRecorded {
            record: AuditRecord {
                id: self.next_id(),
                action: action.to_string(),
                details,
                timestamp: capacity::now_ms(),
            },
        }
    }
}
