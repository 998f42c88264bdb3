use crate::model::*;

use super::capacity::{self, status_of};
use super::{Engine, EngineError, SharedDayState};

impl Engine {
    // ── Slot catalog ─────────────────────────────────────────

    pub async fn list_slots(&self) -> Vec<Slot> {
        self.catalog.read().await.clone()
    }

    pub async fn slot(&self, id: SlotId) -> Result<Slot, EngineError> {
        self.catalog
            .read()
            .await
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(EngineError::SlotNotFound(id))
    }

    /// Real-time occupancy of one (slot, date) pair, recomputed from the
    /// live booking set.
    pub async fn slot_status(&self, slot_id: SlotId, date: &str) -> Result<SlotStatus, EngineError> {
        if !capacity::valid_date(date) {
            return Err(EngineError::Validation("date must be YYYY-MM-DD"));
        }
        let slot = self.slot(slot_id).await?;
        match self.day_of(&SlotKey::new(date, slot_id)) {
            Some(day) => Ok(status_of(&slot, &day.read().await.bookings)),
            None => Ok(status_of(&slot, &[])),
        }
    }

    // ── Bookings ─────────────────────────────────────────────

    /// All bookings across all slot keys, in creation order.
    pub async fn list_bookings(&self) -> Vec<Booking> {
        let mut bookings = Vec::new();
        for day in self.day_buckets() {
            bookings.extend(day.read().await.bookings.iter().cloned());
        }
        bookings.sort_by_key(|b| b.id);
        bookings
    }

    /// Bookings in one status, oldest request first.
    pub async fn bookings_by_status(&self, status: BookingStatus) -> Vec<Booking> {
        let mut bookings = Vec::new();
        for day in self.day_buckets() {
            let guard = day.read().await;
            bookings.extend(guard.bookings.iter().filter(|b| b.status == status).cloned());
        }
        bookings.sort_by_key(|b| (b.created_at, b.id));
        bookings
    }

    /// Bookings for one calendar day, cancellations excluded.
    pub async fn bookings_for_date(&self, date: &str) -> Vec<Booking> {
        let mut bookings = Vec::new();
        for day in self.day_buckets() {
            let guard = day.read().await;
            if guard.date == date {
                bookings.extend(
                    guard
                        .bookings
                        .iter()
                        .filter(|b| b.status != BookingStatus::Cancelled)
                        .cloned(),
                );
            }
        }
        bookings.sort_by_key(|b| b.id);
        bookings
    }

    pub async fn booking_by_id(&self, id: BookingId) -> Result<Booking, EngineError> {
        let key = self
            .booking_index
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::BookingNotFound(id))?;
        let day = self.day_of(&key).ok_or(EngineError::BookingNotFound(id))?;
        let guard = day.read().await;
        guard.booking(id).cloned().ok_or(EngineError::BookingNotFound(id))
    }

    /// Pending/confirmed/rejected counters for the admin queue view.
    /// `total` excludes cancelled bookings.
    pub async fn queue_stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            pending: 0,
            confirmed: 0,
            rejected: 0,
            total: 0,
        };
        for day in self.day_buckets() {
            let guard = day.read().await;
            for booking in &guard.bookings {
                match booking.status {
                    BookingStatus::Pending => stats.pending += 1,
                    BookingStatus::Confirmed => stats.confirmed += 1,
                    BookingStatus::Rejected => stats.rejected += 1,
                    BookingStatus::Cancelled => continue,
                }
                stats.total += 1;
            }
        }
        stats
    }

    // ── Waitlist ─────────────────────────────────────────────

    /// Waitlist entries for one (slot, date) pair in FIFO order. The first
    /// entry is the promotion candidate.
    pub async fn waitlist_for(&self, slot_id: SlotId, date: &str) -> Vec<WaitlistEntry> {
        match self.day_of(&SlotKey::new(date, slot_id)) {
            Some(day) => day.read().await.waitlist.clone(),
            None => Vec::new(),
        }
    }

    // ── Periphery ────────────────────────────────────────────

    /// Administrative actions, most recent first, capped at the trail bound.
    pub async fn audit_logs(&self) -> Vec<AuditRecord> {
        self.audit.read().await.records().cloned().collect()
    }

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// The single shared-secret comparison kept in scope.
    pub async fn check_password(&self, input: &str) -> bool {
        self.settings.read().await.check_password(input)
    }

    pub async fn template(&self, name: &str) -> Option<String> {
        self.templates.read().await.get(name).map(str::to_string)
    }

    /// Render a message template with straight `{{field}}` substitution.
    pub async fn render_template(&self, name: &str, fields: &[(&str, &str)]) -> Option<String> {
        self.templates.read().await.render(name, fields)
    }

    pub async fn list_services(&self) -> Vec<Service> {
        self.services.read().await.clone()
    }

    // ── Snapshot ─────────────────────────────────────────────

    /// Export the logical document layout: one JSON-serializable collection
    /// per store key. Reopening an engine from its WAL yields an equal
    /// snapshot.
    pub async fn snapshot(&self) -> Documents {
        let mut waitlist = Vec::new();
        for day in self.day_buckets() {
            waitlist.extend(day.read().await.waitlist.iter().cloned());
        }
        waitlist.sort_by_key(|e| (e.added_at, e.id));

        Documents {
            slots: self.list_slots().await,
            bookings: self.list_bookings().await,
            waitlist,
            audit_logs: self.audit_logs().await,
            settings: self.settings().await,
            message_templates: self.templates.read().await.all().clone(),
        }
    }

    /// Snapshot of every day bucket; taken eagerly so no DashMap shard lock
    /// is held across an await.
    fn day_buckets(&self) -> Vec<SharedDayState> {
        self.days.iter().map(|e| e.value().clone()).collect()
    }
}
