use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unix-epoch milliseconds; the engine's only time type.
pub type Ms = i64;

/// Catalog ordinal of a slot, assigned `max(existing) + 1`.
pub type SlotId = u32;

/// Timestamp-derived booking id.
pub type BookingId = i64;

/// Timestamp-derived waitlist entry id.
pub type EntryId = i64;

/// Catalog ordinal of a service.
pub type ServiceId = u32;

/// Composite grouping key for capacity accounting: one calendar day of one
/// slot. Rendered as `{date}-{slot_id}`; parsed from the right because the
/// date itself contains `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub date: String,
    pub slot_id: SlotId,
}

impl SlotKey {
    pub fn new(date: &str, slot_id: SlotId) -> Self {
        Self {
            date: date.to_string(),
            slot_id,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.date, self.slot_id)
    }
}

impl FromStr for SlotKey {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (date, id) = s.rsplit_once('-').ok_or("slot key missing separator")?;
        let slot_id = id.parse().map_err(|_| "slot key has non-numeric slot id")?;
        if date.is_empty() {
            return Err("slot key missing date");
        }
        Ok(Self {
            date: date.to_string(),
            slot_id,
        })
    }
}

impl Serialize for SlotKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A bookable time window with fixed capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub label: String,
    pub capacity: u32,
    pub enabled: bool,
}

/// Partial update for a slot. `id` is immutable; `label` is mutable but
/// conventionally fixed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotPatch {
    pub label: Option<String>,
    pub capacity: Option<u32>,
    pub enabled: Option<bool>,
}

/// Canonical booking status vocabulary. The source systems' `accepted` and
/// `waiting` labels are accepted on load as aliases of `confirmed` and
/// `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[serde(alias = "waiting")]
    Pending,
    #[serde(alias = "accepted")]
    Confirmed,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    /// The counted set: statuses that consume slot capacity. A request
    /// reserves capacity as soon as it is queued, not only once approved.
    pub fn counts_against_capacity(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Whether a transition from `self` to `next` is allowed. Terminal
    /// statuses admit no further transitions; a confirmed booking can still
    /// be cancelled.
    pub fn allows(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Rejected) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One entry in a booking's own transition history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: BookingStatus,
    pub timestamp: Ms,
    pub note: String,
}

/// Incoming booking request: customer identity plus the requested slot and
/// date, with the optional fields a submission surface may or may not send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub service: Option<String>,
    pub slot_id: SlotId,
    pub date: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub phone_verified: Option<bool>,
}

impl BookingRequest {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(&self.date, self.slot_id)
    }
}

/// An admitted booking. Never physically deleted; cancellation is a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service: Option<String>,
    pub slot_id: SlotId,
    pub date: String,
    /// Always `{date}-{slot_id}`; computed once at admission.
    pub slot_key: SlotKey,
    pub status: BookingStatus,
    pub created_at: Ms,
    /// Append-only; the last entry's status equals `status`.
    pub history: Vec<HistoryEntry>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub notes: String,
    pub source: String,
    pub priority: i32,
    pub phone_verified: bool,
}

impl Booking {
    /// Construct a pending booking from a request, applying the named
    /// defaults for the optional fields exactly once.
    pub fn admit(id: BookingId, request: BookingRequest, now: Ms) -> Self {
        let slot_key = request.slot_key();
        Self {
            id,
            name: request.name,
            email: request.email,
            phone: request.phone,
            service: request.service,
            slot_id: request.slot_id,
            date: request.date,
            slot_key,
            status: BookingStatus::Pending,
            created_at: now,
            history: vec![HistoryEntry {
                status: BookingStatus::Pending,
                timestamp: now,
                note: "booking created".into(),
            }],
            rejection_reason: None,
            cancellation_reason: None,
            notes: request.notes.unwrap_or_default(),
            source: request.source.unwrap_or_else(|| "web".into()),
            priority: request.priority.unwrap_or(0),
            phone_verified: request.phone_verified.unwrap_or(false),
        }
    }

    /// Apply a status transition: set the status, append the history entry,
    /// and record the reason on the matching terminal field. Callers check
    /// `BookingStatus::allows` first; replay trusts the log.
    pub fn apply_transition(&mut self, status: BookingStatus, timestamp: Ms, note: &str, reason: Option<&str>) {
        self.status = status;
        self.history.push(HistoryEntry {
            status,
            timestamp,
            note: note.to_string(),
        });
        match status {
            BookingStatus::Rejected => self.rejection_reason = reason.map(str::to_string),
            BookingStatus::Cancelled => self.cancellation_reason = reason.map(str::to_string),
            _ => {}
        }
    }
}

/// An overflow request queued for a full or disabled slot. Converted into a
/// booking on promotion, otherwise kept indefinitely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    pub id: EntryId,
    pub request: BookingRequest,
    pub added_at: Ms,
}

impl WaitlistEntry {
    pub fn slot_key(&self) -> SlotKey {
        self.request.slot_key()
    }
}

/// A service the business offers. Duration in minutes, price in whole
/// currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub duration: u32,
    pub price: u32,
}

/// Store-wide settings, including the shared admin secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub business_name: String,
    pub currency: String,
    pub slot_interval: u32,
    pub admin_password: String,
}

impl Settings {
    /// Single shared-secret comparison; the only authentication in scope.
    pub fn check_password(&self, input: &str) -> bool {
        input == self.admin_password
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            business_name: "Slotbook".into(),
            currency: "£".into(),
            slot_interval: 30,
            admin_password: "slotbook".into(),
        }
    }
}

/// One administrative action in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub action: String,
    pub details: String,
    pub timestamp: Ms,
}

/// All bookings and waitlist entries for one (slot, date) pair. The unit of
/// locking: admission decisions for a slot key happen under this bucket's
/// write lock.
#[derive(Debug, Clone)]
pub struct DayState {
    pub slot_id: SlotId,
    pub date: String,
    /// Insertion order = creation order.
    pub bookings: Vec<Booking>,
    /// Insertion order = FIFO promotion order.
    pub waitlist: Vec<WaitlistEntry>,
}

impl DayState {
    pub fn new(slot_id: SlotId, date: &str) -> Self {
        Self {
            slot_id,
            date: date.to_string(),
            bookings: Vec::new(),
            waitlist: Vec::new(),
        }
    }

    pub fn key(&self) -> SlotKey {
        SlotKey::new(&self.date, self.slot_id)
    }

    pub fn booking(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: BookingId) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    pub fn waitlist_entry(&self, id: EntryId) -> Option<&WaitlistEntry> {
        self.waitlist.iter().find(|e| e.id == id)
    }

    /// Remove a waitlist entry by id, preserving FIFO order of the rest.
    pub fn remove_waitlist(&mut self, id: EntryId) -> Option<WaitlistEntry> {
        let pos = self.waitlist.iter().position(|e| e.id == id)?;
        Some(self.waitlist.remove(pos))
    }
}

/// The event types — the WAL record format. State is rebuilt by replaying
/// these in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    SlotAdded {
        id: SlotId,
        label: String,
        capacity: u32,
    },
    SlotUpdated {
        id: SlotId,
        label: String,
        capacity: u32,
        enabled: bool,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingTransitioned {
        id: BookingId,
        slot_key: SlotKey,
        status: BookingStatus,
        timestamp: Ms,
        note: String,
        reason: Option<String>,
    },
    WaitlistJoined {
        entry: WaitlistEntry,
    },
    WaitlistLeft {
        id: EntryId,
        slot_key: SlotKey,
    },
    ServiceAdded {
        id: ServiceId,
        name: String,
        duration: u32,
        price: u32,
    },
    ServiceRemoved {
        id: ServiceId,
    },
    SettingsChanged {
        settings: Settings,
    },
    TemplateChanged {
        name: String,
        text: String,
    },
    AuditRecorded {
        record: AuditRecord,
    },
}

impl Event {
    /// The slot key this event belongs to, for notify routing. Catalog and
    /// store-wide events carry none.
    pub fn slot_key(&self) -> Option<SlotKey> {
        match self {
            Event::BookingCreated { booking } => Some(booking.slot_key.clone()),
            Event::BookingTransitioned { slot_key, .. } | Event::WaitlistLeft { slot_key, .. } => {
                Some(slot_key.clone())
            }
            Event::WaitlistJoined { entry } => Some(entry.slot_key()),
            _ => None,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

/// Derived occupancy state of one (slot, date) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Disabled,
    Full,
    Available,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotState::Disabled => "disabled",
            SlotState::Full => "full",
            SlotState::Available => "available",
        };
        f.write_str(s)
    }
}

/// Real-time occupancy report for one (slot, date) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotStatus {
    pub slot_id: SlotId,
    pub label: String,
    pub capacity: u32,
    pub occupied: u32,
    pub available: u32,
    pub state: SlotState,
}

/// Result of `create_booking`: either an admitted pending booking or a
/// waitlisted overflow request. Both are successes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Booked(Booking),
    Waitlisted(WaitlistEntry),
}

impl CreateOutcome {
    pub fn is_waitlisted(&self) -> bool {
        matches!(self, CreateOutcome::Waitlisted(_))
    }

    /// Outcome line for a submission surface.
    pub fn message(&self) -> &'static str {
        match self {
            CreateOutcome::Booked(_) => "booking created",
            CreateOutcome::Waitlisted(_) => "slot unavailable, added to waitlist",
        }
    }

    pub fn booking(&self) -> Option<&Booking> {
        match self {
            CreateOutcome::Booked(b) => Some(b),
            CreateOutcome::Waitlisted(_) => None,
        }
    }
}

/// Result of a capacity-freeing transition. The head waitlist candidate for
/// the freed slot key is surfaced here; promotion itself stays an explicit,
/// separately invoked operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub booking: Booking,
    pub promotion_candidate: Option<WaitlistEntry>,
}

/// Admin queue counters. `total` excludes cancelled bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub confirmed: usize,
    pub rejected: usize,
    pub total: usize,
}

/// The logical persisted-state layout: one JSON-serializable document per
/// collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Documents {
    pub slots: Vec<Slot>,
    pub bookings: Vec<Booking>,
    pub waitlist: Vec<WaitlistEntry>,
    pub audit_logs: Vec<AuditRecord>,
    pub settings: Settings,
    pub message_templates: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, date: &str, slot_id: SlotId) -> BookingRequest {
        BookingRequest {
            name: "Ada".into(),
            email: email.into(),
            phone: "0700000000".into(),
            service: None,
            slot_id,
            date: date.into(),
            notes: None,
            source: None,
            priority: None,
            phone_verified: None,
        }
    }

    #[test]
    fn slot_key_display_and_parse() {
        let key = SlotKey::new("2026-08-06", 3);
        assert_eq!(key.to_string(), "2026-08-06-3");
        let parsed: SlotKey = "2026-08-06-3".parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn slot_key_parse_rejects_garbage() {
        assert!("nodash".parse::<SlotKey>().is_err());
        assert!("2026-08-06-abc".parse::<SlotKey>().is_err());
        assert!("-3".parse::<SlotKey>().is_err());
    }

    #[test]
    fn slot_key_serde_as_string() {
        let key = SlotKey::new("2026-08-06", 12);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"2026-08-06-12\"");
        let back: SlotKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn status_aliases_collapse() {
        let confirmed: BookingStatus = serde_json::from_str("\"accepted\"").unwrap();
        assert_eq!(confirmed, BookingStatus::Confirmed);
        let pending: BookingStatus = serde_json::from_str("\"waiting\"").unwrap();
        assert_eq!(pending, BookingStatus::Pending);
        // Canonical labels round-trip.
        assert_eq!(serde_json::to_string(&BookingStatus::Confirmed).unwrap(), "\"confirmed\"");
    }

    #[test]
    fn counted_set_is_pending_and_confirmed() {
        assert!(BookingStatus::Pending.counts_against_capacity());
        assert!(BookingStatus::Confirmed.counts_against_capacity());
        assert!(!BookingStatus::Rejected.counts_against_capacity());
        assert!(!BookingStatus::Cancelled.counts_against_capacity());
    }

    #[test]
    fn transition_guard() {
        use BookingStatus::*;
        assert!(Pending.allows(Confirmed));
        assert!(Pending.allows(Rejected));
        assert!(Pending.allows(Cancelled));
        assert!(Confirmed.allows(Cancelled));

        assert!(!Confirmed.allows(Rejected));
        assert!(!Confirmed.allows(Confirmed));
        assert!(!Rejected.allows(Confirmed));
        assert!(!Cancelled.allows(Pending));
        assert!(!Cancelled.allows(Cancelled));
    }

    #[test]
    fn admit_applies_named_defaults() {
        let b = Booking::admit(42, request("ada@example.com", "2026-08-06", 2), 1_000);
        assert_eq!(b.status, BookingStatus::Pending);
        assert_eq!(b.slot_key, SlotKey::new("2026-08-06", 2));
        assert_eq!(b.notes, "");
        assert_eq!(b.source, "web");
        assert_eq!(b.priority, 0);
        assert!(!b.phone_verified);
        assert_eq!(b.history.len(), 1);
        assert_eq!(b.history[0].status, BookingStatus::Pending);
    }

    #[test]
    fn admit_keeps_provided_optionals() {
        let mut req = request("ada@example.com", "2026-08-06", 2);
        req.notes = Some("ring twice".into());
        req.source = Some("phone".into());
        req.priority = Some(5);
        req.phone_verified = Some(true);
        let b = Booking::admit(42, req, 1_000);
        assert_eq!(b.notes, "ring twice");
        assert_eq!(b.source, "phone");
        assert_eq!(b.priority, 5);
        assert!(b.phone_verified);
    }

    #[test]
    fn transition_appends_history_and_reason() {
        let mut b = Booking::admit(7, request("a@b.c", "2026-08-06", 1), 1_000);
        b.apply_transition(BookingStatus::Confirmed, 2_000, "status changed to confirmed", None);
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(b.history.last().unwrap().status, b.status);

        b.apply_transition(BookingStatus::Cancelled, 3_000, "customer request", Some("customer request"));
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert_eq!(b.cancellation_reason.as_deref(), Some("customer request"));
        assert_eq!(b.rejection_reason, None);
        assert_eq!(b.history.len(), 3);
        assert_eq!(b.history.last().unwrap().status, b.status);
    }

    #[test]
    fn day_state_waitlist_removal_preserves_fifo() {
        let mut day = DayState::new(1, "2026-08-06");
        for id in [10, 20, 30] {
            day.waitlist.push(WaitlistEntry {
                id,
                request: request(&format!("{id}@example.com"), "2026-08-06", 1),
                added_at: id,
            });
        }
        let removed = day.remove_waitlist(20).unwrap();
        assert_eq!(removed.id, 20);
        let ids: Vec<EntryId> = day.waitlist.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![10, 30]);
        assert!(day.remove_waitlist(99).is_none());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let booking = Booking::admit(
            1_722_900_000_000,
            request("ada@example.com", "2026-08-06", 4),
            1_722_900_000_000,
        );
        let event = Event::BookingCreated { booking };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn event_slot_key_routing() {
        let key = SlotKey::new("2026-08-06", 4);
        let event = Event::WaitlistLeft { id: 1, slot_key: key.clone() };
        assert_eq!(event.slot_key(), Some(key));
        let event = Event::SlotAdded { id: 1, label: "09:00 - 11:00".into(), capacity: 3 };
        assert_eq!(event.slot_key(), None);
    }

    #[test]
    fn settings_password_check() {
        let settings = Settings::default();
        assert!(settings.check_password("slotbook"));
        assert!(!settings.check_password("wrong"));
        assert!(!settings.check_password(""));
    }
}
