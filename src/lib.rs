//! Appointment-slot booking engine for a service business.
//!
//! Customers request a place in a fixed catalog of time slots; requests are
//! queued as `pending`, an operator approves or rejects them against
//! per-slot capacity, and overflow requests are waitlisted and promoted
//! (explicitly, never automatically) when capacity frees up.
//!
//! The [`engine::Engine`] owns all state — slot catalog, per-slotKey booking
//! and waitlist buckets, audit trail, settings, message templates — and
//! persists every mutation to a write-ahead log before applying it. Opening
//! an engine replays the log. There is no network or UI surface here;
//! embedders bind their own surface to the engine's operation set and can
//! subscribe to lifecycle events through [`notify::NotifyHub`].

pub mod audit;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod template;
pub mod wal;
