use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{Event, SlotKey};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for lifecycle events, one channel per slot key. An
/// embedding surface subscribes to the (slot, date) pairs it is showing and
/// receives every applied event for that bucket without polling.
pub struct NotifyHub {
    channels: DashMap<SlotKey, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to lifecycle events for a slot key. Creates the channel if
    /// needed.
    pub fn subscribe(&self, key: SlotKey) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send an event. No-op if nobody is listening on this slot key.
    pub fn send(&self, key: &SlotKey, event: &Event) {
        if let Some(sender) = self.channels.get(key) {
            let _ = sender.send(event.clone());
        }
    }
}
