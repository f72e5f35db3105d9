use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

#[allow(dead_code)]
const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for LISTEN/NOTIFY, one channel per room type. Calendar
/// consumers subscribe to the rooms they render and refetch on change.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for a room type. Creates the channel if needed.
    #[allow(dead_code)]
    pub fn subscribe(&self, room_type_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(room_type_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, room_type_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&room_type_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel (e.g. when a room type is deleted).
    #[allow(dead_code)]
    pub fn remove(&self, room_type_id: &Ulid) {
        self.channels.remove(room_type_id);
    }
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}
