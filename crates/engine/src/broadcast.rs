//! In-process room broadcaster.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::{Broadcaster, SinkError};

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoomEvent {
    pub room: String,
    pub event: String,
    pub payload: Value,
}

/// Fans room events out to every subscriber over a tokio broadcast channel.
///
/// Emitting with nobody listening is not an error: realtime delivery is
/// advisory.
#[derive(Clone, Debug)]
pub struct RoomBroadcaster {
    sender: broadcast::Sender<RoomEvent>,
}

impl Default for RoomBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RoomBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive events for every room.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    /// Receive events for a single room.
    pub fn subscribe_room(&self, room: impl Into<String>) -> RoomSubscription {
        RoomSubscription {
            room: room.into(),
            receiver: self.sender.subscribe(),
        }
    }
}

#[async_trait]
impl Broadcaster for RoomBroadcaster {
    async fn emit(&self, room: &str, event: &str, payload: &Value) -> Result<(), SinkError> {
        let event = RoomEvent {
            room: room.to_string(),
            event: event.to_string(),
            payload: payload.clone(),
        };
        // `send` only fails when there are no receivers.
        if self.sender.send(event).is_err() {
            tracing::trace!(room, "no subscribers for room event");
        }
        Ok(())
    }
}

pub struct RoomSubscription {
    room: String,
    receiver: broadcast::Receiver<RoomEvent>,
}

impl RoomSubscription {
    /// Next event for this room, or `None` once the broadcaster is gone.
    ///
    /// A slow subscriber that lagged behind skips the dropped events.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.room == self.room => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(room = %self.room, skipped, "room subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn emitting_without_subscribers_is_ok() {
        let broadcaster = RoomBroadcaster::new(4);
        assert!(broadcaster.emit("global", "x", &json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn room_subscription_filters_other_rooms() {
        let broadcaster = RoomBroadcaster::new(8);
        let mut room = broadcaster.subscribe_room("booking-1");

        broadcaster
            .emit("booking-2", "booking-status-changed", &json!({"n": 2}))
            .await
            .unwrap();
        broadcaster
            .emit("booking-1", "booking-status-changed", &json!({"n": 1}))
            .await
            .unwrap();

        let event = room.recv().await.unwrap();
        assert_eq!(event.room, "booking-1");
        assert_eq!(event.payload, json!({"n": 1}));
    }
}
