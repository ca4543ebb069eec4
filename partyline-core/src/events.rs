use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

use crate::{PartyId, UserId};

/// A state change pushed to the clients connected to a party.
/// Delivery is fire-and-forget; the coordinator never waits on it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Player(PlayerStatePayload),
    Queue(Vec<QueueEntryPayload>),
}

/// What is currently playing, and where it is
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlayerStatePayload {
    pub playing_track_key: Option<String>,
    pub playing_track_user: Option<UserId>,
    pub playing_track_position_ms: i64,
    pub playing_track_duration_ms: i64,
}

/// One entry of the vote-ordered queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntryPayload {
    pub queue_entry_id: i32,
    pub track_key: String,
    pub title: String,
    pub artist: String,
    pub submitter: UserId,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}

/// Represents the push mechanism that notifies connected clients of state
/// changes.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, party_id: PartyId, payload: Payload);
}

/// A notifier that keeps every payload it receives, so state changes can be
/// asserted on.
#[derive(Default)]
pub struct CollectingNotifier {
    payloads: Mutex<Vec<(PartyId, Payload)>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every payload sent so far
    pub fn payloads(&self) -> Vec<(PartyId, Payload)> {
        self.payloads.lock().clone()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, party_id: PartyId, payload: Payload) {
        self.payloads.lock().push((party_id, payload));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_payload_serialization() {
        let payload = Payload::Player(PlayerStatePayload {
            playing_track_key: Some("abc123".to_string()),
            playing_track_user: Some(7),
            playing_track_position_ms: 1500,
            playing_track_duration_ms: 200_000,
        });

        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "player");
        assert_eq!(json["data"]["playing_track_key"], "abc123");
        assert_eq!(json["data"]["playing_track_position_ms"], 1500);
    }
}
