use chrono::{DateTime, Utc};

/// The type used for primary keys in the store.
pub type PrimaryKey = i32;

pub type PartyId = PrimaryKey;
pub type UserId = PrimaryKey;
pub type QueueItemId = PrimaryKey;

/// A listening party
#[derive(Debug, Clone)]
pub struct PartyData {
    pub id: PartyId,
    pub name: String,
    /// The item currently playing, if any. Owned exclusively by this party,
    /// and destroyed when superseded.
    pub playing_item: Option<QueueItemData>,
    /// The opaque token of the coordinator instance claiming this party
    pub manager_id: Option<String>,
    /// The lease heartbeat. Monotonically non-decreasing while one manager
    /// holds the claim.
    pub manager_checked_in_at: Option<DateTime<Utc>>,
}

/// A candidate or currently playing track in a party
#[derive(Debug, Clone)]
pub struct QueueItemData {
    pub id: QueueItemId,
    /// The identifier of the track on the external service
    pub track_id: String,
    /// Empty until hydrated from the metadata service
    pub title: String,
    /// Empty until hydrated from the metadata service
    pub artist: String,
    /// Unknown until hydrated from the metadata service
    pub duration_ms: Option<i64>,
    pub submitted_by: UserId,
    pub submitted_at: DateTime<Utc>,
    /// Set exactly once, when the item goes from queued to playing.
    /// Never reset afterwards.
    pub started_at: Option<DateTime<Utc>>,
}

/// One user's stance on one queue item.
/// There is at most one of these per (user, item) pair.
#[derive(Debug, Clone)]
pub struct VoteData {
    pub user_id: UserId,
    pub item_id: QueueItemId,
    /// +1 or -1, or 0 for a retracted vote
    pub value: i32,
    /// Whether the user wants the item skipped, independent of the value
    pub is_skip: bool,
}

/// The liveness record of a user in a party.
/// There is at most one of these per (user, party) pair; it is deleted
/// outright once stale.
#[derive(Debug, Clone)]
pub struct PresenceData {
    pub user_id: UserId,
    pub party_id: PartyId,
    pub first_joined: DateTime<Utc>,
    pub last_check_in: DateTime<Utc>,
}

/// A party and all of its mutable state, loaded in one unit at the start of
/// every tick
#[derive(Debug, Clone)]
pub struct PartySnapshot {
    pub party: PartyData,
    /// Queued items only, in store order. The playing item lives on the
    /// party itself.
    pub queue: Vec<QueueItemData>,
    /// Votes for every live item in the party, the playing one included
    pub votes: Vec<VoteData>,
    pub presences: Vec<PresenceData>,
}

impl PartySnapshot {
    /// How many users are currently present in the party
    pub fn user_count(&self) -> usize {
        self.presences.len()
    }
}
