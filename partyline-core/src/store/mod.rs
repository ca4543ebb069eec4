use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// An unknown or internal error happened with the store
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A record already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The record in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A record in the store doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Represents a type that persists parties and everything belonging to them.
///
/// This is the only resource shared between competing coordinator instances,
/// so every mutation here must make sense when applied by a manager that is
/// about to discover it lost ownership.
#[async_trait]
pub trait PartyStore: Send + Sync + 'static {
    /// Reads a party and all of its mutable state in one unit
    async fn party_by_id(&self, party_id: PartyId) -> Result<PartySnapshot>;
    async fn create_party(&self, new_party: NewParty) -> Result<PartyData>;
    /// Persists the party row itself: the playing item pointer, the manager
    /// token, and the lease heartbeat
    async fn save_party(&self, party: &PartyData) -> Result<()>;

    async fn add_queue_item(&self, new_item: NewQueueItem) -> Result<QueueItemData>;
    /// Persists hydrated metadata and the playback start timestamp
    async fn update_queue_item(&self, item: &QueueItemData) -> Result<()>;
    /// Retires a queue item, deleting its votes with it
    async fn delete_queue_item(&self, item_id: QueueItemId) -> Result<()>;

    /// Records a user's vote on a queue item, replacing any earlier vote by
    /// the same user on the same item
    async fn upsert_vote(&self, new_vote: NewVote) -> Result<()>;

    /// Creates or refreshes the presence of a user in a party
    async fn check_in(&self, user_id: UserId, party_id: PartyId, at: DateTime<Utc>)
        -> Result<()>;
    /// Deletes every presence in the party older than the cutoff, returning
    /// the amount removed
    async fn prune_presences(&self, party_id: PartyId, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[derive(Debug)]
pub struct NewParty {
    pub name: String,
}

#[derive(Debug)]
pub struct NewQueueItem {
    pub party_id: PartyId,
    /// The identifier of the track on the external service
    pub track_id: String,
    /// The user submitting the item
    pub submitted_by: UserId,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewVote {
    pub user_id: UserId,
    pub item_id: QueueItemId,
    /// +1 or -1, or 0 to retract
    pub value: i32,
    pub is_skip: bool,
}
