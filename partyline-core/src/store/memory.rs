use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;

use super::{
    NewParty, NewQueueItem, NewVote, PartyData, PartyId, PartySnapshot, PartyStore, PresenceData,
    PrimaryKey, QueueItemData, QueueItemId, Result, StoreError, UserId, VoteData,
};

/// An in-memory party store, used in tests and by embedders that don't need
/// persistence across restarts.
#[derive(Default)]
pub struct MemoryStore {
    parties: DashMap<PartyId, PartyRecord>,
    id_counter: AtomicCell<PrimaryKey>,
}

struct PartyRecord {
    party: PartyData,
    /// Every live item in the party, the playing one included
    items: Vec<QueueItemData>,
    votes: Vec<VoteData>,
    presences: Vec<PresenceData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> PrimaryKey {
        self.id_counter.fetch_add(1) + 1
    }
}

#[async_trait]
impl PartyStore for MemoryStore {
    async fn party_by_id(&self, party_id: PartyId) -> Result<PartySnapshot> {
        let record = self
            .parties
            .get(&party_id)
            .ok_or(StoreError::NotFound {
                resource: "party",
                identifier: "id",
            })?;

        // The playing item pointer is resolved against the live item rows,
        // so item updates are visible through the party as well.
        let playing_item = record
            .party
            .playing_item
            .as_ref()
            .and_then(|playing| record.items.iter().find(|i| i.id == playing.id))
            .cloned();

        let queue = record
            .items
            .iter()
            .filter(|i| i.started_at.is_none())
            .cloned()
            .collect();

        Ok(PartySnapshot {
            party: PartyData {
                playing_item,
                ..record.party.clone()
            },
            queue,
            votes: record.votes.clone(),
            presences: record.presences.clone(),
        })
    }

    async fn create_party(&self, new_party: NewParty) -> Result<PartyData> {
        let party = PartyData {
            id: self.next_id(),
            name: new_party.name,
            playing_item: None,
            manager_id: None,
            manager_checked_in_at: None,
        };

        self.parties.insert(
            party.id,
            PartyRecord {
                party: party.clone(),
                items: vec![],
                votes: vec![],
                presences: vec![],
            },
        );

        Ok(party)
    }

    async fn save_party(&self, party: &PartyData) -> Result<()> {
        let mut record = self
            .parties
            .get_mut(&party.id)
            .ok_or(StoreError::NotFound {
                resource: "party",
                identifier: "id",
            })?;

        record.party = party.clone();
        Ok(())
    }

    async fn add_queue_item(&self, new_item: NewQueueItem) -> Result<QueueItemData> {
        let mut record = self
            .parties
            .get_mut(&new_item.party_id)
            .ok_or(StoreError::NotFound {
                resource: "party",
                identifier: "id",
            })?;

        let item = QueueItemData {
            id: self.next_id(),
            track_id: new_item.track_id,
            title: String::new(),
            artist: String::new(),
            duration_ms: None,
            submitted_by: new_item.submitted_by,
            submitted_at: new_item.submitted_at,
            started_at: None,
        };

        record.items.push(item.clone());
        Ok(item)
    }

    async fn update_queue_item(&self, item: &QueueItemData) -> Result<()> {
        for mut record in self.parties.iter_mut() {
            if let Some(existing) = record.items.iter_mut().find(|i| i.id == item.id) {
                *existing = item.clone();
                return Ok(());
            }
        }

        Err(StoreError::NotFound {
            resource: "queue item",
            identifier: "id",
        })
    }

    async fn delete_queue_item(&self, item_id: QueueItemId) -> Result<()> {
        for mut record in self.parties.iter_mut() {
            if record.items.iter().any(|i| i.id == item_id) {
                record.items.retain(|i| i.id != item_id);
                record.votes.retain(|v| v.item_id != item_id);
                return Ok(());
            }
        }

        Err(StoreError::NotFound {
            resource: "queue item",
            identifier: "id",
        })
    }

    async fn upsert_vote(&self, new_vote: NewVote) -> Result<()> {
        for mut record in self.parties.iter_mut() {
            if !record.items.iter().any(|i| i.id == new_vote.item_id) {
                continue;
            }

            let vote = VoteData {
                user_id: new_vote.user_id,
                item_id: new_vote.item_id,
                value: new_vote.value,
                is_skip: new_vote.is_skip,
            };

            let existing = record
                .votes
                .iter()
                .position(|v| v.user_id == new_vote.user_id && v.item_id == new_vote.item_id);

            match existing {
                Some(index) => record.votes[index] = vote,
                None => record.votes.push(vote),
            }

            return Ok(());
        }

        Err(StoreError::NotFound {
            resource: "queue item",
            identifier: "id",
        })
    }

    async fn check_in(
        &self,
        user_id: UserId,
        party_id: PartyId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut record = self
            .parties
            .get_mut(&party_id)
            .ok_or(StoreError::NotFound {
                resource: "party",
                identifier: "id",
            })?;

        let existing = record.presences.iter().position(|p| p.user_id == user_id);

        match existing {
            Some(index) => record.presences[index].last_check_in = at,
            None => record.presences.push(PresenceData {
                user_id,
                party_id,
                first_joined: at,
                last_check_in: at,
            }),
        }

        Ok(())
    }

    async fn prune_presences(&self, party_id: PartyId, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut record = self
            .parties
            .get_mut(&party_id)
            .ok_or(StoreError::NotFound {
                resource: "party",
                identifier: "id",
            })?;

        let before = record.presences.len();
        record.presences.retain(|p| p.last_check_in >= cutoff);

        Ok((before - record.presences.len()) as u64)
    }
}
