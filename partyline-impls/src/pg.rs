use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, Error as SqlxError, PgPool, Row};

use partyline_core::{
    NewParty, NewQueueItem, NewVote, PartyData, PartyId, PartySnapshot, PartyStore, PresenceData,
    QueueItemData, QueueItemId, Result, StoreError, UserId, VoteData,
};

/// Helper trait to reduce boilerplate when converting sqlx errors
trait IntoStoreError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> StoreError;
    fn any(self) -> StoreError;
}

/// A postgres party store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| StoreError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    async fn party_items(&self, party_id: PartyId) -> Result<Vec<QueueItemData>> {
        sqlx::query(
            "SELECT id, track_id, title, artist, duration_ms, submitted_by, submitted_at, started_at
            FROM queue_items
            WHERE party_id = $1
            ORDER BY submitted_at, id",
        )
        .bind(party_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?
        .iter()
        .map(item_from_row)
        .collect()
    }
}

#[async_trait]
impl PartyStore for PgStore {
    async fn party_by_id(&self, party_id: PartyId) -> Result<PartySnapshot> {
        let party_row = sqlx::query(
            "SELECT id, name, playing_item_id, manager_id, manager_checked_in_at
            FROM parties
            WHERE id = $1",
        )
        .bind(party_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("party", "id"))?;

        let playing_item_id: Option<QueueItemId> =
            party_row.try_get("playing_item_id").map_err(|e| e.any())?;

        let items = self.party_items(party_id).await?;

        let playing_item = playing_item_id
            .and_then(|id| items.iter().find(|i| i.id == id))
            .cloned();

        let queue = items
            .into_iter()
            .filter(|i| i.started_at.is_none())
            .collect();

        let votes = sqlx::query(
            "SELECT votes.user_id, votes.item_id, votes.value, votes.is_skip
            FROM votes
                INNER JOIN queue_items ON votes.item_id = queue_items.id
            WHERE queue_items.party_id = $1",
        )
        .bind(party_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?
        .iter()
        .map(|row| {
            Ok(VoteData {
                user_id: row.try_get("user_id").map_err(|e| e.any())?,
                item_id: row.try_get("item_id").map_err(|e| e.any())?,
                value: row.try_get("value").map_err(|e| e.any())?,
                is_skip: row.try_get("is_skip").map_err(|e| e.any())?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

        let presences = sqlx::query(
            "SELECT user_id, party_id, first_joined, last_check_in
            FROM presences
            WHERE party_id = $1",
        )
        .bind(party_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?
        .iter()
        .map(|row| {
            Ok(PresenceData {
                user_id: row.try_get("user_id").map_err(|e| e.any())?,
                party_id: row.try_get("party_id").map_err(|e| e.any())?,
                first_joined: row.try_get("first_joined").map_err(|e| e.any())?,
                last_check_in: row.try_get("last_check_in").map_err(|e| e.any())?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

        Ok(PartySnapshot {
            party: PartyData {
                id: party_row.try_get("id").map_err(|e| e.any())?,
                name: party_row.try_get("name").map_err(|e| e.any())?,
                playing_item,
                manager_id: party_row.try_get("manager_id").map_err(|e| e.any())?,
                manager_checked_in_at: party_row
                    .try_get("manager_checked_in_at")
                    .map_err(|e| e.any())?,
            },
            queue,
            votes,
            presences,
        })
    }

    async fn create_party(&self, new_party: NewParty) -> Result<PartyData> {
        let row = sqlx::query("INSERT INTO parties (name) VALUES ($1) RETURNING id")
            .bind(&new_party.name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(PartyData {
            id: row.try_get("id").map_err(|e| e.any())?,
            name: new_party.name,
            playing_item: None,
            manager_id: None,
            manager_checked_in_at: None,
        })
    }

    async fn save_party(&self, party: &PartyData) -> Result<()> {
        let result = sqlx::query(
            "UPDATE parties SET
                playing_item_id = $1,
                manager_id = $2,
                manager_checked_in_at = $3
            WHERE id = $4",
        )
        .bind(party.playing_item.as_ref().map(|i| i.id))
        .bind(&party.manager_id)
        .bind(party.manager_checked_in_at)
        .bind(party.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                resource: "party",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn add_queue_item(&self, new_item: NewQueueItem) -> Result<QueueItemData> {
        let row = sqlx::query(
            "INSERT INTO queue_items (party_id, track_id, submitted_by, submitted_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id",
        )
        .bind(new_item.party_id)
        .bind(&new_item.track_id)
        .bind(new_item.submitted_by)
        .bind(new_item.submitted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(QueueItemData {
            id: row.try_get("id").map_err(|e| e.any())?,
            track_id: new_item.track_id,
            title: String::new(),
            artist: String::new(),
            duration_ms: None,
            submitted_by: new_item.submitted_by,
            submitted_at: new_item.submitted_at,
            started_at: None,
        })
    }

    async fn update_queue_item(&self, item: &QueueItemData) -> Result<()> {
        let result = sqlx::query(
            "UPDATE queue_items SET
                title = $1,
                artist = $2,
                duration_ms = $3,
                started_at = $4
            WHERE id = $5",
        )
        .bind(&item.title)
        .bind(&item.artist)
        .bind(item.duration_ms)
        .bind(item.started_at)
        .bind(item.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                resource: "queue item",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn delete_queue_item(&self, item_id: QueueItemId) -> Result<()> {
        // Votes cascade with the item
        let result = sqlx::query("DELETE FROM queue_items WHERE id = $1")
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                resource: "queue item",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn upsert_vote(&self, new_vote: NewVote) -> Result<()> {
        sqlx::query(
            "INSERT INTO votes (user_id, item_id, value, is_skip)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, item_id)
            DO UPDATE SET value = EXCLUDED.value, is_skip = EXCLUDED.is_skip",
        )
        .bind(new_vote.user_id)
        .bind(new_vote.item_id)
        .bind(new_vote.value)
        .bind(new_vote.is_skip)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn check_in(
        &self,
        user_id: UserId,
        party_id: PartyId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO presences (user_id, party_id, first_joined, last_check_in)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (user_id, party_id)
            DO UPDATE SET last_check_in = EXCLUDED.last_check_in",
        )
        .bind(user_id)
        .bind(party_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn prune_presences(&self, party_id: PartyId, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM presences WHERE party_id = $1 AND last_check_in < $2",
        )
        .bind(party_id)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(result.rows_affected())
    }
}

fn item_from_row(row: &PgRow) -> Result<QueueItemData> {
    Ok(QueueItemData {
        id: row.try_get("id").map_err(|e| e.any())?,
        track_id: row.try_get("track_id").map_err(|e| e.any())?,
        title: row.try_get("title").map_err(|e| e.any())?,
        artist: row.try_get("artist").map_err(|e| e.any())?,
        duration_ms: row.try_get("duration_ms").map_err(|e| e.any())?,
        submitted_by: row.try_get("submitted_by").map_err(|e| e.any())?,
        submitted_at: row.try_get("submitted_at").map_err(|e| e.any())?,
        started_at: row.try_get("started_at").map_err(|e| e.any())?,
    })
}

impl IntoStoreError for SqlxError {
    fn any(self) -> StoreError {
        StoreError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> StoreError {
        match self {
            SqlxError::RowNotFound => StoreError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
