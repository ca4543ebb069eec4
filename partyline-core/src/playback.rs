//! The per-tick playback state machine: tracks elapsed play time, decides
//! when the playing item is over or voted out, and advances the queue.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::{
    queue, store, votes, CoordinatorContext, MetadataLookup, Notifier, PartyData, PartySnapshot,
    PartyStore, Payload, PlayerStatePayload, QueueItemData,
};

/// Gets `(position_ms, duration_ms)` for a queue item.
///
/// An item with an unknown or zero duration reports `(0, 0)` and never ends
/// on its own; an item that hasn't started yet reports the beginning. The
/// position is clamped so it is never negative and never past the duration.
pub fn track_position(item: &QueueItemData, now: DateTime<Utc>) -> (i64, i64) {
    let Some(duration_ms) = item.duration_ms.filter(|d| *d > 0) else {
        return (0, 0);
    };

    let Some(started_at) = item.started_at else {
        return (0, duration_ms);
    };

    let position = (now - started_at).num_milliseconds();
    (position.clamp(0, duration_ms), duration_ms)
}

/// Evaluates one tick of playback against a fresh snapshot.
///
/// The snapshot is mutated to match what was persisted, so the caller can
/// keep using it for the rest of the tick.
pub async fn tick<S, L, N>(
    context: &CoordinatorContext<S, L, N>,
    snapshot: &mut PartySnapshot,
) -> store::Result<()>
where
    S: PartyStore,
    L: MetadataLookup,
    N: Notifier,
{
    let party_id = snapshot.party.id;

    if snapshot.party.playing_item.is_none() && snapshot.queue.is_empty() {
        debug!("Party {}: nothing queued, nothing to do", party_id);
        return Ok(());
    }

    if snapshot.party.playing_item.is_none() {
        info!(
            "Party {}: no currently playing track, playing next in queue",
            party_id
        );
        play_next(context, snapshot).await?;
    }

    let Some(playing) = snapshot.party.playing_item.clone() else {
        return Ok(());
    };

    let now = context.now();
    let (position_ms, duration_ms) = track_position(&playing, now);

    debug!(
        "Party {}: track position {}ms of {}ms",
        party_id, position_ms, duration_ms
    );

    context
        .notifier
        .notify(party_id, Payload::Player(player_payload(&snapshot.party, now)))
        .await;

    let over = duration_ms > 0 && position_ms == duration_ms;
    let skipped = votes::should_skip(
        votes::skip_count(playing.id, &snapshot.votes),
        snapshot.user_count(),
    );

    if over || skipped {
        if skipped {
            info!("Party {}: skip vote passed, advancing playback", party_id);
        }

        play_next(context, snapshot).await?;
    }

    Ok(())
}

/// Marks the highest voted queued item as playing and retires the previously
/// playing one. Leaves the party idle when the queue is empty.
pub async fn play_next<S, L, N>(
    context: &CoordinatorContext<S, L, N>,
    snapshot: &mut PartySnapshot,
) -> store::Result<()>
where
    S: PartyStore,
    L: MetadataLookup,
    N: Notifier,
{
    let party_id = snapshot.party.id;
    let previous = snapshot.party.playing_item.take();
    let next = queue::next_in_queue(&snapshot.queue, &snapshot.votes).cloned();

    if let Some(mut item) = next {
        start_playing(context, &mut item).await?;

        snapshot.queue.retain(|i| i.id != item.id);
        snapshot.party.playing_item = Some(item);
    }

    if let Some(previous) = previous {
        context.store.delete_queue_item(previous.id).await?;
        snapshot.votes.retain(|v| v.item_id != previous.id);
    }

    // The new playing pointer has to be durable before anyone is notified
    context.store.save_party(&snapshot.party).await?;

    let now = context.now();

    context
        .notifier
        .notify(party_id, Payload::Player(player_payload(&snapshot.party, now)))
        .await;
    context
        .notifier
        .notify(
            party_id,
            Payload::Queue(queue::queue_payload(&snapshot.queue, &snapshot.votes)),
        )
        .await;

    Ok(())
}

/// Sets the playback start timestamp, hydrating the item's metadata first if
/// its duration is still unknown. A failed hydration is reported, not fatal:
/// the item plays with position `(0, 0)` until the duration resolves.
async fn start_playing<S, L, N>(
    context: &CoordinatorContext<S, L, N>,
    item: &mut QueueItemData,
) -> store::Result<()>
where
    S: PartyStore,
    L: MetadataLookup,
    N: Notifier,
{
    if item.duration_ms.is_none() {
        match context.lookup.resolve(&item.track_id).await {
            Ok(details) => {
                item.title = details.title;
                item.artist = details.artist;
                item.duration_ms = Some(details.duration_ms);
            }
            Err(e) => warn!("Failed to resolve track {}: {}", item.track_id, e),
        }
    }

    item.started_at = Some(context.now());
    context.store.update_queue_item(item).await
}

/// What the player looks like right now, as sent to clients
pub fn player_payload(party: &PartyData, now: DateTime<Utc>) -> PlayerStatePayload {
    match &party.playing_item {
        Some(item) => {
            let (position_ms, duration_ms) = track_position(item, now);

            PlayerStatePayload {
                playing_track_key: Some(item.track_id.clone()),
                playing_track_user: Some(item.submitted_by),
                playing_track_position_ms: position_ms,
                playing_track_duration_ms: duration_ms,
            }
        }
        None => PlayerStatePayload::default(),
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::Duration;

    use crate::{
        CollectingNotifier, Config, ManualClock, MemoryStore, NewParty, NewQueueItem, NewVote,
        PartyId, StaticLookup, TrackDetails,
    };

    use super::*;

    type TestContext = CoordinatorContext<MemoryStore, StaticLookup, CollectingNotifier>;

    fn context() -> (TestContext, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(Utc::now()));
        let context = CoordinatorContext::with_clock(
            MemoryStore::new(),
            StaticLookup::new(),
            CollectingNotifier::new(),
            Config::default(),
            clock.clone(),
        );

        (context, clock)
    }

    async fn party_with_track(context: &TestContext, duration_ms: i64) -> (PartyId, i32) {
        let party = context
            .store
            .create_party(NewParty {
                name: "test".to_string(),
            })
            .await
            .unwrap();

        context.lookup.insert(
            "abc123",
            TrackDetails {
                title: "The Quick Brown Fox Blues".to_string(),
                artist: "Zoopadoop".to_string(),
                duration_ms,
            },
        );

        let item = context
            .store
            .add_queue_item(NewQueueItem {
                party_id: party.id,
                track_id: "abc123".to_string(),
                submitted_by: 1,
                submitted_at: context.now(),
            })
            .await
            .unwrap();

        (party.id, item.id)
    }

    #[test]
    fn test_track_position_is_clamped() {
        let now = Utc::now();

        let item = QueueItemData {
            id: 1,
            track_id: "abc".to_string(),
            title: String::new(),
            artist: String::new(),
            duration_ms: Some(1000),
            submitted_by: 1,
            submitted_at: now,
            started_at: Some(now - Duration::milliseconds(1500)),
        };

        assert_eq!(track_position(&item, now), (1000, 1000));

        let exactly_over = QueueItemData {
            started_at: Some(now - Duration::milliseconds(1000)),
            ..item.clone()
        };
        assert_eq!(track_position(&exactly_over, now), (1000, 1000));

        let midway = QueueItemData {
            started_at: Some(now - Duration::milliseconds(400)),
            ..item.clone()
        };
        assert_eq!(track_position(&midway, now), (400, 1000));

        let future_start = QueueItemData {
            started_at: Some(now + Duration::milliseconds(100)),
            ..item.clone()
        };
        assert_eq!(
            track_position(&future_start, now),
            (0, 1000),
            "position should never be negative"
        );

        let unknown_duration = QueueItemData {
            duration_ms: None,
            ..item.clone()
        };
        assert_eq!(track_position(&unknown_duration, now), (0, 0));

        let unstarted = QueueItemData {
            started_at: None,
            ..item
        };
        assert_eq!(track_position(&unstarted, now), (0, 1000));
    }

    #[tokio::test]
    async fn test_first_tick_starts_playback() {
        let (context, _clock) = context();
        let (party_id, item_id) = party_with_track(&context, 200_000).await;

        let mut snapshot = context.store.party_by_id(party_id).await.unwrap();
        tick(&context, &mut snapshot).await.unwrap();

        let playing = snapshot
            .party
            .playing_item
            .as_ref()
            .expect("item should be playing after one tick");

        assert_eq!(playing.id, item_id);
        assert_eq!(playing.started_at, Some(context.now()));
        assert_eq!(playing.duration_ms, Some(200_000));
        assert_eq!(playing.title, "The Quick Brown Fox Blues");
        assert_eq!(track_position(playing, context.now()), (0, 200_000));

        // The start must be persisted, not just applied in memory
        let stored = context.store.party_by_id(party_id).await.unwrap();
        let stored_playing = stored.party.playing_item.expect("stored playing item");
        assert!(stored_playing.started_at.is_some());
        assert!(stored.queue.is_empty());
    }

    #[tokio::test]
    async fn test_finished_track_advances_to_idle() {
        let (context, clock) = context();
        let (party_id, item_id) = party_with_track(&context, 1000).await;

        let mut snapshot = context.store.party_by_id(party_id).await.unwrap();
        tick(&context, &mut snapshot).await.unwrap();

        clock.advance(Duration::milliseconds(1500));

        let mut snapshot = context.store.party_by_id(party_id).await.unwrap();
        tick(&context, &mut snapshot).await.unwrap();

        assert!(
            snapshot.party.playing_item.is_none(),
            "party should go idle when the queue is exhausted"
        );

        let stored = context.store.party_by_id(party_id).await.unwrap();
        assert!(
            !stored.queue.iter().any(|i| i.id == item_id),
            "the finished item should be retired"
        );
    }

    #[tokio::test]
    async fn test_skip_vote_advances_regardless_of_position() {
        let (context, clock) = context();
        let (party_id, item_id) = party_with_track(&context, 200_000).await;

        for user_id in 1..=4 {
            context
                .store
                .check_in(user_id, party_id, context.now())
                .await
                .unwrap();
        }

        let mut snapshot = context.store.party_by_id(party_id).await.unwrap();
        tick(&context, &mut snapshot).await.unwrap();
        assert!(snapshot.party.playing_item.is_some());

        // 3 of 4 users vote to skip almost immediately
        for user_id in 1..=3 {
            context
                .store
                .upsert_vote(NewVote {
                    user_id,
                    item_id,
                    value: 0,
                    is_skip: true,
                })
                .await
                .unwrap();
        }

        clock.advance(Duration::seconds(2));

        let mut snapshot = context.store.party_by_id(party_id).await.unwrap();
        tick(&context, &mut snapshot).await.unwrap();

        assert!(
            snapshot.party.playing_item.is_none(),
            "a passed skip vote should advance playback"
        );
    }

    #[tokio::test]
    async fn test_unknown_duration_never_ends_naturally() {
        let (context, clock) = context();

        let party = context
            .store
            .create_party(NewParty {
                name: "test".to_string(),
            })
            .await
            .unwrap();

        // Not inserted into the lookup, so hydration fails
        context
            .store
            .add_queue_item(NewQueueItem {
                party_id: party.id,
                track_id: "missing".to_string(),
                submitted_by: 1,
                submitted_at: context.now(),
            })
            .await
            .unwrap();

        let mut snapshot = context.store.party_by_id(party.id).await.unwrap();
        tick(&context, &mut snapshot).await.unwrap();

        let playing = snapshot
            .party
            .playing_item
            .clone()
            .expect("item plays even when hydration fails");

        assert_eq!(playing.duration_ms, None);
        assert_eq!(track_position(&playing, context.now()), (0, 0));

        clock.advance(Duration::hours(2));

        let mut snapshot = context.store.party_by_id(party.id).await.unwrap();
        tick(&context, &mut snapshot).await.unwrap();

        assert!(
            snapshot.party.playing_item.is_some(),
            "an unknown duration should never end on its own"
        );
    }

    #[tokio::test]
    async fn test_advancing_retires_the_previous_item() {
        let (context, clock) = context();
        let (party_id, first_id) = party_with_track(&context, 1000).await;

        context.lookup.insert(
            "def456",
            TrackDetails {
                title: "Second".to_string(),
                artist: "Zoopadoop".to_string(),
                duration_ms: 3000,
            },
        );

        let second = context
            .store
            .add_queue_item(NewQueueItem {
                party_id,
                track_id: "def456".to_string(),
                submitted_by: 2,
                submitted_at: context.now(),
            })
            .await
            .unwrap();

        let mut snapshot = context.store.party_by_id(party_id).await.unwrap();
        tick(&context, &mut snapshot).await.unwrap();
        assert_eq!(snapshot.party.playing_item.as_ref().unwrap().id, first_id);

        clock.advance(Duration::milliseconds(1000));

        let mut snapshot = context.store.party_by_id(party_id).await.unwrap();
        tick(&context, &mut snapshot).await.unwrap();

        assert_eq!(
            snapshot.party.playing_item.as_ref().unwrap().id,
            second.id,
            "the next queued item should take over on the same tick"
        );

        let stored = context.store.party_by_id(party_id).await.unwrap();
        assert!(stored.queue.is_empty());

        // The retired item is gone for good
        let retired = QueueItemData {
            id: first_id,
            track_id: String::new(),
            title: String::new(),
            artist: String::new(),
            duration_ms: None,
            submitted_by: 1,
            submitted_at: context.now(),
            started_at: None,
        };

        assert!(matches!(
            context.store.update_queue_item(&retired).await,
            Err(crate::StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_notifications_are_sent_on_advance() {
        let (context, _clock) = context();
        let (party_id, _item_id) = party_with_track(&context, 200_000).await;

        let mut snapshot = context.store.party_by_id(party_id).await.unwrap();
        tick(&context, &mut snapshot).await.unwrap();

        let payloads = context.notifier.payloads();

        assert!(
            payloads
                .iter()
                .any(|(id, p)| *id == party_id && matches!(p, Payload::Player(_))),
            "a player state payload should be sent"
        );
        assert!(
            payloads
                .iter()
                .any(|(id, p)| *id == party_id && matches!(p, Payload::Queue(_))),
            "a queue state payload should be sent"
        );
    }
}
