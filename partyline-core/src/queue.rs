//! Vote-weighted ordering of the queue, and selection of the next item to
//! play.

use std::cmp::Ordering;

use crate::{votes, QueueEntryPayload, QueueItemData, VoteData};

/// Picks the item that should play next: the queued item with the highest
/// score. Ties go to the earliest submission, then to the lowest id, so
/// selection is deterministic regardless of store order.
pub fn next_in_queue<'a>(
    queue: &'a [QueueItemData],
    votes: &[VoteData],
) -> Option<&'a QueueItemData> {
    queue
        .iter()
        .filter(|item| item.started_at.is_none())
        .max_by(|a, b| ranking(a, b, votes))
}

/// Builds the vote-ordered queue as sent to clients
pub fn queue_payload(queue: &[QueueItemData], votes: &[VoteData]) -> Vec<QueueEntryPayload> {
    let mut items: Vec<_> = queue
        .iter()
        .filter(|item| item.started_at.is_none())
        .collect();

    items.sort_by(|a, b| ranking(b, a, votes));

    items
        .into_iter()
        .map(|item| QueueEntryPayload {
            queue_entry_id: item.id,
            track_key: item.track_id.clone(),
            title: item.title.clone(),
            artist: item.artist.clone(),
            submitter: item.submitted_by,
            upvotes: votes::upvotes(item.id, votes),
            downvotes: votes::downvotes(item.id, votes),
            score: votes::score(item.id, votes),
        })
        .collect()
}

/// Orders two items so that the greater one plays first
fn ranking(a: &QueueItemData, b: &QueueItemData, votes: &[VoteData]) -> Ordering {
    votes::score(a.id, votes)
        .cmp(&votes::score(b.id, votes))
        .then_with(|| b.submitted_at.cmp(&a.submitted_at))
        .then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};

    use super::*;

    fn item(id: i32, minutes_ago: i64) -> QueueItemData {
        QueueItemData {
            id,
            track_id: format!("track-{id}"),
            title: String::new(),
            artist: String::new(),
            duration_ms: None,
            submitted_by: 1,
            submitted_at: Utc::now() - Duration::minutes(minutes_ago),
            started_at: None,
        }
    }

    fn vote(user_id: i32, item_id: i32, value: i32) -> VoteData {
        VoteData {
            user_id,
            item_id,
            value,
            is_skip: false,
        }
    }

    #[test]
    fn test_highest_score_wins() {
        let queue = [item(1, 3), item(2, 2), item(3, 1)];
        let votes = [vote(1, 2, 1), vote(2, 2, 1), vote(3, 1, 1), vote(4, 3, -1)];

        let next = next_in_queue(&queue, &votes).expect("an item is selected");
        assert_eq!(next.id, 2);
    }

    #[test]
    fn test_tie_breaks_to_earliest_submission() {
        let queue = [item(1, 1), item(2, 5), item(3, 3)];

        let next = next_in_queue(&queue, &[]).expect("an item is selected");
        assert_eq!(next.id, 2, "oldest submission should win a score tie");
    }

    #[test]
    fn test_playing_items_are_not_candidates() {
        let mut playing = item(1, 5);
        playing.started_at = Some(Utc::now());

        let queue = [playing, item(2, 1)];
        let votes = [vote(1, 1, 1)];

        let next = next_in_queue(&queue, &votes).expect("an item is selected");
        assert_eq!(next.id, 2);

        assert!(
            next_in_queue(&queue[..1], &votes).is_none(),
            "a playing item should never be selected"
        );
    }

    #[test]
    fn test_payload_is_ordered_by_score() {
        let queue = [item(1, 3), item(2, 2), item(3, 1)];
        let votes = [vote(1, 3, 1), vote(2, 3, 1), vote(3, 2, -1)];

        let payload = queue_payload(&queue, &votes);
        let ids: Vec<_> = payload.iter().map(|e| e.queue_entry_id).collect();

        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(payload[0].upvotes, 2);
        assert_eq!(payload[2].downvotes, -1);
    }
}
