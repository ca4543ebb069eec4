//! Aggregation of raw votes into the numbers the queue and the skip decision
//! are built on.

use crate::{QueueItemId, VoteData};

/// The net score of an item: the sum of all vote values on it
pub fn score(item_id: QueueItemId, votes: &[VoteData]) -> i64 {
    votes
        .iter()
        .filter(|v| v.item_id == item_id)
        .map(|v| v.value as i64)
        .sum()
}

/// The sum of positive votes on an item
pub fn upvotes(item_id: QueueItemId, votes: &[VoteData]) -> i64 {
    votes
        .iter()
        .filter(|v| v.item_id == item_id && v.value > 0)
        .map(|v| v.value as i64)
        .sum()
}

/// The sum of negative votes on an item
pub fn downvotes(item_id: QueueItemId, votes: &[VoteData]) -> i64 {
    votes
        .iter()
        .filter(|v| v.item_id == item_id && v.value < 0)
        .map(|v| v.value as i64)
        .sum()
}

/// How many users voted to skip an item
pub fn skip_count(item_id: QueueItemId, votes: &[VoteData]) -> usize {
    votes
        .iter()
        .filter(|v| v.item_id == item_id && v.is_skip)
        .count()
}

/// Whether a strict majority of present users voted to skip.
/// The comparison is fractional: 3 of 5 users skip, 2 of 4 do not.
pub fn should_skip(skip_count: usize, user_count: usize) -> bool {
    skip_count as f64 > user_count as f64 / 2.
}
