//! Tracking and pruning of per-user liveness in a party.

use log::info;

use crate::{store, CoordinatorContext, MetadataLookup, Notifier, PartyId, PartyStore, UserId};

/// Creates or refreshes the presence of a user in a party
pub async fn check_in<S, L, N>(
    context: &CoordinatorContext<S, L, N>,
    user_id: UserId,
    party_id: PartyId,
) -> store::Result<()>
where
    S: PartyStore,
    L: MetadataLookup,
    N: Notifier,
{
    context.store.check_in(user_id, party_id, context.now()).await
}

/// Deletes every presence in the party that hasn't checked in within the
/// liveness window, returning how many were removed. Runs before any
/// skip-threshold evaluation in the same tick so ghosts don't count.
pub async fn prune<S, L, N>(
    context: &CoordinatorContext<S, L, N>,
    party_id: PartyId,
) -> store::Result<u64>
where
    S: PartyStore,
    L: MetadataLookup,
    N: Notifier,
{
    let cutoff = context.now() - context.config.presence_window();
    let removed = context.store.prune_presences(party_id, cutoff).await?;

    if removed > 0 {
        info!("Pruned {} stale presences from party {}", removed, party_id);
    }

    Ok(removed)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use crate::{
        CollectingNotifier, Config, ManualClock, MemoryStore, NewParty, StaticLookup,
    };

    use super::*;

    #[tokio::test]
    async fn test_prune_removes_stale_presences() {
        let clock = Arc::new(ManualClock::starting_at(Utc::now()));
        let context = CoordinatorContext::with_clock(
            MemoryStore::new(),
            StaticLookup::new(),
            CollectingNotifier::new(),
            Config::default(),
            clock.clone(),
        );

        let party = context
            .store
            .create_party(NewParty {
                name: "test".to_string(),
            })
            .await
            .unwrap();

        check_in(&context, 1, party.id).await.unwrap();
        check_in(&context, 2, party.id).await.unwrap();

        clock.advance(Duration::seconds(30));
        check_in(&context, 1, party.id).await.unwrap();

        // User 2 is now 61 seconds old, user 1 only 31
        clock.advance(Duration::seconds(31));

        let removed = prune(&context, party.id).await.unwrap();
        assert_eq!(removed, 1);

        let snapshot = context.store.party_by_id(party.id).await.unwrap();
        assert_eq!(snapshot.user_count(), 1);
        assert_eq!(snapshot.presences[0].user_id, 1);

        let removed = prune(&context, party.id).await.unwrap();
        assert_eq!(removed, 0, "a second prune should find nothing");
    }
}
