//! The top-level coordinator loop: one instance per party, claiming the
//! ownership lease on startup and driving the tick cycle until the party
//! empties out or another instance takes over.

use log::{error, info};
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};

use crate::{
    lease, playback, presence, random_string, CoordinatorContext, MetadataLookup, Notifier,
    PartyId, PartyStore, StoreError,
};

pub type ManagerResult<T> = std::result::Result<T, CoordinatorError>;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a manager stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Another instance already owns the party
    ClaimRefused,
    /// The stored owner token no longer matches this manager
    OwnershipLost,
    /// Every participant left the party
    PartyEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Starting,
    Running,
    Stopped(StopReason),
}

/// The result of one tick of the coordinator loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop(StopReason),
}

/// A coordinator instance for a single party.
///
/// Exactly one of these should actively mutate a party at a time, which is
/// enforced optimistically: the lease is claimed once at startup, and every
/// tick re-checks ownership on freshly loaded state before touching
/// anything.
pub struct PartyManager<S, L, N> {
    context: CoordinatorContext<S, L, N>,
    party_id: PartyId,
    manager_id: String,
    state: ManagerState,
}

impl<S, L, N> PartyManager<S, L, N>
where
    S: PartyStore,
    L: MetadataLookup,
    N: Notifier,
{
    /// The length of the generated owner token
    const MANAGER_ID_LENGTH: usize = 16;

    pub fn new(context: &CoordinatorContext<S, L, N>, party_id: PartyId) -> Self {
        Self {
            context: context.clone(),
            party_id,
            manager_id: random_string(Self::MANAGER_ID_LENGTH),
            state: ManagerState::Starting,
        }
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// The opaque owner token identifying this instance
    pub fn manager_id(&self) -> &str {
        &self.manager_id
    }

    /// Attempts to claim the party, exactly once. Returns whether the claim
    /// succeeded; on refusal the manager is already stopped and must not
    /// tick.
    pub async fn start(&mut self) -> ManagerResult<bool> {
        let mut snapshot = self.context.store.party_by_id(self.party_id).await?;

        let claimed = lease::claim(
            &mut snapshot.party,
            &self.manager_id,
            self.context.now(),
            self.context.config.lease_timeout(),
        );

        if !claimed {
            info!(
                "Party {} already has an active manager, killing manager {}",
                self.party_id, self.manager_id
            );

            self.state = ManagerState::Stopped(StopReason::ClaimRefused);
            return Ok(false);
        }

        info!(
            "Starting up party manager {} for party {}",
            self.manager_id, self.party_id
        );

        // Persist the claim immediately to keep the race window at its
        // smallest
        self.context.store.save_party(&snapshot.party).await?;
        self.state = ManagerState::Running;

        Ok(true)
    }

    /// Runs a single tick of the coordinator: reload, verify ownership,
    /// prune presences, advance playback, renew the lease, persist.
    ///
    /// Public so tests can drive the loop deterministically with a manual
    /// clock.
    pub async fn tick(&mut self) -> ManagerResult<TickOutcome> {
        let mut snapshot = self.context.store.party_by_id(self.party_id).await?;

        // Another instance may have claimed the party since the last tick.
        // If so, stop here: writing anything now would corrupt the new
        // owner's state.
        if !lease::is_owner(&snapshot.party, &self.manager_id) {
            return Ok(TickOutcome::Stop(StopReason::OwnershipLost));
        }

        // Prune before evaluating anything that depends on the user count,
        // and drop the pruned users from the snapshot as well
        presence::prune(&self.context, self.party_id).await?;

        let cutoff = self.context.now() - self.context.config.presence_window();
        snapshot.presences.retain(|p| p.last_check_in >= cutoff);

        playback::tick(&self.context, &mut snapshot).await?;

        lease::renew(&mut snapshot.party, &self.manager_id, self.context.now());
        self.context.store.save_party(&snapshot.party).await?;

        if snapshot.user_count() == 0 {
            return Ok(TickOutcome::Stop(StopReason::PartyEmpty));
        }

        Ok(TickOutcome::Continue)
    }

    /// Claims the party and runs the tick loop until a stop condition is
    /// reached, returning the final state.
    pub async fn run(&mut self) -> ManagerResult<ManagerState> {
        if !self.start().await? {
            return Ok(self.state);
        }

        let mut ticker = interval(self.context.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.state == ManagerState::Running {
            ticker.tick().await;

            match self.tick().await {
                Ok(TickOutcome::Continue) => {}
                Ok(TickOutcome::Stop(reason)) => {
                    info!(
                        "Killing party manager {} for party {}: {:?}",
                        self.manager_id, self.party_id, reason
                    );

                    self.state = ManagerState::Stopped(reason);
                }
                Err(e) => {
                    // A single bad tick never takes the loop down. The next
                    // tick starts from a fresh reload, so nothing of this
                    // one carries over.
                    error!(
                        "Party {} manager tick failed: {}",
                        self.party_id, e
                    );
                }
            }
        }

        Ok(self.state)
    }
}
