//! The ownership lease over a party.
//!
//! Contenders are separate processes, so the lease lives in the persisted
//! party record as an owner token plus heartbeat. There is no fencing and no
//! compare-and-swap: `claim` happens once at startup right after the stale
//! read, and every later tick re-checks `is_owner` on freshly loaded state
//! before mutating anything. The functions here only mutate the in-memory
//! record; the caller persists it.

use chrono::{DateTime, Duration, Utc};

use crate::PartyData;

/// Whether the party has no active manager: no heartbeat at all, or one
/// older than the lease timeout. Also the signal an outside supervisor uses
/// to launch a manager process in the first place.
pub fn needs_new_manager(party: &PartyData, now: DateTime<Utc>, lease_timeout: Duration) -> bool {
    match party.manager_checked_in_at {
        None => true,
        Some(checked_in_at) => now - checked_in_at > lease_timeout,
    }
}

/// Attempts to take ownership of the party. Succeeds only when the current
/// lease is absent or stale; otherwise another instance owns the party and
/// the caller must stop.
pub fn claim(
    party: &mut PartyData,
    manager_id: &str,
    now: DateTime<Utc>,
    lease_timeout: Duration,
) -> bool {
    if !needs_new_manager(party, now, lease_timeout) {
        return false;
    }

    renew(party, manager_id, now);
    true
}

/// Refreshes the lease unconditionally. Overwrites whatever owner is stored,
/// which is safe only because the caller verified `is_owner` on this tick's
/// fresh read.
pub fn renew(party: &mut PartyData, manager_id: &str, now: DateTime<Utc>) {
    party.manager_id = Some(manager_id.to_string());
    party.manager_checked_in_at = Some(now);
}

/// Whether the stored owner token is ours
pub fn is_owner(party: &PartyData, manager_id: &str) -> bool {
    party.manager_id.as_deref() == Some(manager_id)
}
