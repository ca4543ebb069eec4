use std::time::Duration as StdDuration;

use chrono::Duration;

/// The configuration of the party coordinator
#[derive(Debug, Clone)]
pub struct Config {
    /// How many seconds a manager's heartbeat remains valid before the party
    /// is considered abandoned and claimable by another instance
    pub lease_timeout_in_seconds: f32,
    /// How many seconds pass between coordinator ticks
    pub tick_interval_in_seconds: f32,
    /// How many seconds a user may go without checking in before their
    /// presence is pruned
    pub presence_window_in_seconds: f32,
}

impl Config {
    /// The staleness threshold of the ownership lease
    pub fn lease_timeout(&self) -> Duration {
        to_duration(self.lease_timeout_in_seconds)
    }

    /// The tick interval as a std duration, for use with timers
    pub fn tick_interval(&self) -> StdDuration {
        StdDuration::from_secs_f32(self.tick_interval_in_seconds)
    }

    /// The liveness window for user presences
    pub fn presence_window(&self) -> Duration {
        to_duration(self.presence_window_in_seconds)
    }
}

fn to_duration(seconds: f32) -> Duration {
    Duration::milliseconds((seconds * 1000.) as i64)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Managers renew every tick, so ten seconds of silence means the owner is gone
            lease_timeout_in_seconds: 10.,
            // One second keeps reported positions close to real playback
            tick_interval_in_seconds: 1.,
            // Clients check in far more often than this
            presence_window_in_seconds: 60.,
        }
    }
}
