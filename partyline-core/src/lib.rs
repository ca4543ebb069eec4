mod config;
mod events;
mod lookup;
mod manager;
mod playback;
mod store;
mod util;

pub mod lease;
pub mod presence;
pub mod queue;
pub mod votes;

use std::sync::Arc;

pub use config::*;
pub use events::*;
pub use lookup::*;
pub use manager::*;
pub use playback::*;
pub use store::*;
pub use util::*;

use chrono::{DateTime, Utc};

/// A type passed to the coordinator's components, to access collaborators,
/// configuration, and the clock.
pub struct CoordinatorContext<S, L, N> {
    pub store: Arc<S>,
    pub lookup: Arc<L>,
    pub notifier: Arc<N>,

    pub config: Config,
    pub clock: Arc<dyn Clock>,
}

impl<S, L, N> CoordinatorContext<S, L, N>
where
    S: PartyStore,
    L: MetadataLookup,
    N: Notifier,
{
    pub fn new(store: S, lookup: L, notifier: N, config: Config) -> Self {
        Self::with_clock(store, lookup, notifier, config, Arc::new(SystemClock))
    }

    /// Creates a context with an injected clock, so tick logic can be driven
    /// deterministically.
    pub fn with_clock(
        store: S,
        lookup: L,
        notifier: N,
        config: Config,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: Arc::new(store),
            lookup: Arc::new(lookup),
            notifier: Arc::new(notifier),
            config,
            clock,
        }
    }

    /// The current wall-clock time, according to the context's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl<S, L, N> Clone for CoordinatorContext<S, L, N>
where
    S: PartyStore,
    L: MetadataLookup,
    N: Notifier,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            lookup: self.lookup.clone(),
            notifier: self.notifier.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
        }
    }
}
