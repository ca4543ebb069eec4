use std::{env, process::ExitCode, thread};

use log::{debug, error, info};
use partyline_core::{Config, CoordinatorContext, PartyId, PartyManager};
use partyline_impls::{ChannelNotifier, HttpLookup, PgStore};

mod logging;

/// Runs one coordinator for one party. An outside supervisor launches this
/// process when it observes a party without an active manager.
#[tokio::main]
async fn main() -> ExitCode {
    logging::init_logger();

    let party_id: PartyId = match env::args().nth(1).and_then(|arg| arg.parse().ok()) {
        Some(id) => id,
        None => {
            error!("Usage: partyline-manager <party_id>");
            return ExitCode::FAILURE;
        }
    };

    let database_url =
        env::var("PARTYLINE_DATABASE_URL").expect("PARTYLINE_DATABASE_URL is set");
    let lookup_url = env::var("PARTYLINE_LOOKUP_URL").expect("PARTYLINE_LOOKUP_URL is set");

    let store = match PgStore::new(&database_url).await {
        Ok(store) => store,
        Err(e) => {
            error!("Could not connect to the party store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (notifier, notifications) = ChannelNotifier::new();

    // Drain notifications into the log until a push transport is wired in
    thread::spawn(move || {
        while let Ok((party_id, payload)) = notifications.recv() {
            match serde_json::to_string(&payload) {
                Ok(json) => debug!("Party {} notification: {}", party_id, json),
                Err(e) => error!("Could not serialize notification: {}", e),
            }
        }
    });

    let context = CoordinatorContext::new(
        store,
        HttpLookup::new(&lookup_url),
        notifier,
        Config::default(),
    );

    let mut manager = PartyManager::new(&context, party_id);

    match manager.run().await {
        Ok(state) => {
            info!("Party manager for party {} exited: {:?}", party_id, state);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Party manager for party {} failed: {}", party_id, e);
            ExitCode::FAILURE
        }
    }
}
