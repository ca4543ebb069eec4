use async_trait::async_trait;
use crossbeam::channel::{unbounded, Receiver, Sender};
use partyline_core::{Notifier, PartyId, Payload};

/// A notifier that fans payloads out over a channel, so a push transport can
/// consume them at its own pace.
pub struct ChannelNotifier {
    sender: Sender<(PartyId, Payload)>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, Receiver<(PartyId, Payload)>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, party_id: PartyId, payload: Payload) {
        // Fire and forget. A gone consumer is not the coordinator's concern.
        self.sender.send((party_id, payload)).ok();
    }
}
