// File: src/presence.rs

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use mochibot_common::models::PresenceState;
use mochibot_common::traits::ProtocolClient;
use mochibot_common::Error;

/// Authorizes outbound typing signals so that only dispatch-triggered
/// presence changes ever reach the protocol client.
///
/// The gate is keyed per chat, not per invocation: two commands dispatched
/// concurrently in the same chat can clear each other's gate early. That is
/// the long-standing behavior and is preserved here.
pub struct PresenceGate {
    client: Arc<dyn ProtocolClient>,
    gates: DashMap<String, bool>,
}

impl PresenceGate {
    pub fn new(client: Arc<dyn ProtocolClient>) -> Self {
        Self {
            client,
            gates: DashMap::new(),
        }
    }

    pub fn arm(&self, chat: &str) {
        self.gates.insert(chat.to_string(), true);
    }

    pub fn disarm(&self, chat: &str) {
        self.gates.remove(chat);
    }

    pub fn is_armed(&self, chat: &str) -> bool {
        self.gates.get(chat).map(|g| *g).unwrap_or(false)
    }

    /// Emit a presence update, silently dropped unless the chat is armed.
    pub async fn send(&self, chat: &str, state: PresenceState) -> Result<(), Error> {
        if !self.is_armed(chat) {
            debug!("presence {} for {} suppressed (gate closed)", state, chat);
            return Ok(());
        }
        self.client.send_presence(chat, state).await
    }
}
