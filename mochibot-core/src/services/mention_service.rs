// File: src/services/mention_service.rs

use std::sync::Arc;

use tracing::debug;

use mochibot_common::models::InboundMessage;

use crate::identity::{is_lid_jid, normalize_jid, LidResolver};

/// Retry cap for resolving mentioned linked identifiers. Kept small so a
/// flaky roster fetch cannot stall dispatch of the whole message.
const MENTION_RETRIES: u32 = 2;

/// Rewrites a message's mention list to canonical identities before any
/// command sees it.
pub struct MentionProcessor {
    resolver: Arc<LidResolver>,
}

impl MentionProcessor {
    pub fn new(resolver: Arc<LidResolver>) -> Self {
        Self { resolver }
    }

    pub async fn process(&self, msg: &mut InboundMessage) {
        if msg.mentioned.is_empty() {
            return;
        }

        let has_lids = msg.mentioned.iter().any(|j| is_lid_jid(j));
        if !has_lids {
            msg.mentioned = msg
                .mentioned
                .iter()
                .map(|j| normalize_jid(j))
                .filter(|j| !j.is_empty())
                .collect();
            return;
        }

        let mut resolved = Vec::with_capacity(msg.mentioned.len());
        for jid in &msg.mentioned {
            if jid.is_empty() {
                continue;
            }
            if is_lid_jid(jid) && msg.is_group {
                resolved.push(self.resolver.resolve(jid, &msg.chat, MENTION_RETRIES).await);
            } else {
                let norm = normalize_jid(jid);
                if !norm.is_empty() {
                    resolved.push(norm);
                }
            }
        }
        debug!("resolved {} mention(s) in {}", resolved.len(), msg.chat);
        msg.mentioned = resolved;
    }
}
