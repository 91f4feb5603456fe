// File: src/plugins/builtin/mute.rs

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::error;

use mochibot_common::models::{CommandMatcher, InboundMessage, PluginDescriptor};
use mochibot_common::Error;

use crate::identity::normalize_jid;
use crate::plugins::{CommandPlugin, PluginContext};

/// Owner-only mute toggle. While a sender is muted, the before-hook deletes
/// their messages and short-circuits dispatch for them.
pub struct MutePlugin {
    descriptor: PluginDescriptor,
    muted: Mutex<HashSet<String>>,
}

impl MutePlugin {
    pub fn new() -> Self {
        let mut descriptor =
            PluginDescriptor::new("mute", CommandMatcher::any(&["mute", "unmute"]));
        descriptor.tags = vec!["owner".to_string()];
        descriptor.help = vec!["mute @user".to_string(), "unmute @user".to_string()];
        descriptor.owner = true;
        Self {
            descriptor,
            muted: Mutex::new(HashSet::new()),
        }
    }

    fn is_muted(&self, jid: &str) -> bool {
        self.muted
            .lock()
            .map(|set| set.contains(jid))
            .unwrap_or(false)
    }

    fn target_of(&self, ctx: &PluginContext) -> Option<String> {
        ctx.mentioned
            .first()
            .cloned()
            .or_else(|| ctx.quoted_sender.clone())
            .map(|jid| normalize_jid(&jid))
    }
}

impl Default for MutePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandPlugin for MutePlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn before(&self, msg: &InboundMessage, ctx: &PluginContext) -> Result<bool, Error> {
        if msg.sender.is_empty() || !self.is_muted(&msg.sender) {
            return Ok(false);
        }
        if let Err(e) = ctx
            .client
            .delete_message(&msg.chat, &msg.id, &msg.sender)
            .await
        {
            error!("could not delete message from muted user {}: {e}", msg.sender);
        }
        Ok(true)
    }

    async fn handle(&self, msg: &InboundMessage, ctx: &PluginContext) -> Result<(), Error> {
        let Some(target) = self.target_of(ctx) else {
            ctx.reply(
                &format!("Tag or reply to the user to {}.", ctx.command),
                Some(msg),
            )
            .await?;
            return Ok(());
        };

        let reply = if ctx.command == "mute" {
            let mut set = self.muted.lock().map_err(|_| Error::Plugin("mute set poisoned".into()))?;
            if set.insert(target.clone()) {
                "Muted - their messages will be deleted."
            } else {
                "That user is already muted."
            }
        } else {
            let mut set = self.muted.lock().map_err(|_| Error::Plugin("mute set poisoned".into()))?;
            if set.remove(&target) {
                "Unmuted."
            } else {
                "That user is not muted."
            }
        };
        ctx.reply(reply, Some(msg)).await?;
        Ok(())
    }
}
