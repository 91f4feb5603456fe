// File: src/plugins/builtin/promote.rs

use async_trait::async_trait;
use regex::Regex;

use mochibot_common::models::{
    CommandMatcher, InboundMessage, ParticipantAction, PluginDescriptor,
};
use mochibot_common::Error;

use crate::identity::{normalize_core, DIRECT_SUFFIX};
use crate::plugins::{CommandPlugin, PluginContext};

/// Grants admin rank to a group member.
pub struct PromotePlugin {
    descriptor: PluginDescriptor,
}

impl PromotePlugin {
    pub fn new() -> Self {
        let mut descriptor = PluginDescriptor::new(
            "promote",
            CommandMatcher::Pattern(Regex::new(r"^promote$").unwrap()),
        );
        descriptor.tags = vec!["group".to_string()];
        descriptor.help = vec!["promote @user".to_string()];
        descriptor.group = true;
        descriptor.admin = true;
        descriptor.bot_admin = true;
        Self { descriptor }
    }

    fn target_of(&self, ctx: &PluginContext) -> Option<String> {
        if let Some(mentioned) = ctx.mentioned.first() {
            return Some(mentioned.clone());
        }
        if let Some(quoted) = &ctx.quoted_sender {
            return Some(quoted.clone());
        }
        let digits: String = ctx.text.chars().filter(char::is_ascii_digit).collect();
        (digits.len() >= 8).then(|| format!("{digits}{DIRECT_SUFFIX}"))
    }
}

impl Default for PromotePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandPlugin for PromotePlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn handle(&self, msg: &InboundMessage, ctx: &PluginContext) -> Result<(), Error> {
        let _ = ctx.client.react(msg, "🕒").await;

        let Some(target) = self.target_of(ctx) else {
            let _ = ctx.client.react(msg, "❌").await;
            ctx.reply(
                &format!(
                    "Mention or reply to a user.\nExample: {}{} @user",
                    ctx.used_prefix.as_deref().unwrap_or("."),
                    ctx.command
                ),
                Some(msg),
            )
            .await?;
            return Ok(());
        };

        // A fresh roster; the cached snapshot can be a few seconds behind
        // an admin change.
        let metadata = match ctx.client.group_metadata(&ctx.chat).await {
            Ok(m) => m,
            Err(_) => {
                let _ = ctx.client.react(msg, "❌").await;
                ctx.reply("Could not fetch group information.", Some(msg))
                    .await?;
                return Ok(());
            }
        };

        let target_num = normalize_core(&target);
        let member = metadata.participants.iter().find(|p| {
            p.id == target
                || p.jid.as_deref() == Some(target.as_str())
                || normalize_core(p.jid.as_deref().unwrap_or(&p.id)) == target_num
        });
        let Some(member) = member else {
            let _ = ctx.client.react(msg, "❌").await;
            ctx.reply("That user is not in this group.", Some(msg)).await?;
            return Ok(());
        };

        if member.is_admin() {
            let _ = ctx.client.react(msg, "ℹ️").await;
            ctx.reply("That user is already an admin.", Some(msg)).await?;
            return Ok(());
        }

        match ctx
            .client
            .group_participants_update(&ctx.chat, &[target.clone()], ParticipantAction::Promote)
            .await
        {
            Ok(()) => {
                let _ = ctx.client.react(msg, "✅").await;
                ctx.reply(&format!("Promoted: @{target_num}"), Some(msg)).await?;
            }
            Err(e) => {
                let _ = ctx.client.react(msg, "❌").await;
                ctx.reply(&format!("Could not promote that user: {e}"), Some(msg))
                    .await?;
            }
        }
        Ok(())
    }
}
