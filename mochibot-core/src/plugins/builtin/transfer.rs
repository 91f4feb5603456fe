// File: src/plugins/builtin/transfer.rs

use async_trait::async_trait;

use mochibot_common::models::{CommandMatcher, InboundMessage, PluginDescriptor};
use mochibot_common::Error;

use crate::identity::{normalize_jid, DIRECT_SUFFIX};
use crate::plugins::{CommandPlugin, PluginContext};

/// Smallest amount one transfer may move.
const MIN_TRANSFER: i64 = 10;

/// Moves bank balance from the sender to another registered user.
pub struct TransferPlugin {
    descriptor: PluginDescriptor,
}

impl TransferPlugin {
    pub fn new() -> Self {
        let mut descriptor = PluginDescriptor::new(
            "transfer",
            CommandMatcher::any(&["pay", "transfer", "coinsgive", "givecoins"]),
        );
        descriptor.tags = vec!["economy".to_string()];
        descriptor.help = vec!["pay <amount> @user".to_string()];
        descriptor.group = true;
        Self { descriptor }
    }

    fn target_of(&self, ctx: &PluginContext) -> Option<String> {
        if let Some(quoted) = &ctx.quoted_sender {
            return Some(normalize_jid(quoted));
        }
        if let Some(mentioned) = ctx.mentioned.first() {
            return Some(normalize_jid(mentioned));
        }
        let arg = ctx.args.get(1)?;
        let digits: String = arg.chars().filter(char::is_ascii_digit).collect();
        (!digits.is_empty()).then(|| format!("{digits}{DIRECT_SUFFIX}"))
    }
}

impl Default for TransferPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandPlugin for TransferPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn handle(&self, msg: &InboundMessage, ctx: &PluginContext) -> Result<(), Error> {
        let economy_on = {
            let state = ctx.state.lock().await;
            state
                .chats
                .get(&ctx.chat)
                .map(|c| c.economy_enabled())
                .unwrap_or(false)
        };
        if ctx.is_group && !economy_on {
            ctx.reply(
                "Economy commands are disabled in this group. An admin can enable them with: economy on",
                Some(msg),
            )
            .await?;
            return Ok(());
        }

        let Some(first) = ctx.args.first() else {
            ctx.reply(
                &format!(
                    "You must give an amount and a recipient.\nUsage: {}{} <amount> @user",
                    ctx.used_prefix.as_deref().unwrap_or("."),
                    ctx.command
                ),
                Some(msg),
            )
            .await?;
            return Ok(());
        };
        if first.starts_with('@') {
            ctx.reply("Amount first, then the person.", Some(msg)).await?;
            return Ok(());
        }
        let amount: i64 = first.parse().unwrap_or(MIN_TRANSFER);

        let Some(who) = self.target_of(ctx) else {
            ctx.reply(
                "Mention the recipient, reply to their message, or give their number.",
                Some(msg),
            )
            .await?;
            return Ok(());
        };
        if who == ctx.sender {
            ctx.reply("You cannot transfer money to yourself.", Some(msg))
                .await?;
            return Ok(());
        }
        if amount < MIN_TRANSFER {
            ctx.reply(
                &format!("The minimum transfer is {MIN_TRANSFER}."),
                Some(msg),
            )
            .await?;
            return Ok(());
        }

        // Balance moves under one lock so concurrent messages cannot see a
        // half-applied transfer.
        enum Outcome {
            NoRecipient,
            Short { bank: i64 },
            Done { sender_bank: i64, recipient_bank: i64 },
        }
        let outcome = {
            let mut state = ctx.state.lock().await;
            if !state.users.contains_key(&who) {
                Outcome::NoRecipient
            } else {
                let sender_bank = state
                    .users
                    .get(&ctx.sender)
                    .map(|u| u.bank)
                    .unwrap_or(0);
                if sender_bank < amount {
                    Outcome::Short { bank: sender_bank }
                } else {
                    if let Some(user) = state.users.get_mut(&ctx.sender) {
                        user.bank -= amount;
                    }
                    let recipient_after = state
                        .users
                        .get_mut(&who)
                        .map(|user| {
                            user.bank += amount;
                            user.bank
                        })
                        .unwrap_or(amount);
                    Outcome::Done {
                        sender_bank: sender_bank - amount,
                        recipient_bank: recipient_after,
                    }
                }
            }
        };

        match outcome {
            Outcome::NoRecipient => {
                ctx.reply(
                    "That user is not in my database yet; they need to use the bot at least once.",
                    Some(msg),
                )
                .await?;
            }
            Outcome::Short { bank } => {
                ctx.reply(
                    &format!(
                        "Not enough money in the bank.\nBalance: {bank}\nYou tried to send: {amount}\nMissing: {}",
                        amount - bank
                    ),
                    Some(msg),
                )
                .await?;
            }
            Outcome::Done {
                sender_bank,
                recipient_bank,
            } => {
                let sender_tag = ctx.display_tag(&ctx.sender).await;
                let recipient_tag = ctx.display_tag(&who).await;
                ctx.reply(
                    &format!(
                        "Transfer complete.\nFrom: {sender_tag}\nTo: {recipient_tag}\nAmount: {amount}\nYour new bank balance: {sender_bank}"
                    ),
                    Some(msg),
                )
                .await?;
                ctx.client
                    .send_text(
                        &who,
                        &format!(
                            "You received a transfer!\nFrom: {sender_tag}\nAmount: {amount}\nNew bank balance: {recipient_bank}"
                        ),
                        None,
                    )
                    .await?;
            }
        }
        Ok(())
    }
}
