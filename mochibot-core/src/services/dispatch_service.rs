// File: src/services/dispatch_service.rs
//
// The command router. One inbound message enters, identities are
// canonicalized, durable records materialized, roles computed, and then the
// registered plugin list is walked in order until exactly one command
// handler has run. A fault inside any plugin never takes down processing
// for the rest of the message, and the bookkeeping tail always runs.

use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use mochibot_common::models::{
    Badge, ChatDefaults, GroupMetadata, InboundMessage, PresenceState, RoleFlags,
};
use mochibot_common::traits::ProtocolClient;
use mochibot_common::Error;

use crate::cache::{ContactLookupCache, GroupMetadataCache};
use crate::identity::{normalize_core, normalize_jid, LidResolver};
use crate::plugins::{CommandPlugin, PluginContext};
use crate::presence::PresenceGate;
use crate::services::mention_service::MentionProcessor;
use crate::services::role_service::{OwnerEntry, RoleService};
use crate::state::StateRoot;
use crate::utils::redact::redact_secrets;

/// Prefix characters accepted when a plugin declares no custom prefix.
static DEFAULT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[./!#]").unwrap());

/// Experience charged for a command that declares no cost.
const DEFAULT_COMMAND_EXP: i64 = 17;

/// Costs above this are refused instead of charged.
const COMMAND_EXP_CEILING: i64 = 200;

/// Command words that bypass primary-bot silencing, so operators can always
/// re-designate the primary.
const PRIMARY_OVERRIDE_WORDS: &[&str] = &[
    "resetbot",
    "botreset",
    "setprimary",
    "primary",
    "unprimary",
    "primarybot",
];

/// Why a plugin refused to run for this sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    RootOwner,
    Owner,
    Mods,
    Premium,
    Group,
    Private,
    Admin,
    BotAdmin,
    Unregistered,
}

fn deny_text(reason: DenyReason) -> &'static str {
    match reason {
        DenyReason::RootOwner => "Only my creator can use this command.",
        DenyReason::Owner => "This command is reserved for my owner.",
        DenyReason::Mods => "Only moderators can use this command.",
        DenyReason::Premium => "This command is for premium users only.",
        DenyReason::Group => "This command only works in groups.",
        DenyReason::Private => "This command only works in my private chat.",
        DenyReason::Admin => "Only group admins can use this command.",
        DenyReason::BotAdmin => "I need to be a group admin to run this command.",
        DenyReason::Unregistered => {
            "You are not registered yet. Register first with: .reg name.age"
        }
    }
}

/// Engine-level configuration, injected at construction.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub owners: Vec<OwnerEntry>,
    pub premium_numbers: Vec<String>,
    pub chat_defaults: ChatDefaults,
    /// Secret values blanked out of any error text relayed to a chat.
    pub secret_values: Vec<String>,
    /// When set, plugins tagged `admin` are skipped entirely.
    pub restrict_admin_plugins: bool,
    /// Ignore messages the bot did not send itself.
    pub self_only: bool,
    /// Observe only; no dispatch at all.
    pub observe: bool,
    /// Mark every processed message as read.
    pub autoread: bool,
    /// The primary connection's identity in a multi-instance deployment.
    /// Defaults to this instance's own jid.
    pub main_bot_jid: Option<String>,
    /// Plugins allowed to run despite the corresponding ban flag.
    pub unban_chat_plugin: String,
    pub unban_user_plugin: String,
    pub unban_bot_plugin: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            owners: Vec::new(),
            premium_numbers: Vec::new(),
            chat_defaults: ChatDefaults::default(),
            secret_values: Vec::new(),
            restrict_admin_plugins: false,
            self_only: false,
            observe: false,
            autoread: false,
            main_bot_jid: None,
            unban_chat_plugin: "enablebot".to_string(),
            unban_user_plugin: "unbanuser".to_string(),
            unban_bot_plugin: "unbanbot".to_string(),
        }
    }
}

/// Ephemeral working set for one message, built up stage by stage and
/// applied once in the bookkeeping tail.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    pub sender: String,
    pub chat: String,
    pub is_group: bool,
    /// Experience accumulated this message (base roll plus command cost).
    pub exp: i64,
    /// Credits charged by the winning plugin, set only on success.
    pub charged: Option<i64>,
    /// Name of the last plugin whose matcher accepted the command.
    pub plugin: Option<String>,
    pub error: Option<String>,
    pub is_command: bool,
    pub roles: RoleFlags,
    pub badges: Vec<Badge>,
}

pub struct DispatchService {
    client: Arc<dyn ProtocolClient>,
    state: Arc<Mutex<StateRoot>>,
    resolver: Arc<LidResolver>,
    group_cache: Arc<GroupMetadataCache>,
    contacts: Arc<ContactLookupCache>,
    presence: Arc<PresenceGate>,
    mentions: MentionProcessor,
    role_service: Arc<RoleService>,
    plugins: Vec<Arc<dyn CommandPlugin>>,
    config: DispatchConfig,
}

impl DispatchService {
    pub fn new(
        client: Arc<dyn ProtocolClient>,
        state: StateRoot,
        plugins: Vec<Arc<dyn CommandPlugin>>,
        config: DispatchConfig,
    ) -> Self {
        let resolver = Arc::new(LidResolver::new(client.clone()));
        Self {
            state: Arc::new(Mutex::new(state)),
            resolver: resolver.clone(),
            group_cache: Arc::new(GroupMetadataCache::new(client.clone())),
            contacts: Arc::new(ContactLookupCache::new(client.clone())),
            presence: Arc::new(PresenceGate::new(client.clone())),
            mentions: MentionProcessor::new(resolver),
            role_service: Arc::new(RoleService::new(
                config.owners.clone(),
                config.premium_numbers.clone(),
            )),
            plugins,
            config,
            client,
        }
    }

    /// Shared state handle, for the embedding host and for tests.
    pub fn state(&self) -> Arc<Mutex<StateRoot>> {
        self.state.clone()
    }

    pub fn resolver(&self) -> Arc<LidResolver> {
        self.resolver.clone()
    }

    pub fn presence(&self) -> Arc<PresenceGate> {
        self.presence.clone()
    }

    fn bot_jid(&self) -> String {
        normalize_jid(&self.client.decode_jid(&self.client.self_jid()))
    }

    /// Entry point for one delivered batch. The newest message is
    /// processed; everything this can fail on is logged and swallowed so
    /// the dispatch loop itself never dies.
    pub async fn handle_event(&self, batch: Vec<InboundMessage>) {
        let Some(mut msg) = batch.into_iter().last() else {
            return;
        };
        let mut cx = DispatchContext::default();
        if let Err(e) = self.process(&mut msg, &mut cx).await {
            error!("message processing failed: {e}");
        }
        if let Err(e) = self.finish(&msg, &cx).await {
            error!("post-dispatch bookkeeping failed: {e}");
        }
    }

    async fn process(
        &self,
        msg: &mut InboundMessage,
        cx: &mut DispatchContext,
    ) -> Result<(), Error> {
        let bot_jid = self.bot_jid();

        // Canonical addressing before anything else reads the message.
        msg.sender = normalize_jid(&self.client.decode_jid(&msg.sender));
        msg.chat = normalize_jid(&self.client.decode_jid(&msg.chat));
        cx.sender = msg.sender.clone();
        cx.chat = msg.chat.clone();
        cx.is_group = msg.is_group;

        // Plugins and the role resolver only ever see canonical mentions.
        self.mentions.process(msg).await;

        if self.primary_bot_silenced(msg, &bot_jid).await {
            debug!("deferring to primary bot in {}", msg.chat);
            return Ok(());
        }

        // Durable records, self-healed and defaulted.
        {
            let mut state = self.state.lock().await;
            state.ensure_user(&msg.sender, msg.pushname.as_deref());
            state.ensure_chat(&msg.chat, &self.config.chat_defaults);
            state.ensure_settings(&bot_jid);
        }

        // Anti-lag: only allow-listed bot instances speak in this chat.
        {
            let state = self.state.lock().await;
            if let Some(chat) = state.chats.get(&msg.chat) {
                if chat.anti_lag_enabled() {
                    let main = self
                        .config
                        .main_bot_jid
                        .clone()
                        .unwrap_or_else(|| bot_jid.clone());
                    let allowed = chat
                        .allowed_bots
                        .iter()
                        .chain(std::iter::once(&main))
                        .any(|b| normalize_core(b) == normalize_core(&bot_jid));
                    if !allowed {
                        return Ok(());
                    }
                }
            }
        }

        if self.config.observe {
            return Ok(());
        }
        let self_only = self.config.self_only || {
            let state = self.state.lock().await;
            state
                .settings
                .get(&bot_jid)
                .map(|s| s.self_only)
                .unwrap_or(false)
        };
        if self_only && !msg.from_me {
            return Ok(());
        }

        // Roster snapshot for role checks and plugin context.
        let metadata: Option<Arc<GroupMetadata>> = if msg.is_group {
            self.group_cache.snapshot(&msg.chat).await.map(Arc::new)
        } else {
            None
        };

        let roles = {
            let state = self.state.lock().await;
            self.role_service
                .role_for(&msg.sender, metadata.as_deref(), &bot_jid, &state.users)
        };
        let badges = self.role_service.badges_for(&msg.sender, &roles, &bot_jid);
        cx.roles = roles;
        cx.badges = badges.clone();

        // Sender display name, backfilled from the contact book.
        if msg.pushname.as_deref().map(str::trim).unwrap_or("").is_empty() {
            msg.pushname = match self.client.get_name(&msg.sender).await {
                Some(n) if !n.trim().is_empty() => Some(n),
                _ => Some(crate::identity::pretty_num(&msg.sender)),
            };
        }

        // Base experience for showing up at all.
        cx.exp += rand::rng().random_range(1..=10);

        let base_ctx = PluginContext {
            client: self.client.clone(),
            state: self.state.clone(),
            resolver: self.resolver.clone(),
            contacts: self.contacts.clone(),
            role_service: self.role_service.clone(),
            bot_jid: bot_jid.clone(),
            chat: msg.chat.clone(),
            sender: msg.sender.clone(),
            is_group: msg.is_group,
            mentioned: msg.mentioned.clone(),
            quoted_sender: msg.quoted_sender.clone(),
            group_metadata: metadata,
            roles,
            badges,
            used_prefix: None,
            command: String::new(),
            args: Vec::new(),
            text: String::new(),
            no_prefix: String::new(),
        };

        self.run_plugins(msg, cx, &base_ctx, &bot_jid).await
    }

    /// True when a designated primary bot should handle this message
    /// instead of us. Clears the designation when the primary has left.
    async fn primary_bot_silenced(&self, msg: &InboundMessage, bot_jid: &str) -> bool {
        if !msg.is_group {
            return false;
        }
        let primary = {
            let state = self.state.lock().await;
            state
                .chats
                .get(&msg.chat)
                .and_then(|c| c.primary_bot.clone())
        };
        let Some(primary) = primary else {
            return false;
        };

        let first_word = msg
            .text
            .trim()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_lowercase();
        let first_word = first_word.trim_start_matches(['.', '/', '!', '#']);
        if PRIMARY_OVERRIDE_WORDS.contains(&first_word) {
            return false;
        }
        if normalize_core(bot_jid) == normalize_core(&primary) {
            return false;
        }

        let present = match self.group_cache.snapshot(&msg.chat).await {
            Some(metadata) => metadata.participants.iter().any(|p| {
                let wid = p.jid.as_deref().unwrap_or(&p.id);
                normalize_core(wid) == normalize_core(&primary)
            }),
            None => false,
        };
        if present {
            true
        } else {
            // The designated primary is gone; drop the designation.
            let mut state = self.state.lock().await;
            if let Some(chat) = state.chats.get_mut(&msg.chat) {
                chat.primary_bot = None;
            }
            false
        }
    }

    /// Walk the registered plugins in order; at most one main handler runs.
    async fn run_plugins(
        &self,
        msg: &InboundMessage,
        cx: &mut DispatchContext,
        base_ctx: &PluginContext,
        bot_jid: &str,
    ) -> Result<(), Error> {
        for plugin in &self.plugins {
            let desc = plugin.descriptor();
            if desc.disabled {
                continue;
            }

            // The all-hook observes every message, match or not.
            if let Err(e) = plugin.all(msg, base_ctx).await {
                error!("plugin {} all-hook failed: {e}", desc.name);
            }

            if self.config.restrict_admin_plugins && desc.tags.iter().any(|t| t == "admin") {
                continue;
            }

            let prefix = match &desc.prefix {
                Some(p) => p.matched(&msg.text),
                None => DEFAULT_PREFIX
                    .find(&msg.text)
                    .map(|m| m.as_str().to_string()),
            };

            let mut ctx = base_ctx.clone();
            ctx.used_prefix = prefix.clone();
            if plugin.before(msg, &ctx).await? {
                continue;
            }

            let Some(used_prefix) = prefix else { continue };
            let no_prefix = msg.text[used_prefix.len()..].to_string();
            let mut parts = no_prefix.split_whitespace();
            let command = parts.next().unwrap_or("").to_lowercase();
            let args: Vec<String> = parts.map(str::to_string).collect();
            if !desc.command.accepts(&command) {
                continue;
            }

            cx.plugin = Some(desc.name.clone());

            // Ban checks short-circuit the whole message, not just this
            // plugin. Only the designated unban plugins pass through.
            {
                let state = self.state.lock().await;
                let chat_banned = state
                    .chats
                    .get(&msg.chat)
                    .map(|c| c.is_banned)
                    .unwrap_or(false);
                let user_banned = state
                    .users
                    .get(&msg.sender)
                    .map(|u| u.banned)
                    .unwrap_or(false);
                let bot_banned = state
                    .settings
                    .get(bot_jid)
                    .map(|s| s.banned)
                    .unwrap_or(false);
                if chat_banned && desc.name != self.config.unban_chat_plugin {
                    return Ok(());
                }
                if user_banned && desc.name != self.config.unban_user_plugin {
                    return Ok(());
                }
                if bot_banned && desc.name != self.config.unban_bot_plugin {
                    return Ok(());
                }
            }

            // Permission gates, in fixed order. A failed gate denies this
            // plugin and moves on to the next one.
            let roles = cx.roles;
            if desc.root_owner && !roles.is_root_owner {
                self.deny(DenyReason::RootOwner, msg).await;
                continue;
            }
            if desc.owner && !(roles.is_owner || roles.is_root_owner) {
                self.deny(DenyReason::Owner, msg).await;
                continue;
            }
            if desc.mods {
                // No moderator role exists; this gate denies everyone.
                self.deny(DenyReason::Mods, msg).await;
                continue;
            }
            if desc.premium && !roles.is_premium {
                self.deny(DenyReason::Premium, msg).await;
                continue;
            }
            if desc.group && !msg.is_group {
                self.deny(DenyReason::Group, msg).await;
                continue;
            } else if desc.bot_admin && !roles.is_bot_admin {
                self.deny(DenyReason::BotAdmin, msg).await;
                continue;
            } else if desc.admin && !roles.is_admin {
                self.deny(DenyReason::Admin, msg).await;
                continue;
            }
            if desc.private && msg.is_group {
                self.deny(DenyReason::Private, msg).await;
                continue;
            }
            if desc.register {
                let registered = {
                    let state = self.state.lock().await;
                    state
                        .users
                        .get(&msg.sender)
                        .map(|u| u.registered)
                        .unwrap_or(false)
                };
                if !registered {
                    self.deny(DenyReason::Unregistered, msg).await;
                    continue;
                }
            }

            cx.is_command = true;

            let xp = desc.exp_cost.unwrap_or(DEFAULT_COMMAND_EXP);
            if xp > COMMAND_EXP_CEILING {
                let _ = self
                    .client
                    .send_text(
                        &msg.chat,
                        "that one costs more than I can count -_-",
                        Some(msg),
                    )
                    .await;
            } else {
                cx.exp += xp;
            }

            if let Some(required) = desc.limit {
                let balance = {
                    let state = self.state.lock().await;
                    state
                        .users
                        .get(&msg.sender)
                        .map(|u| u.limit)
                        .unwrap_or(0)
                };
                if balance < required {
                    let _ = self
                        .client
                        .send_text(&msg.chat, "You are out of credits.", Some(msg))
                        .await;
                    continue;
                }
            }

            // Typing indicator, only for dot-prefixed commands and only
            // when this instance opted in.
            let autotype = {
                let state = self.state.lock().await;
                state
                    .settings
                    .get(bot_jid)
                    .map(|s| s.autotype_dot_only)
                    .unwrap_or(false)
            };
            let armed = autotype && used_prefix == ".";
            if armed {
                self.presence.arm(&msg.chat);
                if let Err(e) = self.presence.send(&msg.chat, PresenceState::Composing).await {
                    warn!("presence update failed for {}: {e}", msg.chat);
                }
            }

            ctx.command = command;
            ctx.text = args.join(" ");
            ctx.args = args;
            ctx.no_prefix = no_prefix;

            match plugin.handle(msg, &ctx).await {
                Ok(()) => {
                    cx.charged = desc.limit;
                }
                Err(e) => {
                    cx.error = Some(e.to_string());
                    error!("plugin {} failed: {e}", desc.name);
                    let text = redact_secrets(&e.to_string(), &self.config.secret_values);
                    let _ = self.client.send_text(&msg.chat, &text, Some(msg)).await;
                }
            }

            if armed {
                if let Err(e) = self.presence.send(&msg.chat, PresenceState::Paused).await {
                    warn!("presence update failed for {}: {e}", msg.chat);
                }
                self.presence.disarm(&msg.chat);
            }
            if let Err(e) = plugin.after(msg, &ctx).await {
                error!("plugin {} after-hook failed: {e}", desc.name);
            }
            if let Some(spent) = cx.charged {
                let _ = self
                    .client
                    .send_text(&msg.chat, &format!("You spent {spent} credits."), Some(msg))
                    .await;
            }

            // First match wins; registration order is the precedence.
            break;
        }
        Ok(())
    }

    async fn deny(&self, reason: DenyReason, msg: &InboundMessage) {
        if let Err(e) = self
            .client
            .send_text(&msg.chat, deny_text(reason), Some(msg))
            .await
        {
            error!("denial reply failed: {e}");
        }
        if let Err(e) = self.client.react(msg, "✖️").await {
            debug!("denial reaction failed: {e}");
        }
    }

    /// Bookkeeping that runs for every message, matched or not: apply the
    /// accumulated experience and credit deltas, bump plugin stats, mark
    /// the message read. Failures here are logged by the caller and never
    /// suppress user-facing output.
    async fn finish(&self, msg: &InboundMessage, cx: &DispatchContext) -> Result<(), Error> {
        let bot_jid = self.bot_jid();
        let now = Utc::now();
        {
            let mut state = self.state.lock().await;
            if let Some(user) = state.users.get_mut(&cx.sender) {
                user.exp += cx.exp;
                if let Some(charged) = cx.charged {
                    user.limit -= charged;
                }
            }
            if let Some(name) = &cx.plugin {
                state.stat_mut(name).record(now, cx.error.is_none());
            }
        }

        let autoread = self.config.autoread || {
            let state = self.state.lock().await;
            state
                .settings
                .get(&bot_jid)
                .map(|s| s.autoread)
                .unwrap_or(false)
        };
        if autoread && !msg.id.is_empty() {
            self.client.read_messages(std::slice::from_ref(&msg.id)).await?;
        }
        Ok(())
    }
}
