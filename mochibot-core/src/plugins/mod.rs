// File: src/plugins/mod.rs
//
// The contract every registered command handler implements, plus the
// context bag the dispatch engine hands to hooks and handlers.

pub mod builtin;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use mochibot_common::models::{
    Badge, GroupMetadata, GroupParticipant, InboundMessage, PluginDescriptor, RoleFlags,
    UserRecord,
};
use mochibot_common::traits::ProtocolClient;
use mochibot_common::Error;

use crate::cache::ContactLookupCache;
use crate::identity::{self, targets, LidResolver};
use crate::services::role_service::RoleService;
use crate::state::StateRoot;

/// A registered command handler.
///
/// `handle` is the main body; the three lifecycle hooks are optional and
/// default to no-ops. `all` runs for every message regardless of matching;
/// `before` may short-circuit this plugin by returning `true`; `after` runs
/// once the main handler finished, successfully or not.
#[async_trait]
pub trait CommandPlugin: Send + Sync {
    fn descriptor(&self) -> &PluginDescriptor;

    async fn all(&self, _msg: &InboundMessage, _ctx: &PluginContext) -> Result<(), Error> {
        Ok(())
    }

    async fn before(&self, _msg: &InboundMessage, _ctx: &PluginContext) -> Result<bool, Error> {
        Ok(false)
    }

    async fn handle(&self, msg: &InboundMessage, ctx: &PluginContext) -> Result<(), Error>;

    async fn after(&self, _msg: &InboundMessage, _ctx: &PluginContext) -> Result<(), Error> {
        Ok(())
    }
}

/// Summary of one identity, assembled on demand for plugins that render
/// user-facing profiles.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub jid: String,
    pub name: String,
    pub number: String,
    pub record: Option<UserRecord>,
    pub roles: RoleFlags,
    pub badges: Vec<Badge>,
    pub display_tag: String,
}

/// Everything a hook or handler can reach: resolved identities, the role
/// snapshot, the roster, shared services, and the parsed command line.
/// Command fields (`command`, `args`, …) are empty during `all`/`before`.
#[derive(Clone)]
pub struct PluginContext {
    pub client: Arc<dyn ProtocolClient>,
    pub state: Arc<Mutex<StateRoot>>,
    pub resolver: Arc<LidResolver>,
    pub contacts: Arc<ContactLookupCache>,
    pub role_service: Arc<RoleService>,

    pub bot_jid: String,
    pub chat: String,
    pub sender: String,
    pub is_group: bool,
    pub mentioned: Vec<String>,
    pub quoted_sender: Option<String>,
    pub group_metadata: Option<Arc<GroupMetadata>>,
    pub roles: RoleFlags,
    pub badges: Vec<Badge>,

    /// Prefix that matched for this plugin, when one did.
    pub used_prefix: Option<String>,
    pub command: String,
    pub args: Vec<String>,
    /// Arguments re-joined with single spaces.
    pub text: String,
    /// Message body with the prefix stripped.
    pub no_prefix: String,
}

impl PluginContext {
    pub fn participants(&self) -> &[GroupParticipant] {
        self.group_metadata
            .as_deref()
            .map(|m| m.participants.as_slice())
            .unwrap_or(&[])
    }

    /// Reply in the chat this message arrived in.
    pub async fn reply(&self, text: &str, quoted: Option<&InboundMessage>) -> Result<(), Error> {
        self.client.send_text(&self.chat, text, quoted).await
    }

    /// Identities a command argument string is aimed at; resolved mentions
    /// take precedence over parsed text.
    pub fn parse_user_targets(&self, input: &str) -> Vec<String> {
        targets::parse_user_targets(input, &self.mentioned)
    }

    /// Resolve a linked identifier against this chat's membership.
    pub async fn resolve_lid(&self, lid_jid: &str) -> String {
        self.resolver.resolve(lid_jid, &self.chat, 3).await
    }

    /// Human-facing tag for an identity: the contact name when it is more
    /// than a restatement of the number, else the `+<digits>` form.
    pub async fn display_tag(&self, jid: &str) -> String {
        let real = identity::normalize_jid(jid);
        let num = identity::pretty_num(&real);
        if let Some(name) = self.client.get_name(&real).await {
            let trimmed = name.trim();
            if !trimmed.is_empty() {
                let just_number = trimmed
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-'));
                if !just_number {
                    return trimmed.to_string();
                }
            }
        }
        num
    }

    pub async fn user_info(&self, jid: &str) -> Option<UserInfo> {
        let normalized = identity::normalize_jid(jid);
        if normalized.is_empty() {
            return None;
        }
        let (record, roles) = {
            let state = self.state.lock().await;
            let record = state.users.get(&normalized).cloned();
            let roles = self.role_service.role_for(
                &normalized,
                self.group_metadata.as_deref(),
                &self.bot_jid,
                &state.users,
            );
            (record, roles)
        };
        let badges = self.role_service.badges_for(&normalized, &roles, &self.bot_jid);
        let display_tag = self.display_tag(&normalized).await;
        let name = match self.client.get_name(&normalized).await {
            Some(n) if !n.trim().is_empty() => n,
            _ => identity::pretty_num(&normalized),
        };
        Some(UserInfo {
            jid: normalized.clone(),
            name,
            number: identity::pretty_num(&normalized),
            record,
            roles,
            badges,
            display_tag,
        })
    }
}
