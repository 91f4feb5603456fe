// File: src/state/mod.rs
//
// The durable state tree the dispatch core reads and mutates. Loading from
// and persisting to disk is an external concern; this module only guarantees
// that whatever shape comes back from the store is materialized into
// well-formed records before anything touches it.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use mochibot_common::models::{
    BotSettingsRecord, ChatDefaults, ChatRecord, UsageStat, UserRecord,
};

use crate::identity::normalize_core;

/// Root of the persisted state: four open-ended mappings keyed by canonical
/// identity (users, chats, bot instances) or plugin name (stats).
#[derive(Debug, Default, Serialize)]
pub struct StateRoot {
    pub users: HashMap<String, UserRecord>,
    pub chats: HashMap<String, ChatRecord>,
    pub settings: HashMap<String, BotSettingsRecord>,
    pub stats: HashMap<String, UsageStat>,
}

impl StateRoot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize a state tree from whatever the external store handed
    /// back. Every record is decoded leniently; unknown top-level keys and
    /// non-object entries are dropped.
    pub fn from_json(root: &Value) -> Self {
        let mut state = Self::default();
        if let Some(users) = root.get("users").and_then(Value::as_object) {
            for (key, v) in users {
                if v.is_object() {
                    state.users.insert(key.clone(), UserRecord::coerce(v, None));
                }
            }
        }
        if let Some(chats) = root.get("chats").and_then(Value::as_object) {
            for (key, v) in chats {
                if v.is_object() {
                    state.chats.insert(key.clone(), ChatRecord::coerce(v));
                }
            }
        }
        if let Some(settings) = root.get("settings").and_then(Value::as_object) {
            for (key, v) in settings {
                if v.is_object() {
                    state
                        .settings
                        .insert(key.clone(), BotSettingsRecord::coerce(v));
                }
            }
        }
        if let Some(stats) = root.get("stats").and_then(Value::as_object) {
            for (key, v) in stats {
                if v.is_object() {
                    state.stats.insert(key.clone(), UsageStat::coerce(v));
                }
            }
        }
        state
    }

    /// Get-or-create the user record for a canonical sender jid.
    ///
    /// Records written by old bot versions live under the bare number; when
    /// the canonical key is missing and a legacy record exists, it is moved
    /// to the canonical key. Idempotent for well-formed state.
    pub fn ensure_user(&mut self, sender: &str, pushname: Option<&str>) -> &mut UserRecord {
        let legacy_key = normalize_core(sender);
        if !self.users.contains_key(sender) && !legacy_key.is_empty() {
            if let Some(legacy) = self.users.remove(&legacy_key) {
                self.users.insert(sender.to_string(), legacy);
            }
        }

        let user = self
            .users
            .entry(sender.to_string())
            .or_insert_with(|| UserRecord::new(pushname));
        if !user.registered && user.name.is_empty() {
            if let Some(name) = pushname {
                user.name = name.to_string();
            }
        }
        user
    }

    /// Get-or-create the chat record, backfilling unset toggles from the
    /// global defaults.
    pub fn ensure_chat(&mut self, chat: &str, defaults: &ChatDefaults) -> &mut ChatRecord {
        let record = self.chats.entry(chat.to_string()).or_default();
        record.merge_defaults(defaults);
        record
    }

    /// Get-or-create the per-bot-instance settings record.
    pub fn ensure_settings(&mut self, bot_jid: &str) -> &mut BotSettingsRecord {
        self.settings.entry(bot_jid.to_string()).or_default()
    }

    pub fn stat_mut(&mut self, plugin: &str) -> &mut UsageStat {
        self.stats.entry(plugin.to_string()).or_default()
    }
}
