// File: mochibot-common/src/models/mod.rs
pub mod chat;
pub mod group;
pub mod message;
pub mod plugin;
pub mod role;
pub mod settings;
pub mod stats;
pub mod user;

pub use chat::{ChatDefaults, ChatRecord};
pub use group::{AdminRank, ContactRecord, GroupMetadata, GroupParticipant, ParticipantAction, PresenceState};
pub use message::{InboundMessage, MediaKind, MediaPayload};
pub use plugin::{CommandMatcher, PluginDescriptor, PrefixMatcher};
pub use role::{Badge, RoleFlags};
pub use settings::BotSettingsRecord;
pub use stats::UsageStat;
pub use user::UserRecord;

use serde_json::Value;

// Lenient field readers for records coming back from the persisted store.
// Legacy databases carry strings where numbers should be (and vice versa);
// every accessor falls back to the documented default instead of rejecting
// the whole record.
pub(crate) fn int_field(v: &Value, key: &str, default: i64) -> i64 {
    v.get(key).and_then(Value::as_i64).unwrap_or(default)
}

pub(crate) fn bool_field(v: &Value, key: &str, default: bool) -> bool {
    v.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub(crate) fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}
