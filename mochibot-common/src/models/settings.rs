use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::bool_field;

/// Per-bot-instance runtime configuration, keyed by the bot's own canonical
/// identity in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotSettingsRecord {
    /// Only react to the bot's own messages.
    #[serde(rename = "self")]
    pub self_only: bool,
    pub autoread: bool,
    /// Global ban for this bot instance; only the designated unban plugin
    /// bypasses it.
    pub banned: bool,
    /// Emit a typing indicator for dot-prefixed commands.
    #[serde(rename = "autotypeDotOnly")]
    pub autotype_dot_only: bool,
}

impl BotSettingsRecord {
    pub fn coerce(v: &Value) -> Self {
        Self {
            self_only: bool_field(v, "self", false),
            autoread: bool_field(v, "autoread", false),
            banned: bool_field(v, "banned", false),
            autotype_dot_only: bool_field(v, "autotypeDotOnly", false),
        }
    }
}
