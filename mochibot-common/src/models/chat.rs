use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{bool_field, str_field};

/// Feature toggles every chat record can carry. `None` means "never set";
/// the dispatch engine backfills those from [`ChatDefaults`] without touching
/// keys an operator has set explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Greeting on member join/leave. Older stores used a `welcome` key;
    /// `coerce` migrates it when `greeting` is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeting: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub economy: Option<bool>,
    #[serde(rename = "antiLag", skip_serializing_if = "Option::is_none")]
    pub anti_lag: Option<bool>,
    /// Bot identities allowed to dispatch here while anti-lag is on.
    #[serde(rename = "allowedBots", default)]
    pub allowed_bots: Vec<String>,
    /// The one bot instance this group treats as authoritative.
    #[serde(rename = "primaryBot")]
    pub primary_bot: Option<String>,
    #[serde(rename = "isBanned", default)]
    pub is_banned: bool,
    /// Open-ended toggles plugins may park here.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

const KNOWN_KEYS: &[&str] = &[
    "greeting",
    "welcome",
    "economy",
    "antiLag",
    "allowedBots",
    "primaryBot",
    "isBanned",
];

impl ChatRecord {
    /// Lenient decode of a persisted record, including the legacy `welcome`
    /// key migration.
    pub fn coerce(v: &Value) -> Self {
        let greeting = v
            .get("greeting")
            .and_then(Value::as_bool)
            .or_else(|| v.get("welcome").and_then(Value::as_bool));
        let mut extra = HashMap::new();
        if let Some(map) = v.as_object() {
            for (k, val) in map {
                if !KNOWN_KEYS.contains(&k.as_str()) {
                    extra.insert(k.clone(), val.clone());
                }
            }
        }
        Self {
            greeting,
            economy: v.get("economy").and_then(Value::as_bool),
            anti_lag: v.get("antiLag").and_then(Value::as_bool),
            allowed_bots: v
                .get("allowedBots")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default(),
            primary_bot: str_field(v, "primaryBot"),
            is_banned: bool_field(v, "isBanned", false),
            extra,
        }
    }

    /// Backfill unset keys from the global defaults. Explicit values are
    /// never overwritten; applying this twice is a no-op.
    pub fn merge_defaults(&mut self, defaults: &ChatDefaults) {
        if self.greeting.is_none() {
            self.greeting = defaults.greeting;
        }
        if self.economy.is_none() {
            self.economy = defaults.economy;
        }
        if self.anti_lag.is_none() {
            self.anti_lag = defaults.anti_lag;
        }
        for (k, v) in &defaults.extra {
            self.extra.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    pub fn greeting_enabled(&self) -> bool {
        self.greeting.unwrap_or(false)
    }

    pub fn economy_enabled(&self) -> bool {
        self.economy.unwrap_or(false)
    }

    pub fn anti_lag_enabled(&self) -> bool {
        self.anti_lag.unwrap_or(false)
    }
}

/// Global configuration defaults merged into every chat record on first
/// contact (and into legacy records missing keys).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDefaults {
    pub greeting: Option<bool>,
    pub economy: Option<bool>,
    #[serde(rename = "antiLag")]
    pub anti_lag: Option<bool>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            greeting: Some(true),
            economy: Some(true),
            anti_lag: Some(false),
            extra: HashMap::new(),
        }
    }
}
