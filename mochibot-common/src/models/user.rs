use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{bool_field, int_field, str_field};

/// Durable per-identity state, keyed by canonical jid in the store.
///
/// Records created by old bot versions can be missing fields or carry
/// non-numeric junk in numeric slots; `coerce` rebuilds a well-formed record
/// from whatever is there, field by field, falling back to the documented
/// default. Applying it to an already-well-formed record is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub exp: i64,
    /// Consumable command credits, distinct from `exp`.
    pub limit: i64,
    pub premium: bool,
    pub premium_time: i64,
    pub registered: bool,
    pub name: String,
    pub age: Option<i64>,
    pub reg_time: i64,
    pub afk: i64,
    pub afk_reason: String,
    pub banned: bool,
    pub use_document: bool,
    pub level: i64,
    pub bank: i64,
}

impl UserRecord {
    pub fn new(name: Option<&str>) -> Self {
        Self {
            exp: 0,
            limit: 10,
            premium: false,
            premium_time: 0,
            registered: false,
            name: name.unwrap_or_default().to_string(),
            age: None,
            reg_time: -1,
            afk: -1,
            afk_reason: String::new(),
            banned: false,
            use_document: true,
            level: 0,
            bank: 0,
        }
    }

    /// Lenient decode of a persisted record.
    pub fn coerce(v: &Value, fallback_name: Option<&str>) -> Self {
        let premium = bool_field(v, "premium", false);
        let registered = bool_field(v, "registered", false);
        Self {
            exp: int_field(v, "exp", 0),
            limit: int_field(v, "limit", 10),
            premium,
            // A non-premium user never keeps a stale expiry around.
            premium_time: if premium { int_field(v, "premiumTime", 0) } else { 0 },
            registered,
            name: str_field(v, "name")
                .or_else(|| fallback_name.map(str::to_string))
                .unwrap_or_default(),
            age: v.get("age").and_then(Value::as_i64),
            reg_time: int_field(v, "regTime", -1),
            afk: int_field(v, "afk", -1),
            afk_reason: str_field(v, "afkReason").unwrap_or_default(),
            banned: bool_field(v, "banned", false),
            use_document: bool_field(v, "useDocument", false),
            level: int_field(v, "level", 0),
            bank: int_field(v, "bank", 0),
        }
    }
}

impl Default for UserRecord {
    fn default() -> Self {
        Self::new(None)
    }
}
