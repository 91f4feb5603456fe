use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Aggregate health counters for one plugin. Counters only ever grow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStat {
    pub total: u64,
    pub success: u64,
    pub last: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
}

impl UsageStat {
    /// Lenient decode; legacy stores kept epoch-millisecond integers.
    pub fn coerce(v: &Value) -> Self {
        Self {
            total: v.get("total").and_then(Value::as_u64).unwrap_or(0),
            success: v.get("success").and_then(Value::as_u64).unwrap_or(0),
            last: timestamp_field(v, "last"),
            last_success: timestamp_field(v, "lastSuccess"),
        }
    }

    pub fn record(&mut self, now: DateTime<Utc>, succeeded: bool) {
        self.total += 1;
        self.last = Some(now);
        if succeeded {
            self.success += 1;
            self.last_success = Some(now);
        }
    }
}

fn timestamp_field(v: &Value, key: &str) -> Option<DateTime<Utc>> {
    match v.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .filter(|ms| *ms > 0)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
