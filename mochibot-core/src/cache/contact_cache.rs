// File: src/cache/contact_cache.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use mochibot_common::traits::ProtocolClient;

use crate::identity::{normalize_core, normalize_jid, DIRECT_SUFFIX};

/// Freshness window for a registration lookup.
const MAX_AGE_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedContact {
    jid: String,
    fetched_at: DateTime<Utc>,
}

/// Memoizes "which jid is this number actually registered under" lookups.
/// Lookup failures degrade to the normalized base jid.
pub struct ContactLookupCache {
    client: Arc<dyn ProtocolClient>,
    cache: DashMap<String, CachedContact>,
}

impl ContactLookupCache {
    pub fn new(client: Arc<dyn ProtocolClient>) -> Self {
        Self {
            client,
            cache: DashMap::new(),
        }
    }

    /// Resolve any raw identifier to the jid the platform has it registered
    /// under. Returns an empty string when the input has no usable core.
    pub async fn resolve_to_user_jid(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        let decoded = self.client.decode_jid(raw);
        let num = normalize_core(&normalize_jid(&decoded));
        if num.is_empty() {
            return String::new();
        }

        let now = Utc::now();
        if let Some(entry) = self.cache.get(&num) {
            if now.signed_duration_since(entry.fetched_at) < Duration::seconds(MAX_AGE_SECONDS) {
                return entry.jid.clone();
            }
        }

        let base = format!("{num}{DIRECT_SUFFIX}");
        let jid = match self.client.contact_lookup(&base).await {
            Ok(Some(contact)) if contact.exists && !contact.jid.is_empty() => contact.jid,
            _ => base,
        };
        self.cache.insert(
            num,
            CachedContact {
                jid: jid.clone(),
                fetched_at: now,
            },
        );
        jid
    }
}
