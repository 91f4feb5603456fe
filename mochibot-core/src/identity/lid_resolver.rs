// File: src/identity/lid_resolver.rs

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use mochibot_common::traits::ProtocolClient;

use super::{is_group_jid, is_lid_jid, local_part, normalize_jid};

/// Memoized outcome of one linked-identifier resolution.
#[derive(Debug, Clone)]
pub struct LidCacheEntry {
    /// Canonical identity on success; the original linked identifier when
    /// the owner was not found or the lookup failed.
    pub jid: String,
    pub name: Option<String>,
    pub found: bool,
    pub error: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// How long a positive entry short-circuits resolution. Not-found and error
/// markers are kept too but never short-circuit; they are overwritten by the
/// next attempt and evicted only by `clear_cache`.
const POSITIVE_TTL_MINUTES: i64 = 5;

/// Resolves opaque linked identifiers to canonical identities by scanning
/// live group membership. All failure paths degrade to returning the input;
/// `resolve` never errors out.
pub struct LidResolver {
    client: Arc<dyn ProtocolClient>,
    cache: DashMap<String, LidCacheEntry>,
}

impl LidResolver {
    pub fn new(client: Arc<dyn ProtocolClient>) -> Self {
        Self {
            client,
            cache: DashMap::new(),
        }
    }

    /// Fresh positive entry for a linked key, if any.
    pub fn cached(&self, lid_key: &str) -> Option<LidCacheEntry> {
        let entry = self.cache.get(lid_key)?;
        let age = Utc::now().signed_duration_since(entry.captured_at);
        if age < Duration::minutes(POSITIVE_TTL_MINUTES) {
            Some(entry.clone())
        } else {
            None
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Test helper
    pub fn test_force_captured_at(&self, lid_key: &str, seconds_ago: i64) -> bool {
        if let Some(mut entry) = self.cache.get_mut(lid_key) {
            entry.captured_at = Utc::now() - Duration::seconds(seconds_ago);
            true
        } else {
            false
        }
    }

    fn remember(&self, lid_key: &str, entry: LidCacheEntry) {
        self.cache.insert(lid_key.to_string(), entry);
    }

    /// Resolve `lid_jid` against the membership of `chat`, retrying failed
    /// roster fetches up to `max_retries` times with a linearly growing
    /// delay.
    pub async fn resolve(&self, lid_jid: &str, chat: &str, max_retries: u32) -> String {
        if !is_lid_jid(lid_jid) || !is_group_jid(chat) {
            return normalize_jid(lid_jid);
        }

        let lid_key = local_part(lid_jid).to_string();
        if let Some(entry) = self.cached(&lid_key) {
            if entry.found && !is_lid_jid(&entry.jid) {
                return entry.jid;
            }
        }

        let mut attempts = 0u32;
        loop {
            match self.client.group_metadata(chat).await {
                Ok(metadata) => {
                    for participant in &metadata.participants {
                        if participant.id.is_empty() {
                            continue;
                        }
                        // Does this member own the linked identifier we hold?
                        let contact = match self.client.contact_lookup(&participant.id).await {
                            Ok(Some(c)) => c,
                            Ok(None) => continue,
                            Err(_) => continue,
                        };
                        let Some(member_lid) = contact.lid else { continue };
                        if local_part(&member_lid) == lid_key {
                            let resolved = participant
                                .jid
                                .clone()
                                .unwrap_or_else(|| participant.id.clone());
                            debug!("resolved linked id {} -> {}", lid_jid, resolved);
                            self.remember(
                                &lid_key,
                                LidCacheEntry {
                                    jid: resolved.clone(),
                                    name: participant.name.clone(),
                                    found: true,
                                    error: None,
                                    captured_at: Utc::now(),
                                },
                            );
                            return resolved;
                        }
                    }

                    // Full roster scanned, nobody owns this linked id.
                    self.remember(
                        &lid_key,
                        LidCacheEntry {
                            jid: lid_jid.to_string(),
                            name: None,
                            found: false,
                            error: Some("not a member of this group".to_string()),
                            captured_at: Utc::now(),
                        },
                    );
                    return lid_jid.to_string();
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= max_retries {
                        warn!(
                            "giving up on linked id {} after {} attempts: {}",
                            lid_jid, attempts, e
                        );
                        self.remember(
                            &lid_key,
                            LidCacheEntry {
                                jid: lid_jid.to_string(),
                                name: None,
                                found: false,
                                error: Some(e.to_string()),
                                captured_at: Utc::now(),
                            },
                        );
                        return lid_jid.to_string();
                    }
                    tokio::time::sleep(StdDuration::from_secs(attempts as u64)).await;
                }
            }
        }
    }
}
