// File: src/cache/group_cache.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::warn;

use mochibot_common::models::GroupMetadata;
use mochibot_common::traits::ProtocolClient;

/// Freshness window for a cached roster snapshot.
const MAX_AGE_SECONDS: i64 = 30;

#[derive(Debug, Clone)]
struct CachedMetadata {
    data: GroupMetadata,
    fetched_at: DateTime<Utc>,
}

/// Per-chat group-metadata snapshots. A stale entry triggers a refetch; when
/// the refetch fails we keep serving the previous snapshot rather than
/// dropping admin checks on the floor.
pub struct GroupMetadataCache {
    client: Arc<dyn ProtocolClient>,
    cache: DashMap<String, CachedMetadata>,
}

impl GroupMetadataCache {
    pub fn new(client: Arc<dyn ProtocolClient>) -> Self {
        Self {
            client,
            cache: DashMap::new(),
        }
    }

    /// Current roster snapshot for `chat`, if one can be had at all.
    pub async fn snapshot(&self, chat: &str) -> Option<GroupMetadata> {
        let now = Utc::now();
        if let Some(entry) = self.cache.get(chat) {
            if now.signed_duration_since(entry.fetched_at) <= Duration::seconds(MAX_AGE_SECONDS) {
                return Some(entry.data.clone());
            }
        }

        match self.client.group_metadata(chat).await {
            Ok(data) => {
                self.cache.insert(
                    chat.to_string(),
                    CachedMetadata {
                        data: data.clone(),
                        fetched_at: now,
                    },
                );
                Some(data)
            }
            Err(e) => {
                warn!("group metadata fetch failed for {}: {}", chat, e);
                self.cache.get(chat).map(|entry| entry.data.clone())
            }
        }
    }

    pub fn invalidate(&self, chat: &str) {
        self.cache.remove(chat);
    }

    /// Test helper
    pub fn test_force_fetched_at(&self, chat: &str, seconds_ago: i64) -> bool {
        if let Some(mut entry) = self.cache.get_mut(chat) {
            entry.fetched_at = Utc::now() - Duration::seconds(seconds_ago);
            true
        } else {
            false
        }
    }
}
