//! Optional shared redis tier (L2)
//!
//! Every operation is best effort: an unreachable or failing redis
//! instance is logged and treated as a miss, never surfaced to callers.

use super::CacheEntry;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "vigil:cache:";

pub(crate) struct RemoteTier {
    client: redis::Client,
}

impl RemoteTier {
    pub fn new(url: &str) -> std::result::Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(url)?,
        })
    }

    async fn connection(&self) -> Option<MultiplexedConnection> {
        match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!("Shared cache unreachable: {e}");
                None
            }
        }
    }

    fn redis_key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }

    pub async fn get(&self, key: &str, now_ms: i64) -> Option<CacheEntry> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = match conn.get(Self::redis_key(key)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Shared cache read failed: {e}");
                return None;
            }
        };
        let entry: CacheEntry = serde_json::from_str(&raw?).ok()?;
        if entry.is_expired(now_ms) {
            // Entry outlived its envelope TTL; drop it eagerly
            self.remove(key).await;
            return None;
        }
        Some(entry)
    }

    pub async fn put(&self, key: &str, entry: &CacheEntry, now_ms: i64) {
        let remaining = entry.remaining_ms(now_ms);
        if remaining == 0 {
            return;
        }
        let Ok(raw) = serde_json::to_string(entry) else {
            return;
        };
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let result: redis::RedisResult<()> =
            conn.pset_ex(Self::redis_key(key), raw, remaining).await;
        if let Err(e) = result {
            warn!("Shared cache write failed: {e}");
        }
    }

    pub async fn remove(&self, key: &str) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let result: redis::RedisResult<()> = conn.del(Self::redis_key(key)).await;
        if let Err(e) = result {
            debug!("Shared cache delete failed: {e}");
        }
    }

    pub async fn clear(&self) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let keys: Vec<String> = {
            let mut found = Vec::new();
            match conn.scan_match::<_, String>(format!("{KEY_PREFIX}*")).await {
                Ok(mut iter) => {
                    while let Some(key) = iter.next_item().await {
                        found.push(key);
                    }
                }
                Err(e) => {
                    warn!("Shared cache scan failed: {e}");
                    return;
                }
            }
            found
        };
        if keys.is_empty() {
            return;
        }
        let result: redis::RedisResult<()> = conn.del(keys).await;
        if let Err(e) = result {
            warn!("Shared cache clear failed: {e}");
        }
    }
}
