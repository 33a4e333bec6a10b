//! Three-tier response cache: memory (L1), optional shared redis (L2),
//! local disk (L3)
//!
//! Lookup order is L1 → L2 → L3. A hit below L1 is promoted into every
//! higher tier carrying its original absolute expiry, so promotion never
//! extends an entry's life. All tier I/O is best effort; a failing tier
//! is logged and skipped, never surfaced to the caller.

mod disk;
mod key;
mod memory;
mod remote;

pub use key::CacheKey;

use crate::models::CacheConfig;
use disk::DiskTier;
use memory::MemoryTier;
use remote::RemoteTier;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A stored value with its creation and absolute expiry time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
}

impl CacheEntry {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Milliseconds of life left, zero when expired
    pub fn remaining_ms(&self, now_ms: i64) -> u64 {
        (self.expires_at_ms - now_ms).max(0) as u64
    }
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    pub memory_hits: u64,
    pub remote_hits: u64,
    pub disk_hits: u64,
    pub memory_entries: usize,
}

#[derive(Default)]
struct CacheMetrics {
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
    memory_hits: AtomicU64,
    remote_hits: AtomicU64,
    disk_hits: AtomicU64,
}

/// The per-scan cache instance handed to the crawler
pub struct ScanCache {
    memory: Mutex<MemoryTier>,
    remote: Option<RemoteTier>,
    disk: Option<DiskTier>,
    default_ttl: Duration,
    metrics: CacheMetrics,
}

impl ScanCache {
    /// Builds a cache from configuration. Tier construction failures
    /// disable the tier rather than failing the scan.
    pub fn from_config(config: &CacheConfig) -> Self {
        let remote = config.redis_url.as_deref().and_then(|url| {
            match RemoteTier::new(url) {
                Ok(tier) => Some(tier),
                Err(e) => {
                    warn!("Shared cache disabled, invalid endpoint: {e}");
                    None
                }
            }
        });

        let disk = if config.disk_enabled {
            let dir = config
                .disk_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("vigil-cache"));
            match DiskTier::new(dir.clone()) {
                Ok(tier) => Some(tier),
                Err(e) => {
                    warn!("Disk cache disabled, cannot use {}: {e}", dir.display());
                    None
                }
            }
        } else {
            None
        };

        info!(
            "Cache ready: memory capacity {}, shared tier {}, disk tier {}",
            config.memory_capacity,
            if remote.is_some() { "on" } else { "off" },
            if disk.is_some() { "on" } else { "off" },
        );

        Self {
            memory: Mutex::new(MemoryTier::new(config.memory_capacity)),
            remote,
            disk,
            default_ttl: Duration::from_secs(config.ttl_secs),
            metrics: CacheMetrics::default(),
        }
    }

    /// Looks a key up through the tiers, promoting hits upward with
    /// their remaining TTL.
    pub async fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        let now = now_ms();
        let k = key.as_str();

        if let Some(entry) = self.lock_memory().get(k, now) {
            self.metrics.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.payload);
        }

        if let Some(remote) = &self.remote {
            if let Some(entry) = remote.get(k, now).await {
                debug!("Cache hit in shared tier for {k}");
                self.promote_to_memory(k, &entry);
                self.metrics.remote_hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.payload);
            }
        }

        if let Some(disk) = &self.disk {
            if let Some(entry) = disk.get(k, now).await {
                debug!("Cache hit in disk tier for {k}");
                if let Some(remote) = &self.remote {
                    remote.put(k, &entry, now).await;
                }
                self.promote_to_memory(k, &entry);
                self.metrics.disk_hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.payload);
            }
        }

        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Writes a value through every tier with the given (or default) TTL
    pub async fn set(&self, key: &CacheKey, value: serde_json::Value, ttl: Option<Duration>) {
        let now = now_ms();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            payload: value,
            created_at_ms: now,
            expires_at_ms: now + ttl.as_millis() as i64,
        };
        let k = key.as_str();

        if self.lock_memory().insert(k.to_string(), entry.clone()) {
            self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(remote) = &self.remote {
            remote.put(k, &entry, now).await;
        }
        if let Some(disk) = &self.disk {
            disk.put(k, &entry).await;
        }
        self.metrics.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes a key from every tier
    pub async fn delete(&self, key: &CacheKey) {
        let k = key.as_str();
        self.lock_memory().remove(k);
        if let Some(remote) = &self.remote {
            remote.remove(k).await;
        }
        if let Some(disk) = &self.disk {
            disk.remove(k).await;
        }
    }

    /// True when any tier holds a live entry. Does not refresh recency
    /// or promote.
    pub async fn exists(&self, key: &CacheKey) -> bool {
        let now = now_ms();
        let k = key.as_str();
        if self.lock_memory().contains(k, now) {
            return true;
        }
        if let Some(remote) = &self.remote {
            if remote.get(k, now).await.is_some() {
                return true;
            }
        }
        if let Some(disk) = &self.disk {
            if disk.get(k, now).await.is_some() {
                return true;
            }
        }
        false
    }

    /// Empties every tier
    pub async fn clear(&self) {
        self.lock_memory().clear();
        if let Some(remote) = &self.remote {
            remote.clear().await;
        }
        if let Some(disk) = &self.disk {
            disk.clear().await;
        }
    }

    pub fn stats(&self) -> CacheStats {
        let memory_hits = self.metrics.memory_hits.load(Ordering::Relaxed);
        let remote_hits = self.metrics.remote_hits.load(Ordering::Relaxed);
        let disk_hits = self.metrics.disk_hits.load(Ordering::Relaxed);
        CacheStats {
            hits: memory_hits + remote_hits + disk_hits,
            misses: self.metrics.misses.load(Ordering::Relaxed),
            writes: self.metrics.writes.load(Ordering::Relaxed),
            evictions: self.metrics.evictions.load(Ordering::Relaxed),
            memory_hits,
            remote_hits,
            disk_hits,
            memory_entries: self.lock_memory().len(),
        }
    }

    fn promote_to_memory(&self, key: &str, entry: &CacheEntry) {
        if self
            .lock_memory()
            .insert(key.to_string(), entry.clone())
        {
            self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn lock_memory(&self) -> std::sync::MutexGuard<'_, MemoryTier> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
