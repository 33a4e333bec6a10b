//! Local persistent tier (L3)
//!
//! One JSON envelope per key. Expiry is validated on read and expired
//! files are deleted lazily; there is no background sweeper.

use super::CacheEntry;
use std::path::PathBuf;
use tracing::{debug, warn};

pub(crate) struct DiskTier {
    dir: PathBuf,
}

impl DiskTier {
    pub fn new(dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub async fn get(&self, key: &str, now_ms: i64) -> Option<CacheEntry> {
        let path = self.path(key);
        let raw = tokio::fs::read(&path).await.ok()?;
        let entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Discarding unreadable cache file {}: {e}", path.display());
                let _ = tokio::fs::remove_file(&path).await;
                return None;
            }
        };
        if entry.is_expired(now_ms) {
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }
        Some(entry)
    }

    pub async fn put(&self, key: &str, entry: &CacheEntry) {
        let Ok(raw) = serde_json::to_vec(entry) else {
            return;
        };
        if let Err(e) = tokio::fs::write(self.path(key), raw).await {
            warn!("Disk cache write failed for {key}: {e}");
        }
    }

    pub async fn remove(&self, key: &str) {
        let _ = tokio::fs::remove_file(self.path(key)).await;
    }

    pub async fn clear(&self) {
        let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let _ = tokio::fs::remove_file(path).await;
            }
        }
    }
}
