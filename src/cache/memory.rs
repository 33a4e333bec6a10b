//! In-process LRU memory tier (L1)

use super::CacheEntry;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Bounded LRU store. Every successful `get` refreshes recency; the
/// least-recently-used entry is dropped when capacity is exceeded.
pub(crate) struct MemoryTier {
    entries: LruCache<String, CacheEntry>,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Returns a live entry and refreshes its recency. Expired entries
    /// are removed and reported as absent.
    pub fn get(&mut self, key: &str, now_ms: i64) -> Option<CacheEntry> {
        let expired = matches!(self.entries.peek(key), Some(e) if e.is_expired(now_ms));
        if expired {
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).cloned()
    }

    /// True when a live entry exists, without touching recency.
    pub fn contains(&self, key: &str, now_ms: i64) -> bool {
        matches!(self.entries.peek(key), Some(e) if !e.is_expired(now_ms))
    }

    /// Inserts an entry, returning true when the insert evicted the
    /// least-recently-used resident.
    pub fn insert(&mut self, key: String, entry: CacheEntry) -> bool {
        let evicting =
            self.entries.len() == self.entries.cap().get() && self.entries.peek(&key).is_none();
        self.entries.put(key, entry);
        evicting
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.pop(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
