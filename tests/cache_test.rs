//! Integration tests for the three-tier cache

use serde_json::json;
use std::time::Duration;
use vigil::cache::{CacheKey, ScanCache};
use vigil::models::CacheConfig;

/// Memory-only cache configuration
fn memory_config(capacity: usize) -> CacheConfig {
    CacheConfig {
        enabled: true,
        ttl_secs: 60,
        memory_capacity: capacity,
        redis_url: None,
        disk_enabled: false,
        disk_dir: None,
    }
}

/// Memory + disk configuration rooted in a temp directory
fn disk_config(capacity: usize, dir: &std::path::Path) -> CacheConfig {
    CacheConfig {
        disk_enabled: true,
        disk_dir: Some(dir.to_path_buf()),
        ..memory_config(capacity)
    }
}

#[tokio::test]
async fn test_cache_round_trip() {
    let cache = ScanCache::from_config(&memory_config(16));
    let key = CacheKey::from_url("https://example.com/page?a=1");

    cache.set(&key, json!({"title": "home"}), None).await;
    let value = cache.get(&key).await.expect("expected a cache hit");
    assert_eq!(value, json!({"title": "home"}));

    let stats = cache.stats();
    assert_eq!(stats.writes, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.memory_hits, 1);
    assert_eq!(stats.misses, 0);
}

#[tokio::test]
async fn test_cache_miss_after_ttl() {
    let cache = ScanCache::from_config(&memory_config(16));
    let key = CacheKey::from_url("https://example.com/expiring");

    cache
        .set(&key, json!("v"), Some(Duration::from_millis(60)))
        .await;
    assert!(cache.get(&key).await.is_some());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(cache.get(&key).await.is_none(), "entry should have expired");
}

#[tokio::test]
async fn test_cache_key_stability() {
    let a = CacheKey::from_url("https://example.com/search?a=1&b=2");
    let b = CacheKey::from_url("https://example.com/search?b=2&a=1");
    assert_eq!(a, b, "parameter order must not change the key");

    let other = CacheKey::from_url("https://example.org/search?a=1&b=2");
    assert_ne!(a, other, "different hosts must produce different keys");
}

#[tokio::test]
async fn test_lru_evicts_least_recently_accessed() {
    let cache = ScanCache::from_config(&memory_config(2));
    let old = CacheKey::from_url("https://example.com/old");
    let mid = CacheKey::from_url("https://example.com/mid");
    let new = CacheKey::from_url("https://example.com/new");

    cache.set(&old, json!("old"), None).await;
    cache.set(&mid, json!("mid"), None).await;

    // Access the older entry so the middle one becomes least recently used
    assert!(cache.get(&old).await.is_some());

    cache.set(&new, json!("new"), None).await;

    assert!(
        cache.get(&old).await.is_some(),
        "recently accessed entry must survive eviction"
    );
    assert!(
        cache.get(&mid).await.is_none(),
        "least recently accessed entry must be evicted"
    );
    assert!(cache.get(&new).await.is_some());
    assert_eq!(cache.stats().evictions, 1);
}

#[tokio::test]
async fn test_disk_hit_promotes_to_memory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = ScanCache::from_config(&disk_config(1, dir.path()));
    let first = CacheKey::from_url("https://example.com/first");
    let second = CacheKey::from_url("https://example.com/second");

    cache.set(&first, json!("first"), None).await;
    // Pushes `first` out of the single-slot memory tier; disk keeps both
    cache.set(&second, json!("second"), None).await;

    assert_eq!(cache.get(&first).await, Some(json!("first")));
    let stats = cache.stats();
    assert_eq!(stats.disk_hits, 1, "first read comes from disk");

    // The promoted entry now serves from memory
    assert_eq!(cache.get(&first).await, Some(json!("first")));
    assert_eq!(cache.stats().memory_hits, 1);
}

#[tokio::test]
async fn test_promotion_keeps_remaining_ttl() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = ScanCache::from_config(&disk_config(1, dir.path()));
    let key = CacheKey::from_url("https://example.com/short-lived");

    cache
        .set(&key, json!("v"), Some(Duration::from_millis(150)))
        .await;
    // Evict from memory so the next read promotes from disk
    let filler = CacheKey::from_url("https://example.com/filler");
    cache.set(&filler, json!("f"), None).await;

    assert!(cache.get(&key).await.is_some(), "promoted from disk");

    // The promoted copy must expire on the original schedule
    tokio::time::sleep(Duration::from_millis(220)).await;
    assert!(
        cache.get(&key).await.is_none(),
        "promotion must not extend the original TTL"
    );
}

#[tokio::test]
async fn test_disk_persists_across_instances() {
    let dir = tempfile::tempdir().expect("tempdir");
    let key = CacheKey::from_url("https://example.com/persisted");

    {
        let cache = ScanCache::from_config(&disk_config(8, dir.path()));
        cache.set(&key, json!("kept"), None).await;
    }

    let reopened = ScanCache::from_config(&disk_config(8, dir.path()));
    assert_eq!(reopened.get(&key).await, Some(json!("kept")));
    assert_eq!(reopened.stats().disk_hits, 1);
}

#[tokio::test]
async fn test_expired_disk_entry_is_lazily_deleted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let key = CacheKey::from_url("https://example.com/stale");

    {
        let cache = ScanCache::from_config(&disk_config(8, dir.path()));
        cache
            .set(&key, json!("stale"), Some(Duration::from_millis(50)))
            .await;
    }

    tokio::time::sleep(Duration::from_millis(120)).await;

    let reopened = ScanCache::from_config(&disk_config(8, dir.path()));
    assert!(reopened.get(&key).await.is_none());

    let remaining: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read cache dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .collect();
    assert!(remaining.is_empty(), "expired file should be deleted on read");
}

#[tokio::test]
async fn test_delete_exists_and_clear() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = ScanCache::from_config(&disk_config(8, dir.path()));
    let key = CacheKey::from_url("https://example.com/k");

    assert!(!cache.exists(&key).await);
    cache.set(&key, json!("v"), None).await;
    assert!(cache.exists(&key).await);

    cache.delete(&key).await;
    assert!(!cache.exists(&key).await);
    assert!(cache.get(&key).await.is_none());

    cache.set(&key, json!("v"), None).await;
    cache.clear().await;
    assert!(cache.get(&key).await.is_none());
    assert_eq!(cache.stats().memory_entries, 0);
}

#[tokio::test]
async fn test_unreachable_shared_tier_degrades_silently() {
    let config = CacheConfig {
        redis_url: Some("redis://127.0.0.1:1/".to_string()),
        ..memory_config(8)
    };
    let cache = ScanCache::from_config(&config);
    let key = CacheKey::from_url("https://example.com/resilient");

    // Neither call may fail even though the shared tier is down
    cache.set(&key, json!("v"), None).await;
    assert_eq!(cache.get(&key).await, Some(json!("v")));
}
