//! Integration tests for flagstore-cache

use flagstore_cache::*;
use flagstore_core::FlagDefinition;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_entry_expiry() {
    let cache = FlagCache::new(CacheConfig::new().with_ttl(Duration::from_secs(30))).unwrap();
    cache.put(FlagDefinition::boolean("f", true));

    let entry = cache.lookup("f").unwrap();
    assert!(!cache.is_expired(&entry));

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(cache.is_expired(&entry));

    // Expired entries are still served
    assert!(cache.lookup("f").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_same_version_put_renews_expiry() {
    let cache = FlagCache::new(CacheConfig::new().with_ttl(Duration::from_secs(30))).unwrap();
    cache.put(FlagDefinition::boolean("f", true).with_version(3));

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(cache.is_expired(&cache.peek("f").unwrap()));

    // A re-fetch of the cached version confirms the entry
    let outcome = cache.put(FlagDefinition::boolean("f", false).with_version(3));
    assert_eq!(outcome, PutOutcome::Unchanged);

    let entry = cache.peek("f").unwrap();
    assert!(!cache.is_expired(&entry));
    assert_eq!(entry.definition, FlagDefinition::boolean("f", true).with_version(3));
}

#[tokio::test(start_paused = true)]
async fn test_no_ttl_never_expires() {
    let cache = FlagCache::default();
    cache.put(FlagDefinition::boolean("f", true));
    tokio::time::advance(Duration::from_secs(86_400)).await;
    assert!(!cache.is_expired(&cache.lookup("f").unwrap()));
}

#[test]
fn test_entry_records_fetched_version() {
    let cache = FlagCache::default();
    cache.put(FlagDefinition::boolean("f", true).with_version(9));
    let entry = cache.peek("f").unwrap();
    assert_eq!(entry.fetched_at_version, 9);
    assert_eq!(entry.key(), "f");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_are_monotonic() {
    let cache = Arc::new(FlagCache::new(CacheConfig::new().with_shards(4)).unwrap());

    let mut handles = Vec::new();
    for writer in 0..8u64 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            for step in 0..200u64 {
                let version = (step * 8 + writer) % 500 + 1;
                cache.put(FlagDefinition::boolean("shared", true).with_version(version));

                let seen = cache.lookup("shared").unwrap().definition.version;
                assert!(seen >= version);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let final_version = cache.lookup("shared").unwrap().definition.version;
    assert_eq!(Some(final_version), cache.high_water("shared"));
    assert_eq!(final_version, 500);
}

#[test]
fn test_unrelated_keys_spread_over_shards() {
    let cache = FlagCache::new(CacheConfig::new().with_shards(8).with_max_entries(800)).unwrap();
    for i in 0..400 {
        assert_eq!(
            cache.put(FlagDefinition::boolean(format!("flag-{}", i), true)),
            PutOutcome::Inserted
        );
    }
    assert_eq!(cache.len(), 400);
    assert_eq!(cache.stats().evictions, 0);
}
