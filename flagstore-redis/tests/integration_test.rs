//! Integration tests for flagstore-redis
//!
//! Tests marked `#[ignore]` need a Redis server on localhost:6379:
//! `cargo test -- --ignored`

use flagstore_redis::*;
use std::collections::HashMap;
use std::time::Duration;

#[test]
fn test_config_from_builder() {
    let config = RedisConfig::builder()
        .url("redis://localhost:6380")
        .pool_size(3)
        .min_idle(1)
        .command_timeout(Duration::from_secs(1))
        .build();

    assert_eq!(config.pool_size, 3);
    assert_eq!(config.command_timeout, Duration::from_secs(1));
    assert!(config.validate().is_ok());
}

#[test]
fn test_error_display() {
    let err = RedisError::Connection("Failed to connect".to_string());
    assert!(err.to_string().contains("Failed to connect"));
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_hash_and_script() {
    let redis = RedisService::new(RedisConfig::default()).await.unwrap();
    let key = "flagstore:test:hash";
    let mut clear = redis::pipe();
    clear.del(key).ignore();
    let _: () = redis.exec_pipeline(&clear).await.unwrap();

    let script = redis::Script::new("return redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])");
    let added: i64 = redis.eval(&script, &[key], &["f", "v"]).await.unwrap();
    assert_eq!(added, 1);

    let value: Option<String> = redis.hget(key, "f").await.unwrap();
    assert_eq!(value.as_deref(), Some("v"));

    let all: HashMap<String, String> = redis.hgetall(key).await.unwrap();
    assert_eq!(all.len(), 1);

    let mut clear = redis::pipe();
    clear.del(key).ignore();
    let _: () = redis.exec_pipeline(&clear).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_publish_subscribe() {
    let redis = RedisService::new(RedisConfig::default()).await.unwrap();
    let mut sub = redis.pubsub().unwrap().subscribe("flagstore:test:chan").await.unwrap();

    redis.publish("flagstore:test:chan", "hello").await.unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.payload, "hello");
    assert_eq!(sub.channel(), "flagstore:test:chan");
}
