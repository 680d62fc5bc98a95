//! Redis-backed flag store.
//!
//! Layout under a key prefix:
//!
//! | Key                  | Type    | Contents                         |
//! |----------------------|---------|----------------------------------|
//! | `{prefix}:features`  | hash    | flag key → JSON definition       |
//! | `{prefix}:$inited`   | string  | present once `init` has run      |
//! | `{prefix}:changes`   | channel | JSON [`ChangeEvent`]s            |

use async_trait::async_trait;
use flagstore_core::FlagDefinition;
use flagstore_redis::{RedisConfig, RedisService, Subscription, redis};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::StoreResult;
use crate::traits::{ChangeEvent, ChangeStream, FlagStore};

/// Default key prefix.
pub const DEFAULT_PREFIX: &str = "flagstore";

// KEYS[1] features hash
// ARGV[1] flag key, ARGV[2] version, ARGV[3] definition JSON,
// ARGV[4] change channel, ARGV[5] change event JSON
const PUT_SCRIPT: &str = r#"
local current = redis.call('HGET', KEYS[1], ARGV[1])
if current then
    local ok, stored = pcall(cjson.decode, current)
    if ok and type(stored) == 'table' then
        local stored_version = tonumber(stored['version'])
        if stored_version and stored_version >= tonumber(ARGV[2]) then
            return 0
        end
    end
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
redis.call('PUBLISH', ARGV[4], ARGV[5])
return 1
"#;

/// Flag store over a Redis hash with pub/sub change notification.
pub struct RedisFlagStore {
    redis: Arc<RedisService>,
    prefix: String,
    put_script: redis::Script,
}

impl RedisFlagStore {
    pub fn new(redis: Arc<RedisService>, prefix: impl Into<String>) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
            put_script: redis::Script::new(PUT_SCRIPT),
        }
    }

    /// Build a store whose pool connects on first use, so an unreachable
    /// server does not fail construction.
    pub fn connect_lazy(config: RedisConfig, prefix: impl Into<String>) -> StoreResult<Self> {
        let redis = RedisService::connect_lazy(config)?;
        Ok(Self::new(Arc::new(redis), prefix))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn features_key(&self) -> String {
        format!("{}:features", self.prefix)
    }

    pub fn inited_key(&self) -> String {
        format!("{}:$inited", self.prefix)
    }

    pub fn changes_channel(&self) -> String {
        format!("{}:changes", self.prefix)
    }

    fn decode(field: &str, raw: &str) -> Option<FlagDefinition> {
        match serde_json::from_str::<FlagDefinition>(raw) {
            Ok(definition) if definition.key == field => Some(definition),
            Ok(definition) => {
                warn!(field = %field, flag_key = %definition.key, "Skipping flag stored under a different key");
                None
            }
            Err(e) => {
                warn!(flag_key = %field, error = %e, "Skipping malformed flag definition");
                None
            }
        }
    }

    fn change_stream(subscription: Subscription) -> ChangeStream {
        subscription
            .into_stream()
            .filter_map(|message| async move {
                serde_json::from_str::<ChangeEvent>(&message.payload)
                    .inspect_err(|e| {
                        warn!(channel = %message.channel, error = %e, "Ignoring malformed change event");
                    })
                    .ok()
            })
            .boxed()
    }
}

#[async_trait]
impl FlagStore for RedisFlagStore {
    async fn get(&self, key: &str) -> StoreResult<Option<FlagDefinition>> {
        let raw: Option<String> = self.redis.hget(&self.features_key(), key).await?;
        Ok(raw.and_then(|raw| Self::decode(key, &raw)))
    }

    async fn get_all(&self) -> StoreResult<HashMap<String, FlagDefinition>> {
        let raw: HashMap<String, String> = self.redis.hgetall(&self.features_key()).await?;
        let all: HashMap<String, FlagDefinition> = raw
            .iter()
            .filter_map(|(field, json)| Self::decode(field, json).map(|d| (field.clone(), d)))
            .collect();

        debug!(count = all.len(), skipped = raw.len() - all.len(), "Loaded all flags from Redis");
        Ok(all)
    }

    async fn put(&self, definition: &FlagDefinition) -> StoreResult<bool> {
        let json = serde_json::to_string(definition)?;
        let event = serde_json::to_string(&ChangeEvent::for_flag(definition))?;
        let version = definition.version.to_string();
        let features = self.features_key();
        let channel = self.changes_channel();

        let written: i64 = self
            .redis
            .eval(
                &self.put_script,
                &[features.as_str()],
                &[
                    definition.key.as_str(),
                    version.as_str(),
                    json.as_str(),
                    channel.as_str(),
                    event.as_str(),
                ],
            )
            .await?;

        debug!(flag_key = %definition.key, version = definition.version, written = written == 1, "Put flag");
        Ok(written == 1)
    }

    async fn subscribe(&self) -> StoreResult<ChangeStream> {
        let subscription = self
            .redis
            .pubsub()?
            .subscribe(&self.changes_channel())
            .await?;
        Ok(Self::change_stream(subscription))
    }

    async fn is_initialized(&self) -> StoreResult<bool> {
        Ok(self.redis.exists(&self.inited_key()).await?)
    }

    async fn init(&self, definitions: Vec<FlagDefinition>) -> StoreResult<()> {
        let features = self.features_key();
        let previous = self.get_all().await?;
        let mut items = Vec::with_capacity(definitions.len());
        for definition in &definitions {
            items.push((definition.key.clone(), serde_json::to_string(definition)?));
        }

        let mut pipe = redis::pipe();
        pipe.atomic().del(&features).ignore();
        if !items.is_empty() {
            pipe.hset_multiple(&features, &items).ignore();
        }
        pipe.set(self.inited_key(), "1").ignore();
        let _: () = self.redis.exec_pipeline(&pipe).await?;

        let channel = self.changes_channel();
        let kept: HashSet<&str> = definitions.iter().map(|d| d.key.as_str()).collect();
        let events = definitions.iter().map(ChangeEvent::for_flag).chain(
            previous
                .values()
                .filter(|old| !kept.contains(old.key.as_str()))
                .map(ChangeEvent::removal),
        );
        for event in events {
            self.redis.publish(&channel, &serde_json::to_string(&event)?).await?;
        }

        info!(count = definitions.len(), prefix = %self.prefix, "Initialized Redis flag store");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
