//! Redis service: a pool plus the commands flagstore needs.

use bb8::PooledConnection;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use std::future::Future;

use crate::{
    RedisConfig, RedisError, Result,
    pool::{RedisPool, RedisPoolBuilder},
    pubsub::PubSub,
};

/// Redis service providing a connection pool and command helpers.
///
/// Every command is bounded by the configured command timeout.
pub struct RedisService {
    config: RedisConfig,
    pool: RedisPool,
}

impl RedisService {
    /// Create a new Redis service, checking the server is reachable.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = RedisPoolBuilder::new(config.clone()).build().await?;
        Ok(Self { config, pool })
    }

    /// Create a service that connects on first use.
    pub fn connect_lazy(config: RedisConfig) -> Result<Self> {
        let pool = RedisPoolBuilder::new(config.clone()).build_lazy()?;
        Ok(Self { config, pool })
    }

    /// Create a Pub/Sub client.
    pub fn pubsub(&self) -> Result<PubSub> {
        PubSub::new(&self.config)
    }

    async fn conn(&self) -> Result<PooledConnection<'_, RedisConnectionManager>> {
        Ok(self.pool.get().await?)
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.config.command_timeout, fut)
            .await
            .map_err(|_| RedisError::Timeout)?
    }

    /// Check if a key exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.timed(async {
            let mut conn = self.conn().await?;
            let exists: bool = conn.exists(key).await?;
            Ok(exists)
        })
        .await
    }

    /// Hash get.
    pub async fn hget<T: redis::FromRedisValue>(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<T>> {
        self.timed(async {
            let mut conn = self.conn().await?;
            let value: Option<T> = conn.hget(key, field).await?;
            Ok(value)
        })
        .await
    }

    /// Hash get all.
    pub async fn hgetall<T: redis::FromRedisValue>(&self, key: &str) -> Result<T> {
        self.timed(async {
            let mut conn = self.conn().await?;
            let value: T = conn.hgetall(key).await?;
            Ok(value)
        })
        .await
    }

    /// Publish a message, returning the number of receivers.
    pub async fn publish(&self, channel: &str, message: &str) -> Result<u32> {
        self.timed(async {
            let mut conn = self.conn().await?;
            let receivers: u32 = conn.publish(channel, message).await?;
            Ok(receivers)
        })
        .await
    }

    /// Execute a Lua script.
    pub async fn eval<T: redis::FromRedisValue>(
        &self,
        script: &redis::Script,
        keys: &[&str],
        args: &[&str],
    ) -> Result<T> {
        self.timed(async {
            let mut conn = self.conn().await?;
            let result: T = script
                .key(keys)
                .arg(args)
                .invoke_async(&mut *conn)
                .await?;
            Ok(result)
        })
        .await
    }

    /// Execute a pipeline (atomic when built with `.atomic()`).
    pub async fn exec_pipeline<T: redis::FromRedisValue>(
        &self,
        pipeline: &redis::Pipeline,
    ) -> Result<T> {
        self.timed(async {
            let mut conn = self.conn().await?;
            let result: T = pipeline.query_async(&mut *conn).await?;
            Ok(result)
        })
        .await
    }
}
