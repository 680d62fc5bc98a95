//! Redis connection pool.

use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use tracing::info;

use crate::{RedisConfig, RedisError, Result};

/// Type alias for the connection pool.
pub type RedisPool = Pool<RedisConnectionManager>;

/// Builder for creating Redis connection pools.
pub struct RedisPoolBuilder {
    config: RedisConfig,
}

impl RedisPoolBuilder {
    /// Create a new pool builder.
    pub fn new(config: RedisConfig) -> Self {
        Self { config }
    }

    fn builder(&self) -> bb8::Builder<RedisConnectionManager> {
        Pool::builder()
            .max_size(self.config.pool_size)
            .min_idle(self.config.min_idle)
            .connection_timeout(self.config.connection_timeout)
    }

    fn manager(&self) -> Result<RedisConnectionManager> {
        self.config.validate()?;
        RedisConnectionManager::new(self.config.connection_url()?)
            .map_err(|e| RedisError::Connection(e.to_string()))
    }

    /// Build the pool and check it with a PING.
    pub async fn build(self) -> Result<RedisPool> {
        let pool = self
            .builder()
            .build(self.manager()?)
            .await
            .map_err(|e| RedisError::Pool(e.to_string()))?;

        // Test the connection in a scope so the connection is dropped before returning pool
        {
            let mut conn = pool.get().await?;
            let _: String = redis::cmd("PING")
                .query_async(&mut *conn)
                .await
                .map_err(|e| RedisError::Connection(e.to_string()))?;
        }

        info!(
            pool_size = self.config.pool_size,
            url = %self.config.redacted_url(),
            "Redis connection pool created"
        );

        Ok(pool)
    }

    /// Build the pool without opening any connection.
    ///
    /// Connections are established on first use, so an unreachable server
    /// surfaces as a retryable error from the first command instead.
    pub fn build_lazy(self) -> Result<RedisPool> {
        let pool = self.builder().build_unchecked(self.manager()?);

        info!(
            pool_size = self.config.pool_size,
            url = %self.config.redacted_url(),
            "Redis connection pool created (lazy)"
        );

        Ok(pool)
    }
}
