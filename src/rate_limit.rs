use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};

const KEY_PREFIX: &str = "folio:rl:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_secs: u64,
}

impl Decision {
    fn from_count(count: u64, limit: u32, ttl_secs: u64) -> Self {
        let limit = u64::from(limit);
        Self {
            allowed: count <= limit,
            remaining: limit.saturating_sub(count) as u32,
            retry_after_secs: if count <= limit { 0 } else { ttl_secs.max(1) },
        }
    }
}

/// Fixed-window hit counter.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> anyhow::Result<Decision>;
}

#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: ConnectionManager,
}

impl RedisRateLimiter {
    fn manager_config() -> ConnectionManagerConfig {
        ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(500))
    }

    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = Client::open(url).context("parse redis url")?;
        let conn = client
            .get_connection_manager_with_config(Self::manager_config())
            .await
            .context("connect to redis")?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> anyhow::Result<Decision> {
        let key = format!("{KEY_PREFIX}{key}");
        let window_secs = window.as_secs().max(1);
        let mut conn = self.conn.clone();

        let count: u64 = conn.incr(&key, 1u64).await.context("redis INCR")?;
        if count == 1 {
            let _: () = conn
                .expire(&key, window_secs as i64)
                .await
                .context("redis EXPIRE")?;
        }
        let ttl: i64 = conn.ttl(&key).await.context("redis TTL")?;
        if ttl < 0 {
            // Counter survived without an expiry (e.g. EXPIRE lost after INCR).
            let _: () = conn
                .expire(&key, window_secs as i64)
                .await
                .context("redis EXPIRE")?;
        }
        let ttl_secs = if ttl > 0 { ttl as u64 } else { window_secs };

        Ok(Decision::from_count(count, limit, ttl_secs))
    }
}

#[cfg(test)]
pub use memory::MemoryRateLimiter;
