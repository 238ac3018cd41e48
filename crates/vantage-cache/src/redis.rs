//! Redis-backed cache implementation.
//!
//! Maps the [`CacheBackend`] primitives onto Redis commands: GET/SET EX/DEL
//! for values, ZADD/ZREM/ZRANGE for the ordered-set indexes, TTL/EXPIRE for
//! expiry management and SCAN for keyspace enumeration. Connections go
//! through [`redis::aio::ConnectionManager`], which multiplexes and
//! reconnects on its own.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use crate::backend::CacheBackend;
use crate::error::{CacheError, Result};

fn map_err(err: redis::RedisError) -> CacheError {
    if err.is_timeout() {
        CacheError::Timeout
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        CacheError::Unavailable(err.to_string())
    } else {
        CacheError::Backend(err.to_string())
    }
}

/// TTLs are granular to the second in Redis; never ask for zero, which the
/// server rejects.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Redis implementation of [`CacheBackend`].
#[derive(Clone)]
pub struct RedisCache {
    manager: redis::aio::ConnectionManager,
}

impl RedisCache {
    /// Connect to a Redis instance at `url` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_err)?;
        let manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(map_err)?;
        debug!(url = %url, "Connected to Redis cache");
        Ok(Self { manager })
    }

    /// Wrap an already-established connection manager.
    pub fn from_manager(manager: redis::aio::ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut con = self.manager.clone();
        let value: Option<String> = con.get(key).await.map_err(map_err)?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut con = self.manager.clone();
        let _: () = con
            .set_ex(key, value, ttl_secs(ttl))
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut con = self.manager.clone();
        let removed: i64 = con.del(key).await.map_err(map_err)?;
        Ok(removed > 0)
    }

    async fn index_add(&self, key: &str, member: &str, score: f64, ttl: Duration) -> Result<()> {
        let mut con = self.manager.clone();
        let _: () = con.zadd(key, member, score).await.map_err(map_err)?;

        // Raise the set's TTL to at least the new member's, never lower it.
        let secs = ttl_secs(ttl) as i64;
        let current: i64 = con.ttl(key).await.map_err(map_err)?;
        if current < secs {
            let _: () = con.expire(key, secs).await.map_err(map_err)?;
        }
        Ok(())
    }

    async fn index_remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut con = self.manager.clone();
        let removed: i64 = con.zrem(key, member).await.map_err(map_err)?;
        Ok(removed > 0)
    }

    async fn index_members(&self, key: &str) -> Result<Vec<String>> {
        let mut con = self.manager.clone();
        let members: Vec<String> = con.zrange(key, 0, -1).await.map_err(map_err)?;
        Ok(members)
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        let mut con = self.manager.clone();
        let pattern = format!("{prefix}*");
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<'_, String> =
            con.scan_match(pattern).await.map_err(map_err)?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}
