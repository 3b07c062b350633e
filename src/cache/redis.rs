//! Redis cache backend.
//!
//! Uses `SET .. PX .. GET` and `GETDEL`, so the server must be Redis 6.2 or newer.

use ::redis::aio::ConnectionManager;
use ::redis::{Client, Cmd};
use async_trait::async_trait;
use bytes::Bytes;
use reelcast_common::{Error, Result};
use std::time::Duration;

use super::Cache;

/// Cache backed by a shared Redis server over a multiplexed connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    prefix: String,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Redis rejects zero expiries, so round up to one millisecond.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn prefixed(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}

impl RedisCache {
    /// Connect to `url`. Every key is stored under `prefix`.
    pub async fn connect(url: &str, prefix: Option<String>) -> Result<Self> {
        let client =
            Client::open(url).map_err(|e| Error::cache(format!("Invalid Redis URL: {}", e)))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::cache(format!("Redis connection failed: {}", e)))?;

        tracing::info!(prefix = ?prefix, "Connected to Redis cache");

        Ok(Self {
            conn,
            prefix: prefix.unwrap_or_default(),
        })
    }

    fn key(&self, key: &str) -> String {
        prefixed(&self.prefix, key)
    }

    async fn run<T: ::redis::FromRedisValue>(&self, cmd: &Cmd) -> Result<T> {
        let mut conn = self.conn.clone();
        cmd.query_async(&mut conn)
            .await
            .map_err(|e| Error::cache(format!("Redis command failed: {}", e)))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run(::redis::cmd("GET").arg(self.key(key))).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.run(
            ::redis::cmd("SET")
                .arg(self.key(key))
                .arg(value)
                .arg("PX")
                .arg(ttl_millis(ttl)),
        )
        .await
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Bytes>> {
        let value: Option<Vec<u8>> = self.run(::redis::cmd("GET").arg(self.key(key))).await?;
        Ok(value.map(Bytes::from))
    }

    async fn put_bytes(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.run(
            ::redis::cmd("SET")
                .arg(self.key(key))
                .arg(value.as_ref())
                .arg("PX")
                .arg(ttl_millis(ttl)),
        )
        .await
    }

    async fn replace(&self, key: &str, value: &str, ttl: Duration) -> Result<Option<String>> {
        self.run(
            ::redis::cmd("SET")
                .arg(self.key(key))
                .arg(value)
                .arg("PX")
                .arg(ttl_millis(ttl))
                .arg("GET"),
        )
        .await
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        self.run(::redis::cmd("GETDEL").arg(self.key(key))).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _: i64 = self.run(::redis::cmd("DEL").arg(self.key(key))).await?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut cmd = ::redis::cmd("DEL");
        for key in keys {
            cmd.arg(self.key(key));
        }
        let _: i64 = self.run(&cmd).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let updated: i64 = self
            .run(
                ::redis::cmd("PEXPIRE")
                    .arg(self.key(key))
                    .arg(ttl_millis(ttl)),
            )
            .await?;
        Ok(updated == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis() {
        assert_eq!(ttl_millis(Duration::from_secs(15)), 15_000);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
    }

    #[test]
    fn test_prefixed() {
        assert_eq!(
            prefixed("reelcast:", "Stream:abc:Init"),
            "reelcast:Stream:abc:Init"
        );
        assert_eq!(prefixed("", "ClientId:x:StreamId"), "ClientId:x:StreamId");
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let err = RedisCache::connect("not a url", None).await.unwrap_err();
        assert!(matches!(err, Error::Cache(_)));
    }
}
