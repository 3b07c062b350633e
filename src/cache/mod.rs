//! Ephemeral key/value storage with per-key expiry.
//!
//! All streaming state (session index entries, stream metadata, init and
//! media segments) lives behind the [`Cache`] trait. Two backends exist:
//!
//! - [`MemoryCache`]: a `DashMap` for single-process deployments and tests
//! - [`RedisCache`]: a shared Redis server, so several reelcast processes can
//!   serve the same streams

mod memory;
mod redis;

pub use self::memory::{start_purge_task, MemoryCache};
pub use self::redis::RedisCache;

use async_trait::async_trait;
use bytes::Bytes;
use reelcast_common::Result;
use std::time::Duration;

/// String-keyed cache where every entry carries an expiry.
///
/// Every method is a single atomic operation on one key. Expired entries
/// behave exactly like absent ones.
#[async_trait]
pub trait Cache: Send + Sync + 'static {
    /// Read a text value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a text value that expires after `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Read a binary value.
    async fn get_bytes(&self, key: &str) -> Result<Option<Bytes>>;

    /// Write a binary value that expires after `ttl`.
    async fn put_bytes(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    /// Write a text value and return the live value it overwrote.
    async fn replace(&self, key: &str, value: &str, ttl: Duration) -> Result<Option<String>>;

    /// Remove a text value and return it if it was live.
    async fn take(&self, key: &str) -> Result<Option<String>>;

    /// Remove a key. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove several keys.
    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Reset the expiry of a live key without rewriting it.
    ///
    /// Returns `false` if the key was absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;
}
