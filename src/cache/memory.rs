//! In-process cache backend.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use reelcast_common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::Cache;

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Binary(Bytes),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

impl Entry {
    fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

fn into_text(key: &str, value: Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s),
        Value::Binary(b) => String::from_utf8(b.to_vec())
            .map_err(|_| Error::cache(format!("value at {} is not text", key))),
    }
}

/// `DashMap`-backed cache.
///
/// Expired entries are invisible to every read and are dropped lazily when
/// touched, or in bulk by [`MemoryCache::purge_expired`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the live value at `key`, dropping it if it has expired.
    fn live(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let (value, expired) = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => (Some(entry.value.clone()), false),
            Some(_) => (None, true),
            None => (None, false),
        };
        if expired {
            self.entries.remove_if(key, |_, e| !e.is_live(now));
        }
        value
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            tracing::debug!(removed = removed, "Purged expired cache entries");
        }

        removed
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.live(key).map(|v| into_text(key, v)).transpose()
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), Entry::new(Value::Text(value.to_string()), ttl));
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.live(key).map(|v| match v {
            Value::Binary(b) => b,
            Value::Text(s) => Bytes::from(s),
        }))
    }

    async fn put_bytes(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), Entry::new(Value::Binary(value), ttl));
        Ok(())
    }

    async fn replace(&self, key: &str, value: &str, ttl: Duration) -> Result<Option<String>> {
        let now = Instant::now();
        let previous = self
            .entries
            .insert(key.to_string(), Entry::new(Value::Text(value.to_string()), ttl));
        previous
            .filter(|e| e.is_live(now))
            .map(|e| into_text(key, e.value))
            .transpose()
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        self.entries
            .remove(key)
            .map(|(_, e)| e)
            .filter(|e| e.is_live(now))
            .map(|e| into_text(key, e.value))
            .transpose()
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let extended = match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.expires_at = now + ttl;
                true
            }
            _ => false,
        };
        Ok(extended)
    }
}

/// Start a background task that periodically purges expired entries.
pub fn start_purge_task(cache: MemoryCache, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            cache.purge_expired();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_put_get() {
        let cache = MemoryCache::new();
        cache.put("a", "1", MINUTE).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(cache.get("b").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache.put("a", "1", Duration::from_secs(15)).await.unwrap();

        tokio::time::advance(Duration::from_secs(14)).await;
        assert!(cache.get("a").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("a").await.unwrap().is_none());
        assert!(cache.entries.get("a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_resets_ttl() {
        let cache = MemoryCache::new();
        cache
            .put_bytes("seg", Bytes::from_static(b"\x00\x01"), Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(cache.expire("seg", Duration::from_secs(10)).await.unwrap());

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(
            cache.get_bytes("seg").await.unwrap(),
            Some(Bytes::from_static(b"\x00\x01"))
        );

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(cache.get_bytes("seg").await.unwrap().is_none());
        assert!(!cache.expire("seg", MINUTE).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_returns_previous_live_value() {
        let cache = MemoryCache::new();
        assert_eq!(cache.replace("k", "one", MINUTE).await.unwrap(), None);
        assert_eq!(
            cache.replace("k", "two", MINUTE).await.unwrap().as_deref(),
            Some("one")
        );

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.replace("k", "three", MINUTE).await.unwrap(), None);
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("three"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_removes() {
        let cache = MemoryCache::new();
        cache.put("k", "v", MINUTE).await.unwrap();
        assert_eq!(cache.take("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.take("k").await.unwrap(), None);
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_many() {
        let cache = MemoryCache::new();
        cache.put("a", "1", MINUTE).await.unwrap();
        cache.put("b", "2", MINUTE).await.unwrap();
        cache.put("c", "3", MINUTE).await.unwrap();

        cache
            .delete_many(&["a".to_string(), "b".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_binary_as_text_requires_utf8() {
        let cache = MemoryCache::new();
        cache
            .put_bytes("bin", Bytes::from_static(&[0xff, 0xfe]), MINUTE)
            .await
            .unwrap();
        assert!(cache.get("bin").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.put("short", "1", Duration::from_secs(1)).await.unwrap();
        cache.put("long", "2", MINUTE).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_task() {
        let cache = MemoryCache::new();
        cache.put("short", "1", Duration::from_secs(1)).await.unwrap();

        let handle = start_purge_task(cache.clone(), Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(cache.entries.is_empty());
        handle.abort();
    }
}
