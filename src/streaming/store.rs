//! Typed access to a stream's transcoded output in the cache.
//!
//! Key scheme, per stream:
//!
//! - `Stream:{id}:Metadata` - JSON [`StreamMetadata`]
//! - `Stream:{id}:Init` - fMP4 init segment
//! - `Stream:{id}:Segment:{n}` - media segment `n`

use bytes::Bytes;
use futures::future::join_all;
use reelcast_common::{Result, StreamId, StreamMetadata};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;

pub fn metadata_key(id: &StreamId) -> String {
    format!("Stream:{}:Metadata", id)
}

pub fn init_key(id: &StreamId) -> String {
    format!("Stream:{}:Init", id)
}

pub fn segment_key(id: &StreamId, index: u32) -> String {
    format!("Stream:{}:Segment:{}", id, index)
}

/// Every key a stream owns according to `metadata`, metadata key last.
fn stream_keys(id: &StreamId, metadata: Option<&StreamMetadata>) -> Vec<String> {
    let mut keys: Vec<String> = metadata
        .into_iter()
        .flat_map(|m| m.owned_segment_indices())
        .map(|n| segment_key(id, n))
        .collect();
    keys.push(init_key(id));
    keys.push(metadata_key(id));
    keys
}

/// Segment store shared by the session manager (reads) and transcode jobs
/// (writes).
#[derive(Clone)]
pub struct SegmentStore {
    cache: Arc<dyn Cache>,
}

impl SegmentStore {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    pub async fn metadata(&self, id: &StreamId) -> Result<Option<StreamMetadata>> {
        match self.cache.get(&metadata_key(id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn put_metadata(
        &self,
        id: &StreamId,
        metadata: &StreamMetadata,
        ttl: Duration,
    ) -> Result<()> {
        let json = serde_json::to_string(metadata)?;
        self.cache.put(&metadata_key(id), &json, ttl).await
    }

    pub async fn init_segment(&self, id: &StreamId) -> Result<Option<Bytes>> {
        self.cache.get_bytes(&init_key(id)).await
    }

    pub async fn put_init_segment(&self, id: &StreamId, data: Bytes, ttl: Duration) -> Result<()> {
        self.cache.put_bytes(&init_key(id), data, ttl).await
    }

    pub async fn segment(&self, id: &StreamId, index: u32) -> Result<Option<Bytes>> {
        self.cache.get_bytes(&segment_key(id, index)).await
    }

    pub async fn put_segment(
        &self,
        id: &StreamId,
        index: u32,
        data: Bytes,
        ttl: Duration,
    ) -> Result<()> {
        self.cache.put_bytes(&segment_key(id, index), data, ttl).await
    }

    /// Reset the expiry of a single key. Returns `false` if it was absent.
    pub async fn touch(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.cache.expire(key, ttl).await
    }

    /// Reset the expiry of the metadata, the init segment and every segment
    /// listed in `metadata`.
    ///
    /// Every key is attempted even if some fail; the first failure is returned.
    pub async fn extend(&self, id: &StreamId, metadata: &StreamMetadata, ttl: Duration) -> Result<()> {
        let keys = stream_keys(id, Some(metadata));
        let results = join_all(keys.iter().map(|key| self.cache.expire(key, ttl))).await;

        let mut missing = 0usize;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(true) => {}
                Ok(false) => missing += 1,
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if missing > 0 {
            tracing::debug!(stream_id = %id, missing = missing, "Some stream entries already expired");
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Delete everything a stream owns: each segment listed in `metadata`, the
    /// init segment and the metadata itself.
    pub async fn delete_stream(&self, id: &StreamId, metadata: Option<&StreamMetadata>) -> Result<()> {
        let keys = stream_keys(id, metadata);
        tracing::debug!(stream_id = %id, keys = keys.len(), "Deleting stream entries");
        self.cache.delete_many(&keys).await
    }
}
