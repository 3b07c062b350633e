//! Cache-backed session index.
//!
//! Two independent indirections, each its own cache entry:
//!
//! - `ClientId:{client}:StreamId` - the one live stream of a client session
//! - `StreamId:{stream}:JobId` - the job producing a stream
//!
//! There is no in-process map. Absence of an entry means "no active job" and is
//! never an error. Values that fail to parse are treated as absent.

use reelcast_common::{ClientSessionId, JobId, Result, StreamId};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;

pub fn client_key(client: &ClientSessionId) -> String {
    format!("ClientId:{}:StreamId", client)
}

pub fn job_key(stream: &StreamId) -> String {
    format!("StreamId:{}:JobId", stream)
}

fn parse_entry<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!(key = %key, value = %value, "Ignoring malformed session index entry");
            None
        }
    }
}

#[derive(Clone)]
pub struct SessionIndex {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl SessionIndex {
    /// Index whose entries expire after `ttl` unless rewritten.
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Point `client` at `stream` and return the stream it pointed at before.
    ///
    /// This is a single atomic swap, so two concurrent swaps for one client
    /// each see a distinct previous value and no stream is lost track of.
    pub async fn swap_client_stream(
        &self,
        client: &ClientSessionId,
        stream: &StreamId,
    ) -> Result<Option<StreamId>> {
        let key = client_key(client);
        let previous = self
            .cache
            .replace(&key, &stream.to_string(), self.ttl)
            .await?;
        Ok(parse_entry(&key, previous))
    }

    pub async fn client_stream(&self, client: &ClientSessionId) -> Result<Option<StreamId>> {
        let key = client_key(client);
        let value = self.cache.get(&key).await?;
        Ok(parse_entry(&key, value))
    }

    /// Remove and return the client's stream.
    pub async fn take_client_stream(&self, client: &ClientSessionId) -> Result<Option<StreamId>> {
        let key = client_key(client);
        let value = self.cache.take(&key).await?;
        Ok(parse_entry(&key, value))
    }

    /// Remove the client entry if it still points at `stream`.
    ///
    /// The read and the delete are separate cache calls; a swap landing in
    /// between can be lost.
    pub async fn remove_client_stream_if(
        &self,
        client: &ClientSessionId,
        stream: &StreamId,
    ) -> Result<bool> {
        if self.client_stream(client).await? == Some(*stream) {
            self.cache.delete(&client_key(client)).await?;
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn set_job(&self, stream: &StreamId, job: &JobId) -> Result<()> {
        self.cache
            .put(&job_key(stream), &job.to_string(), self.ttl)
            .await
    }

    pub async fn job(&self, stream: &StreamId) -> Result<Option<JobId>> {
        let key = job_key(stream);
        let value = self.cache.get(&key).await?;
        Ok(parse_entry(&key, value))
    }

    /// Remove and return the stream's job.
    pub async fn take_job(&self, stream: &StreamId) -> Result<Option<JobId>> {
        let key = job_key(stream);
        let value = self.cache.take(&key).await?;
        Ok(parse_entry(&key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    const DAY: Duration = Duration::from_secs(86_400);

    fn index() -> (MemoryCache, SessionIndex) {
        let cache = MemoryCache::new();
        let index = SessionIndex::new(Arc::new(cache.clone()), DAY);
        (cache, index)
    }

    #[test]
    fn test_keys() {
        let client = ClientSessionId::new("abc123");
        assert_eq!(client_key(&client), "ClientId:abc123:StreamId");

        let stream: StreamId = "0d3c5a62-1f7e-4c55-8f0c-6a8d2b7e9f10".parse().unwrap();
        assert_eq!(
            job_key(&stream),
            "StreamId:0d3c5a62-1f7e-4c55-8f0c-6a8d2b7e9f10:JobId"
        );
    }

    #[tokio::test]
    async fn test_swap_returns_previous_stream() {
        let (_, index) = index();
        let client = ClientSessionId::generate();
        let first = StreamId::new();
        let second = StreamId::new();

        assert_eq!(index.swap_client_stream(&client, &first).await.unwrap(), None);
        assert_eq!(
            index.swap_client_stream(&client, &second).await.unwrap(),
            Some(first)
        );
        assert_eq!(index.client_stream(&client).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_take_client_stream() {
        let (_, index) = index();
        let client = ClientSessionId::generate();
        let stream = StreamId::new();

        index.swap_client_stream(&client, &stream).await.unwrap();
        assert_eq!(index.take_client_stream(&client).await.unwrap(), Some(stream));
        assert_eq!(index.take_client_stream(&client).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_client_stream_if_only_matching() {
        let (_, index) = index();
        let client = ClientSessionId::generate();
        let stream = StreamId::new();
        let newer = StreamId::new();

        index.swap_client_stream(&client, &newer).await.unwrap();
        assert!(!index.remove_client_stream_if(&client, &stream).await.unwrap());
        assert_eq!(index.client_stream(&client).await.unwrap(), Some(newer));

        assert!(index.remove_client_stream_if(&client, &newer).await.unwrap());
        assert_eq!(index.client_stream(&client).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_job_entries() {
        let (_, index) = index();
        let stream = StreamId::new();
        let job = JobId::new();

        assert_eq!(index.job(&stream).await.unwrap(), None);
        index.set_job(&stream, &job).await.unwrap();
        assert_eq!(index.job(&stream).await.unwrap(), Some(job));
        assert_eq!(index.take_job(&stream).await.unwrap(), Some(job));
        assert_eq!(index.job(&stream).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_entry_is_absent() {
        let (cache, index) = index();
        let client = ClientSessionId::generate();
        cache.put(&client_key(&client), "garbage", DAY).await.unwrap();

        assert_eq!(index.client_stream(&client).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let (_, index) = index();
        let client = ClientSessionId::generate();
        index
            .swap_client_stream(&client, &StreamId::new())
            .await
            .unwrap();

        tokio::time::advance(DAY + Duration::from_secs(1)).await;
        assert_eq!(index.client_stream(&client).await.unwrap(), None);
    }
}
