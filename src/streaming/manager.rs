//! Stream lifecycle orchestration.
//!
//! [`SessionManager`] turns "play this episode" into a running transcode job,
//! serves the job's output as HLS, and tears it down on cancel. It holds no
//! session table of its own: every piece of state lives in the cache behind
//! [`SessionIndex`] and [`SegmentStore`], so each operation is a short sequence
//! of atomic single-key calls that tolerates missing entries.
//!
//! A stream moves through `NONE -> PENDING -> ACTIVE` and ends `COMPLETE`,
//! `CANCELED` or `EXPIRED`. Only cancel deletes anything. Everything else is
//! reclaimed by TTL expiry once heartbeats stop.

use bytes::Bytes;
use reelcast_common::{
    ClientSessionId, CreateStreamRequest, Error, HlsStreamProps, MediaReference, Result,
    StreamId, StreamMetadata, StreamProps, StreamStatus, TrackKind,
};
use reelcast_db::models::MediaInfo;
use reelcast_media::hls::{self, DEFAULT_BANDWIDTH, DEFAULT_TARGET_DURATION};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::catalog::MediaCatalog;
use super::index::SessionIndex;
use super::store::{init_key, metadata_key, segment_key, SegmentStore};
use crate::cache::Cache;
use crate::config::Config;
use crate::jobs::{JobEvents, JobQueue, JobSignal};

/// Timing and playlist parameters for the session manager.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Lifetime of session index entries.
    pub index_ttl: Duration,
    /// How long a heartbeat keeps a stream's entries alive.
    pub heartbeat_ttl: Duration,
    /// How long a successful read keeps the entry it read alive.
    pub read_ttl: Duration,
    /// Bound on [`SessionManager::create_stream_and_wait`].
    pub ready_timeout: Duration,
    /// Bandwidth advertised in the master playlist.
    pub bandwidth: u64,
    /// Nominal segment length, advertised as the target duration.
    pub target_duration: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            index_ttl: Duration::from_secs(86_400),
            heartbeat_ttl: Duration::from_secs(15),
            read_ttl: Duration::from_secs(3_600),
            ready_timeout: Duration::from_secs(5),
            bandwidth: DEFAULT_BANDWIDTH,
            target_duration: DEFAULT_TARGET_DURATION,
        }
    }
}

impl StreamSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            index_ttl: config.stream.index_ttl(),
            heartbeat_ttl: config.stream.heartbeat_ttl(),
            read_ttl: config.stream.read_ttl(),
            ready_timeout: config.stream.ready_timeout(),
            bandwidth: config.stream.bandwidth,
            target_duration: config.transcoder.segment_secs,
        }
    }
}

/// Client-facing URL of a stream's master playlist.
pub fn stream_url(id: &StreamId) -> String {
    format!("/api/stream/{}/{}", id, hls::MASTER_PLAYLIST)
}

/// Orchestrates stream creation, cancellation, heartbeats and reads.
#[derive(Clone)]
pub struct SessionManager {
    index: SessionIndex,
    store: SegmentStore,
    queue: Arc<dyn JobQueue>,
    catalog: Arc<dyn MediaCatalog>,
    settings: StreamSettings,
}

impl SessionManager {
    pub fn new(
        cache: Arc<dyn Cache>,
        queue: Arc<dyn JobQueue>,
        catalog: Arc<dyn MediaCatalog>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            index: SessionIndex::new(Arc::clone(&cache), settings.index_ttl),
            store: SegmentStore::new(cache),
            queue,
            catalog,
            settings,
        }
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Start a stream for `client`, replacing any stream it already has.
    ///
    /// Returns as soon as the job queue accepts the transcode.
    pub async fn create_stream(
        &self,
        request: CreateStreamRequest,
        client: &ClientSessionId,
    ) -> Result<HlsStreamProps> {
        let (props, _events) = self.start_stream(request, client).await?;
        Ok(props)
    }

    /// Like [`create_stream`](Self::create_stream), but also wait until the
    /// job reports that it started.
    ///
    /// Times out with `UpstreamTimeout` after the configured ready timeout.
    /// The job is left running in that case.
    pub async fn create_stream_and_wait(
        &self,
        request: CreateStreamRequest,
        client: &ClientSessionId,
    ) -> Result<HlsStreamProps> {
        let (props, events) = self.start_stream(request, client).await?;
        events
            .wait_until_started(self.settings.ready_timeout)
            .await
            .map_err(|e| {
                warn!(stream_id = %props.props.stream_id, error = %e, "Stream did not become ready");
                e
            })?;
        Ok(props)
    }

    async fn start_stream(
        &self,
        request: CreateStreamRequest,
        client: &ClientSessionId,
    ) -> Result<(HlsStreamProps, JobEvents)> {
        let props = self.resolve(&request).await?;
        let stream_id = props.stream_id;

        if let Some(previous) = self.index.swap_client_stream(client, &stream_id).await? {
            if previous != stream_id {
                info!(client = %client, stream_id = %previous, "Superseding previous stream");
                self.destroy_stream(&previous).await?;
            }
        }

        let handle = match self.queue.submit(props.clone()).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(stream_id = %stream_id, error = %e, "Job submission failed");
                if let Err(cleanup) = self.index.remove_client_stream_if(client, &stream_id).await {
                    warn!(stream_id = %stream_id, error = %cleanup, "Failed to clear client entry");
                }
                return Err(e);
            }
        };
        self.index.set_job(&stream_id, &handle.id).await?;

        // A concurrent create for the same client may have swapped us out before
        // our job id was recorded, in which case it could not cancel the job.
        if self.index.client_stream(client).await? != Some(stream_id) {
            info!(client = %client, stream_id = %stream_id, "Stream superseded while starting");
            self.destroy_stream(&stream_id).await?;
        }

        info!(
            client = %client,
            stream_id = %stream_id,
            job_id = %handle.id,
            media_id = %props.media.media_id,
            "Created stream"
        );

        let url = stream_url(&stream_id);
        Ok((props.with_url(url), handle.events))
    }

    /// Validate the request against the catalog and build the stream's props.
    async fn resolve(&self, request: &CreateStreamRequest) -> Result<StreamProps> {
        let library = self
            .catalog
            .get_library(request.library_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("library {}", request.library_id)))?;

        if !library.kind.is_streamable() {
            return Err(Error::unsupported_library(format!(
                "library {} is a {} library",
                library.id, library.kind
            )));
        }

        let episode = self
            .catalog
            .get_episode(request.media_id)
            .await?
            .filter(|e| e.library_id == library.id)
            .ok_or_else(|| Error::not_found(format!("media {}", request.media_id)))?;

        let duration_secs = episode.info.duration_secs().ok_or_else(|| {
            Error::bad_request(format!("media {} has no known duration", episode.id))
        })?;

        let offset = request.start_offset_secs;
        if !offset.is_finite() || offset < 0.0 || offset >= duration_secs {
            return Err(Error::bad_request(format!(
                "start offset {} is outside 0..{}",
                offset, duration_secs
            )));
        }

        check_track(&episode.info, request.video_track, TrackKind::Video)?;
        check_track(&episode.info, request.audio_track, TrackKind::Audio)?;
        check_track(&episode.info, request.subtitle_track, TrackKind::Subtitle)?;

        Ok(StreamProps {
            stream_id: StreamId::new(),
            media: MediaReference {
                library_id: library.id,
                media_id: episode.id,
                file_path: PathBuf::from(episode.file_path),
            },
            start_offset_secs: offset,
            video_track: request.video_track,
            audio_track: request.audio_track,
            subtitle_track: request.subtitle_track,
            duration_secs,
        })
    }

    /// Tear down the client's stream. A client without a stream is a no-op.
    pub async fn cancel_stream(&self, client: &ClientSessionId) -> Result<()> {
        match self.index.take_client_stream(client).await? {
            Some(stream_id) => {
                info!(client = %client, stream_id = %stream_id, "Cancelling stream");
                self.destroy_stream(&stream_id).await
            }
            None => {
                debug!(client = %client, "No stream to cancel");
                Ok(())
            }
        }
    }

    /// Stop a stream's job, then delete its output.
    async fn destroy_stream(&self, stream_id: &StreamId) -> Result<()> {
        if let Some(job_id) = self.index.take_job(stream_id).await? {
            if let Err(e) = self.queue.cancel(&job_id).await {
                warn!(stream_id = %stream_id, job_id = %job_id, error = %e, "Failed to cancel job");
            }
        }

        let metadata = match self.store.metadata(stream_id).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(stream_id = %stream_id, error = %e, "Unreadable metadata, deleting known keys only");
                None
            }
        };
        self.store.delete_stream(stream_id, metadata.as_ref()).await
    }

    /// Keep a stream alive for another heartbeat window.
    pub async fn heartbeat(&self, stream_id: &StreamId) -> Result<StreamStatus> {
        match self.index.job(stream_id).await {
            Ok(Some(job_id)) => {
                if let Err(e) = self.queue.notify(&job_id, JobSignal::Heartbeat).await {
                    warn!(stream_id = %stream_id, job_id = %job_id, error = %e, "Failed to forward heartbeat");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(stream_id = %stream_id, error = %e, "Failed to look up job"),
        }

        let Some(metadata) = self.store.metadata(stream_id).await? else {
            debug!(stream_id = %stream_id, "Heartbeat for unknown stream");
            return Ok(StreamStatus::Unknown);
        };

        if let Err(e) = self
            .store
            .extend(stream_id, &metadata, self.settings.heartbeat_ttl)
            .await
        {
            warn!(stream_id = %stream_id, error = %e, "Failed to extend stream entries");
        }

        Ok(if metadata.has_segments() {
            StreamStatus::Ready
        } else {
            StreamStatus::Pending
        })
    }

    /// Stream currently owned by `client`, if any.
    pub async fn client_stream(&self, client: &ClientSessionId) -> Result<Option<StreamId>> {
        self.index.client_stream(client).await
    }

    /// Reset a read entry's expiry. Failures are logged only.
    async fn keep_alive(&self, stream_id: &StreamId, key: &str) {
        if let Err(e) = self.store.touch(key, self.settings.read_ttl).await {
            warn!(stream_id = %stream_id, key = %key, error = %e, "Failed to extend read entry");
        }
    }

    async fn read_metadata(&self, stream_id: &StreamId) -> Result<StreamMetadata> {
        let metadata = self
            .store
            .metadata(stream_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("stream {}", stream_id)))?;
        self.keep_alive(stream_id, &metadata_key(stream_id)).await;
        Ok(metadata)
    }

    pub async fn master_playlist(&self, stream_id: &StreamId) -> Result<String> {
        let metadata = self.read_metadata(stream_id).await?;
        Ok(hls::master_playlist(&metadata, self.settings.bandwidth))
    }

    pub async fn media_playlist(&self, stream_id: &StreamId) -> Result<String> {
        let metadata = self.read_metadata(stream_id).await?;
        Ok(hls::media_playlist(&metadata, self.settings.target_duration))
    }

    pub async fn subtitle_playlist(&self, stream_id: &StreamId) -> Result<String> {
        let metadata = self.read_metadata(stream_id).await?;
        if !metadata.has_subtitles() {
            return Err(Error::not_found(format!("subtitles for stream {}", stream_id)));
        }
        Ok(hls::subtitle_playlist(&metadata))
    }

    /// The stream's WebVTT subtitle text.
    pub async fn subtitle_track(&self, stream_id: &StreamId) -> Result<String> {
        self.read_metadata(stream_id)
            .await?
            .subtitle_text
            .ok_or_else(|| Error::not_found(format!("subtitles for stream {}", stream_id)))
    }

    pub async fn init_segment(&self, stream_id: &StreamId) -> Result<Bytes> {
        let data = self
            .store
            .init_segment(stream_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("init segment of stream {}", stream_id)))?;
        self.keep_alive(stream_id, &init_key(stream_id)).await;
        Ok(data)
    }

    pub async fn segment(&self, stream_id: &StreamId, index: u32) -> Result<Bytes> {
        let data = self
            .store
            .segment(stream_id, index)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!("segment {} of stream {}", index, stream_id))
            })?;
        self.keep_alive(stream_id, &segment_key(stream_id, index)).await;
        Ok(data)
    }
}

/// A selected track must exist and be of the expected kind.
fn check_track(info: &MediaInfo, selected: Option<u32>, kind: TrackKind) -> Result<()> {
    let Some(index) = selected else {
        return Ok(());
    };
    match info.track(index) {
        Some(track) if track.kind == kind => Ok(()),
        Some(track) => Err(Error::bad_request(format!(
            "track {} is a {} track, not {}",
            index, track.kind, kind
        ))),
        None => Err(Error::bad_request(format!("no track {}", index))),
    }
}
