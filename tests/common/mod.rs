//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires an in-memory catalog, an in-memory
//! cache and a [`ScriptedQueue`] into a full [`AppContext`]. Requests go
//! through the real router with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use reelcast::cache::MemoryCache;
use reelcast::config::Config;
use reelcast::jobs::{JobEvent, JobEvents, JobHandle, JobQueue, JobSignal};
use reelcast::server::{create_router, AppContext};
use reelcast::streaming::{SegmentStore, SessionManager, StreamSettings};
use reelcast_common::{
    Error, JobId, LibraryId, LibraryKind, MediaId, Result, StreamId, StreamMetadata, StreamProps,
    TrackKind,
};
use reelcast_db::models::{MediaInfo, Track};
use reelcast_db::pool::{get_conn, init_memory_pool, DbPool};
use reelcast_db::queries::{episodes, libraries};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::broadcast;
use tower::ServiceExt;

/// Job queue that never transcodes. Records calls and can start or fail jobs on submit.
#[derive(Default)]
pub struct ScriptedQueue {
    submitted: Mutex<Vec<(JobId, StreamProps)>>,
    cancelled: Mutex<Vec<JobId>>,
    notified: Mutex<Vec<JobId>>,
    senders: Mutex<HashMap<JobId, broadcast::Sender<JobEvent>>>,
    start_immediately: bool,
    fail_immediately: bool,
}

impl ScriptedQueue {
    /// Queue whose jobs report `Started` right away.
    pub fn starting() -> Self {
        Self {
            start_immediately: true,
            ..Self::default()
        }
    }

    /// Queue whose jobs fail right away.
    pub fn failing() -> Self {
        Self {
            fail_immediately: true,
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> Vec<(JobId, StreamProps)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<JobId> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn notified(&self) -> Vec<JobId> {
        self.notified.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for ScriptedQueue {
    async fn submit(&self, props: StreamProps) -> Result<JobHandle> {
        let id = JobId::new();
        let (tx, rx) = broadcast::channel(8);
        if self.start_immediately {
            let _ = tx.send(JobEvent::Started);
        }
        if self.fail_immediately {
            let _ = tx.send(JobEvent::Failed("ffmpeg exited with 1".to_string()));
        }
        self.senders.lock().unwrap().insert(id, tx);
        self.submitted.lock().unwrap().push((id, props));
        Ok(JobHandle {
            id,
            events: JobEvents::new(rx),
        })
    }

    async fn cancel(&self, id: &JobId) -> Result<()> {
        self.cancelled.lock().unwrap().push(*id);
        Ok(())
    }

    async fn notify(&self, id: &JobId, signal: JobSignal) -> Result<()> {
        if !self.senders.lock().unwrap().contains_key(id) {
            return Err(Error::queue(format!("unknown job {} for {:?}", id, signal)));
        }
        self.notified.lock().unwrap().push(*id);
        Ok(())
    }
}

pub struct TestHarness {
    pub db: DbPool,
    pub cache: MemoryCache,
    pub queue: Arc<ScriptedQueue>,
    pub ctx: AppContext,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_queue(ScriptedQueue::default())
    }

    pub fn with_queue(queue: ScriptedQueue) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let cache = MemoryCache::new();
        let queue = Arc::new(queue);
        let config = Config::default();

        let manager = SessionManager::new(
            Arc::new(cache.clone()),
            queue.clone(),
            Arc::new(db.clone()),
            StreamSettings::from_config(&config),
        );

        let ctx = AppContext {
            config: Arc::new(config),
            manager: Arc::new(manager),
        };

        Self {
            db,
            cache,
            queue,
            ctx,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    pub fn store(&self) -> SegmentStore {
        SegmentStore::new(Arc::new(self.cache.clone()))
    }

    pub fn create_library(&self, kind: LibraryKind) -> LibraryId {
        let conn = get_conn(&self.db).unwrap();
        libraries::create_library(&conn, "Library", kind, &[]).unwrap().id
    }

    pub fn create_episode(&self, library_id: LibraryId) -> MediaId {
        let conn = get_conn(&self.db).unwrap();
        episodes::create_episode(
            &conn,
            library_id,
            "S01E01",
            "/media/shows/s01e01.mkv",
            &sample_info(),
        )
        .unwrap()
        .id
    }

    /// A show library with one episode.
    pub fn create_show(&self) -> (LibraryId, MediaId) {
        let library = self.create_library(LibraryKind::Show);
        let episode = self.create_episode(library);
        (library, episode)
    }

    /// Write what a transcode job produces after `segments` segments.
    pub async fn produce(&self, id: &StreamId, segments: &[(u32, f64)], complete: bool) {
        let store = self.store();
        let ttl = Duration::from_secs(3600);
        let mut metadata = StreamMetadata::new();
        metadata.codecs.insert("avc1.640028".to_string());
        metadata.codecs.insert("mp4a.40.2".to_string());

        store
            .put_init_segment(id, Bytes::from_static(b"ftypmoov"), ttl)
            .await
            .unwrap();
        for &(index, duration) in segments {
            store
                .put_segment(id, index, Bytes::from(format!("moof{}", index)), ttl)
                .await
                .unwrap();
            metadata.push_segment(index, duration);
        }
        if complete {
            metadata.mark_complete();
        }
        store.put_metadata(id, &metadata, ttl).await.unwrap();
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    /// POST /api/watch, optionally as an existing client session.
    pub async fn create_stream(&self, body: Value, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::post("/api/watch")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body.to_string())).unwrap())
            .await
    }
}

pub fn sample_info() -> MediaInfo {
    MediaInfo {
        container_duration: Some(1420.0),
        tracks: vec![
            Track {
                index: 0,
                kind: TrackKind::Video,
                codec: Some("h264".to_string()),
                language: None,
                duration: None,
            },
            Track {
                index: 1,
                kind: TrackKind::Audio,
                codec: Some("aac".to_string()),
                language: Some("jpn".to_string()),
                duration: None,
            },
        ],
    }
}

pub fn watch_body(library: LibraryId, media: MediaId) -> Value {
    json!({
        "library_id": library,
        "media_id": media,
    })
}

/// `name=value` of the session cookie set by a response, if any.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with("reelcast_session="))
        .map(str::to_string)
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
