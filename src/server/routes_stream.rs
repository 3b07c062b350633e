//! HLS asset routes.
//!
//! - `GET /api/stream/:stream_id/index.m3u8` - master playlist
//! - `GET /api/stream/:stream_id/stream.m3u8` - media playlist
//! - `GET /api/stream/:stream_id/subtitles.m3u8` - subtitle playlist
//! - `GET /api/stream/:stream_id/subtitles.vtt` - WebVTT subtitles
//! - `GET /api/stream/:stream_id/init-stream.mp4` - fMP4 init segment
//! - `GET /api/stream/:stream_id/:n.m4s` - media segment `n`

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use reelcast_common::Error;
use reelcast_media::hls;

use super::routes_watch::parse_stream_id;
use super::{AppContext, AppError};

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp4";
pub const SUBTITLE_CONTENT_TYPE: &str = "text/vtt; charset=utf-8";

pub fn stream_routes() -> Router<AppContext> {
    Router::new().route("/stream/:stream_id/:resource", get(stream_resource))
}

fn playlist(body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// GET /api/stream/:stream_id/:resource
async fn stream_resource(
    State(ctx): State<AppContext>,
    Path((stream_id, resource)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let stream_id = parse_stream_id(&stream_id)?;
    let manager = &ctx.manager;

    let response = match resource.as_str() {
        hls::MASTER_PLAYLIST => playlist(manager.master_playlist(&stream_id).await?),
        hls::MEDIA_PLAYLIST => playlist(manager.media_playlist(&stream_id).await?),
        hls::SUBTITLE_PLAYLIST => playlist(manager.subtitle_playlist(&stream_id).await?),
        hls::SUBTITLE_TRACK => (
            [
                (header::CONTENT_TYPE, SUBTITLE_CONTENT_TYPE),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            manager.subtitle_track(&stream_id).await?,
        )
            .into_response(),
        hls::INIT_SEGMENT => (
            [(header::CONTENT_TYPE, SEGMENT_CONTENT_TYPE)],
            manager.init_segment(&stream_id).await?,
        )
            .into_response(),
        other => {
            let index = other
                .strip_suffix(".m4s")
                .and_then(hls::parse_segment_uri)
                .ok_or_else(|| Error::not_found(format!("resource {}", other)))?;
            (
                [(header::CONTENT_TYPE, SEGMENT_CONTENT_TYPE)],
                manager.segment(&stream_id, index).await?,
            )
                .into_response()
        }
    };

    Ok(response)
}
