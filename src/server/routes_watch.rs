//! Stream lifecycle routes.
//!
//! A client session is identified by the `reelcast_session` cookie. Clients
//! without one get a fresh session minted on their first create.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use reelcast_common::{
    ClientSessionId, CreateStreamRequest, Error, HlsStreamProps, StreamId, StreamStatus,
};
use serde::{Deserialize, Serialize};

use super::{AppContext, AppError};

/// Cookie holding the client session id.
pub const SESSION_COOKIE_NAME: &str = "reelcast_session";

pub fn watch_routes() -> Router<AppContext> {
    Router::new()
        .route("/watch", post(create_stream).delete(cancel_stream))
        .route("/watch/:stream_id/heartbeat", post(heartbeat))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateParams {
    /// Wait until the transcode job has started before responding.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub status: StreamStatus,
}

fn session_from(jar: &CookieJar) -> Option<ClientSessionId> {
    jar.get(SESSION_COOKIE_NAME)
        .map(|c| c.value())
        .filter(|v| !v.is_empty())
        .map(ClientSessionId::from)
}

fn session_cookie(session: &ClientSessionId) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, session.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub(crate) fn parse_stream_id(raw: &str) -> Result<StreamId, Error> {
    raw.parse()
        .map_err(|_| Error::bad_request(format!("invalid stream id: {}", raw)))
}

/// POST /api/watch
async fn create_stream(
    State(ctx): State<AppContext>,
    Query(params): Query<CreateParams>,
    jar: CookieJar,
    Json(request): Json<CreateStreamRequest>,
) -> Result<(CookieJar, Json<HlsStreamProps>), AppError> {
    let (session, jar) = match session_from(&jar) {
        Some(session) => (session, jar),
        None => {
            let session = ClientSessionId::generate();
            let jar = jar.add(session_cookie(&session));
            (session, jar)
        }
    };

    let props = if params.wait {
        ctx.manager.create_stream_and_wait(request, &session).await?
    } else {
        ctx.manager.create_stream(request, &session).await?
    };

    Ok((jar, Json(props)))
}

/// DELETE /api/watch
async fn cancel_stream(
    State(ctx): State<AppContext>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(session) = session_from(&jar) {
        ctx.manager.cancel_stream(&session).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/watch/:stream_id/heartbeat
async fn heartbeat(
    State(ctx): State<AppContext>,
    Path(stream_id): Path<String>,
) -> Result<Json<HeartbeatResponse>, AppError> {
    let stream_id = parse_stream_id(&stream_id)?;
    let status = ctx.manager.heartbeat(&stream_id).await?;
    Ok(Json(HeartbeatResponse { status }))
}
