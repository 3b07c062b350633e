//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>` and use `?` on anything producing a
//! [`reelcast_common::Error`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reelcast_common::Error;
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

/// HTTP status for an error.
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::UnsupportedLibraryKind(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
        Error::Cache(_)
        | Error::Queue(_)
        | Error::Database(_)
        | Error::Io(_)
        | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn code_for(error: &Error) -> &'static str {
    match error {
        Error::NotFound(_) => "not_found",
        Error::BadRequest(_) => "bad_request",
        Error::UnsupportedLibraryKind(_) => "unsupported_library_kind",
        Error::UpstreamTimeout(_) => "upstream_timeout",
        Error::UpstreamFailure(_) => "upstream_failure",
        Error::Cache(_) => "cache_error",
        Error::Queue(_) => "queue_error",
        Error::Database(_) => "database_error",
        Error::Io(_) => "io_error",
        Error::Internal(_) => "internal_error",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Server error in API handler");
        }

        let body = json!({
            "error": self.0.to_string(),
            "code": code_for(&self.0),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let response = AppError(Error::not_found("stream abc")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unsupported_library_produces_422() {
        let response = AppError(Error::unsupported_library("file")).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn upstream_errors() {
        assert_eq!(
            status_for(&Error::upstream_timeout("slow")),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&Error::upstream_failure("ffmpeg exited")),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_errors_produce_500() {
        for error in [
            Error::cache("down"),
            Error::queue("full"),
            Error::database("locked"),
            Error::internal("oops"),
        ] {
            assert_eq!(status_for(&error), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
