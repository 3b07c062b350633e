//! Common error types used throughout reelcast.
//!
//! Read paths collapse every flavour of absence ("never existed", "canceled",
//! "expired") into [`Error::NotFound`]. Callers that need more have to infer
//! state by polling.

/// Common error type for reelcast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested stream, segment, library or media item was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The library holding the requested media cannot be streamed.
    #[error("Unsupported library kind: {0}")]
    UnsupportedLibraryKind(String),

    /// A required identifier was missing or malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The transcode job did not report readiness in time. The job keeps running.
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// The transcode job reported failure.
    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    /// A cache operation failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// A job queue operation failed.
    #[error("Job queue error: {0}")]
    Queue(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new UnsupportedLibraryKind error.
    pub fn unsupported_library<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedLibraryKind(msg.into())
    }

    /// Create a new BadRequest error.
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create a new UpstreamTimeout error.
    pub fn upstream_timeout<S: Into<String>>(msg: S) -> Self {
        Self::UpstreamTimeout(msg.into())
    }

    /// Create a new UpstreamFailure error.
    pub fn upstream_failure<S: Into<String>>(msg: S) -> Self {
        Self::UpstreamFailure(msg.into())
    }

    /// Create a new Cache error.
    pub fn cache<S: Into<String>>(msg: S) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a new Queue error.
    pub fn queue<S: Into<String>>(msg: S) -> Self {
        Self::Queue(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error means "absent" to a caller.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {}", err))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("stream abc");
        assert_eq!(err.to_string(), "Not found: stream abc");

        let err = Error::unsupported_library("file");
        assert_eq!(err.to_string(), "Unsupported library kind: file");

        let err = Error::bad_request("missing stream id");
        assert_eq!(err.to_string(), "Bad request: missing stream id");

        let err = Error::upstream_timeout("job did not start");
        assert_eq!(err.to_string(), "Upstream timeout: job did not start");

        let err = Error::upstream_failure("ffmpeg exited");
        assert_eq!(err.to_string(), "Upstream failure: ffmpeg exited");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(Error::from(json_err), Error::Internal(_)));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::not_found("x").is_not_found());
        assert!(!Error::cache("x").is_not_found());
    }
}
