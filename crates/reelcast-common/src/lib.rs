//! Reelcast-Common: Shared types, IDs, and utilities.
//!
//! This crate provides functionality used across the reelcast workspace:
//!
//! - **Typed IDs**: Type-safe wrappers for streams, jobs, libraries, media and client sessions
//! - **Stream Types**: `StreamProps` and `StreamMetadata`, the shapes exchanged between the
//!   session manager, the job queue and the segment store
//! - **Path Utilities**: Functions to detect video files by extension
//! - **Error Handling**: Common error type and result alias
//!
//! # Examples
//!
//! ```
//! use reelcast_common::{Error, LibraryKind, Result, StreamId};
//!
//! let stream_id = StreamId::new();
//! assert!(LibraryKind::Show.is_streamable());
//!
//! fn lookup(id: StreamId) -> Result<()> {
//!     Err(Error::not_found(format!("stream {id}")))
//! }
//! assert!(lookup(stream_id).is_err());
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
