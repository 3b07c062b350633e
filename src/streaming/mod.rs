//! Streaming session lifecycle.
//!
//! - [`SessionIndex`]: `client -> stream` and `stream -> job` entries in the cache
//! - [`SegmentStore`]: a stream's metadata, init segment and media segments
//! - [`SessionManager`]: create, cancel, heartbeat and read accessors
//!
//! Playlist text comes from `reelcast_media::hls`.

mod catalog;
mod index;
mod manager;
mod store;

pub use catalog::MediaCatalog;
pub use index::SessionIndex;
pub use manager::{stream_url, SessionManager, StreamSettings};
pub use store::SegmentStore;
