//! Reelcast-Media: HLS manifest generation
//!
//! Turns the [`StreamMetadata`](reelcast_common::StreamMetadata) written by a
//! transcode job into the playlists an HLS player needs:
//!
//! - the master (index) playlist with one variant and an optional subtitle rendition
//! - the media playlist listing every produced fMP4 segment
//! - the subtitle playlist pointing at a single WebVTT resource
//!
//! Every function here is pure: equal metadata renders byte-identical text.
//! All URIs are relative to the master playlist, so a stream's manifests and
//! segments must be served from the same directory-like prefix.

pub mod hls;

pub use hls::{master_playlist, media_playlist, subtitle_playlist};
pub use hls::{MasterPlaylist, MediaPlaylist, SubtitlePlaylist};
