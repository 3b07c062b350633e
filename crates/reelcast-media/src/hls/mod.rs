//! HLS playlist generation.
//!
//! This module generates M3U8 playlists for HLS streaming, plus the relative
//! resource names those playlists reference.

mod playlist;

pub use playlist::{
    master_playlist, media_playlist, subtitle_playlist, MasterPlaylist, MediaPlaylist,
    PlaylistType, SegmentEntry, StreamInfo, SubtitlePlaylist, SubtitleRendition,
};

/// Master playlist resource name.
pub const MASTER_PLAYLIST: &str = "index.m3u8";
/// Media playlist resource name.
pub const MEDIA_PLAYLIST: &str = "stream.m3u8";
/// Subtitle playlist resource name.
pub const SUBTITLE_PLAYLIST: &str = "subtitles.m3u8";
/// WebVTT subtitle resource name.
pub const SUBTITLE_TRACK: &str = "subtitles.vtt";
/// fMP4 initialization segment resource name.
pub const INIT_SEGMENT: &str = "init-stream.mp4";
/// Extension of media segments.
pub const SEGMENT_EXTENSION: &str = "m4s";

/// Group id shared by the subtitle rendition and the variant referencing it.
pub const SUBTITLE_GROUP: &str = "subs";

/// Nominal segment length produced by the transcoder, in seconds.
pub const DEFAULT_TARGET_DURATION: u32 = 5;

/// Bandwidth advertised in the master playlist when none is configured.
pub const DEFAULT_BANDWIDTH: u64 = 5_000_000;

/// Resource name of the segment with the given index.
pub fn segment_uri(index: u32) -> String {
    format!("{}.{}", index, SEGMENT_EXTENSION)
}

/// Parse a segment resource name (`"12.m4s"` or bare `"12"`) back to its index.
pub fn parse_segment_uri(name: &str) -> Option<u32> {
    let stem = name
        .strip_suffix(SEGMENT_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(name);
    stem.parse().ok()
}
