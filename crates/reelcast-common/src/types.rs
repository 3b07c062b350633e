//! Core type definitions for libraries, stream requests and stream state.
//!
//! [`StreamProps`] is created once per stream by the session manager and handed to
//! the job queue unchanged. [`StreamMetadata`] is written incrementally by the
//! transcode job into the segment store and only ever read by the core.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ids::{LibraryId, MediaId, StreamId};

/// Type of media library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    /// Episodic content organised into shows. Streamable.
    Show,
    /// A loose file library. Browsable but never transcoded.
    File,
}

impl LibraryKind {
    /// Whether items in this kind of library can be streamed over HLS.
    pub fn is_streamable(&self) -> bool {
        matches!(self, Self::Show)
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Show => write!(f, "show"),
            Self::File => write!(f, "file"),
        }
    }
}

impl FromStr for LibraryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "show" | "shows" => Ok(Self::Show),
            "file" | "files" => Ok(Self::File),
            other => Err(format!("unknown library kind: {}", other)),
        }
    }
}

/// Kind of elementary stream inside a media container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
    /// Attachments, data streams and anything else we do not transcode.
    Other,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A client's request to start watching a media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStreamRequest {
    pub library_id: LibraryId,
    pub media_id: MediaId,
    /// Where playback should begin, in seconds from the start of the file.
    #[serde(default)]
    pub start_offset_secs: f64,
    #[serde(default)]
    pub video_track: Option<u32>,
    #[serde(default)]
    pub audio_track: Option<u32>,
    #[serde(default)]
    pub subtitle_track: Option<u32>,
}

/// Resolved location of the media a stream transcodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    pub library_id: LibraryId,
    pub media_id: MediaId,
    pub file_path: PathBuf,
}

/// Immutable description of one transcode, created per `create_stream` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamProps {
    pub stream_id: StreamId,
    pub media: MediaReference,
    pub start_offset_secs: f64,
    pub video_track: Option<u32>,
    pub audio_track: Option<u32>,
    pub subtitle_track: Option<u32>,
    /// Total duration of the source media in seconds.
    pub duration_secs: f64,
}

impl StreamProps {
    /// Attach the client-facing master playlist URL.
    pub fn with_url(self, url: impl Into<String>) -> HlsStreamProps {
        HlsStreamProps {
            props: self,
            url: url.into(),
        }
    }
}

/// What a client receives after creating a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HlsStreamProps {
    #[serde(flatten)]
    pub props: StreamProps,
    /// URL of the master playlist for this stream.
    pub url: String,
}

/// One produced media segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub index: u32,
    pub duration_secs: f64,
}

/// Progress of a transcode, as written by the job into the segment store.
///
/// `segments` only grows and stays ascending by index. Once `complete` is set it
/// is never cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    #[serde(default)]
    pub segments: Vec<SegmentInfo>,
    #[serde(default)]
    pub processed_duration_secs: f64,
    #[serde(default)]
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_language: Option<String>,
    #[serde(default)]
    pub codecs: BTreeSet<String>,
    /// Segment whose bytes are being uploaded but which is not listed yet.
    ///
    /// Recorded before the upload so that cleanup always knows every key the
    /// job may have written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_segment: Option<u32>,
}

impl StreamMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether at least one segment has been produced.
    pub fn has_segments(&self) -> bool {
        !self.segments.is_empty()
    }

    /// Record a finished segment.
    ///
    /// Returns `false` and leaves the metadata untouched when the index does not
    /// extend the list, or when the stream is already complete.
    pub fn push_segment(&mut self, index: u32, duration_secs: f64) -> bool {
        if self.complete {
            return false;
        }
        if let Some(last) = self.segments.last() {
            if index <= last.index {
                return false;
            }
        }
        self.segments.push(SegmentInfo {
            index,
            duration_secs,
        });
        self.processed_duration_secs += duration_secs;
        true
    }

    /// Mark the transcode as finished.
    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Indices of every known segment, ascending.
    pub fn segment_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.segments.iter().map(|s| s.index)
    }

    /// Indices of every segment key the stream may own, including one still
    /// being uploaded.
    pub fn owned_segment_indices(&self) -> impl Iterator<Item = u32> + '_ {
        let pending = self
            .pending_segment
            .filter(|n| self.segments.last().map_or(true, |last| *n > last.index));
        self.segment_indices().chain(pending)
    }

    /// Whether a subtitle payload is attached.
    pub fn has_subtitles(&self) -> bool {
        self.subtitle_text.is_some()
    }
}

/// Result of a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// At least one segment is available.
    Ready,
    /// The stream exists but nothing has been produced yet.
    Pending,
    /// No metadata exists for the stream.
    Unknown,
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Pending => write!(f, "pending"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
