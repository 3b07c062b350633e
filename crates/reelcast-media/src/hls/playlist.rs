//! HLS playlist structures.

use std::fmt::{self, Write};

use reelcast_common::StreamMetadata;

use super::{
    segment_uri, INIT_SEGMENT, MEDIA_PLAYLIST, SUBTITLE_GROUP, SUBTITLE_PLAYLIST, SUBTITLE_TRACK,
};

/// Language tag used when a subtitle track does not declare one.
const UNDETERMINED_LANGUAGE: &str = "und";

/// Durations are written as plain decimals at full precision, keeping at
/// least one decimal. HLS has no exponent notation.
struct Duration(f64);

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.0.to_string();
        if self.0.is_finite() && !text.contains('.') {
            write!(f, "{}.0", text)
        } else {
            f.write_str(&text)
        }
    }
}

/// Render the master (index) playlist for a stream.
pub fn master_playlist(metadata: &StreamMetadata, bandwidth: u64) -> String {
    MasterPlaylist::from_metadata(metadata, bandwidth).render()
}

/// Render the media playlist for a stream.
pub fn media_playlist(metadata: &StreamMetadata, target_duration: u32) -> String {
    MediaPlaylist::from_metadata(metadata, target_duration).render()
}

/// Render the subtitle playlist for a stream.
pub fn subtitle_playlist(metadata: &StreamMetadata) -> String {
    SubtitlePlaylist::from_metadata(metadata).render()
}

/// Media playlist for a single rendition.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    /// Target duration in seconds.
    pub target_duration: u32,
    /// Media sequence number.
    pub media_sequence: u32,
    pub playlist_type: PlaylistType,
    /// Init segment URI.
    pub init_uri: Option<String>,
    pub segments: Vec<SegmentEntry>,
    /// Whether the playlist carries an end marker.
    pub ended: bool,
}

impl MediaPlaylist {
    /// Create an empty, still-growing playlist.
    pub fn event(target_duration: u32) -> Self {
        Self {
            target_duration,
            media_sequence: 0,
            playlist_type: PlaylistType::Event,
            init_uri: None,
            segments: Vec::new(),
            ended: false,
        }
    }

    /// Build the playlist for the segments produced so far.
    ///
    /// Segments are emitted in ascending index order even if the metadata lists
    /// them otherwise. The end marker is present only once the job completed.
    pub fn from_metadata(metadata: &StreamMetadata, target_duration: u32) -> Self {
        let mut playlist = Self::event(target_duration);
        playlist.init_uri = Some(INIT_SEGMENT.to_string());
        playlist.ended = metadata.complete;

        let mut segments = metadata.segments.clone();
        segments.sort_by_key(|s| s.index);
        playlist.segments = segments
            .into_iter()
            .map(|s| SegmentEntry {
                duration: s.duration_secs,
                uri: segment_uri(s.index),
            })
            .collect();

        playlist
    }

    /// Render to M3U8 string.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MediaPlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#EXTM3U")?;
        writeln!(f, "#EXT-X-VERSION:7")?;
        writeln!(f, "#EXT-X-TARGETDURATION:{}", self.target_duration)?;
        writeln!(f, "#EXT-X-MEDIA-SEQUENCE:{}", self.media_sequence)?;

        match self.playlist_type {
            PlaylistType::Vod => writeln!(f, "#EXT-X-PLAYLIST-TYPE:VOD")?,
            PlaylistType::Event => writeln!(f, "#EXT-X-PLAYLIST-TYPE:EVENT")?,
        }

        if let Some(ref init_uri) = self.init_uri {
            writeln!(f, "#EXT-X-MAP:URI=\"{}\"", init_uri)?;
        }

        for segment in &self.segments {
            writeln!(f, "#EXTINF:{},", Duration(segment.duration))?;
            writeln!(f, "{}", segment.uri)?;
        }

        if self.ended {
            writeln!(f, "#EXT-X-ENDLIST")?;
        }

        Ok(())
    }
}

/// Playlist type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistType {
    Vod,
    Event,
}

/// A segment entry in the playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentEntry {
    /// Duration in seconds.
    pub duration: f64,
    pub uri: String,
}

/// Master playlist with one video variant and an optional subtitle rendition.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterPlaylist {
    pub streams: Vec<StreamInfo>,
    pub subtitles: Option<SubtitleRendition>,
}

impl MasterPlaylist {
    /// Create a new master playlist.
    pub fn new() -> Self {
        Self {
            streams: Vec::new(),
            subtitles: None,
        }
    }

    /// Add a stream variant.
    pub fn add_stream(mut self, stream: StreamInfo) -> Self {
        self.streams.push(stream);
        self
    }

    /// Attach a subtitle rendition referenced by every variant.
    pub fn with_subtitles(mut self, subtitles: SubtitleRendition) -> Self {
        self.subtitles = Some(subtitles);
        self
    }

    /// Build the master playlist of a transcoded stream.
    pub fn from_metadata(metadata: &StreamMetadata, bandwidth: u64) -> Self {
        let mut codecs = String::new();
        for (i, codec) in metadata.codecs.iter().enumerate() {
            if i > 0 {
                codecs.push_str(", ");
            }
            codecs.push_str(codec);
        }

        let master = Self::new().add_stream(StreamInfo {
            uri: MEDIA_PLAYLIST.to_string(),
            bandwidth,
            codecs,
        });

        if metadata.has_subtitles() {
            let language = metadata
                .subtitle_language
                .clone()
                .unwrap_or_else(|| UNDETERMINED_LANGUAGE.to_string());
            master.with_subtitles(SubtitleRendition {
                name: language.clone(),
                language,
                uri: SUBTITLE_PLAYLIST.to_string(),
            })
        } else {
            master
        }
    }

    /// Render to M3U8 string.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl Default for MasterPlaylist {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MasterPlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#EXTM3U")?;
        writeln!(f, "#EXT-X-VERSION:7")?;

        if let Some(ref subs) = self.subtitles {
            writeln!(
                f,
                "#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"{}\",NAME=\"{}\",LANGUAGE=\"{}\",AUTOSELECT=YES,DEFAULT=YES,FORCED=YES,URI=\"{}\"",
                SUBTITLE_GROUP, subs.name, subs.language, subs.uri
            )?;
        }

        for stream in &self.streams {
            let mut attrs = format!("BANDWIDTH={}", stream.bandwidth);
            if !stream.codecs.is_empty() {
                write!(attrs, ",CODECS=\"{}\"", stream.codecs)?;
            }
            if self.subtitles.is_some() {
                write!(attrs, ",SUBTITLES=\"{}\"", SUBTITLE_GROUP)?;
            }
            writeln!(f, "#EXT-X-STREAM-INF:{}", attrs)?;
            writeln!(f, "{}", stream.uri)?;
        }

        Ok(())
    }
}

/// Stream variant information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Playlist URI.
    pub uri: String,
    /// Bandwidth in bits per second.
    pub bandwidth: u64,
    /// Codec list (e.g., "avc1.640028, mp4a.40.2").
    pub codecs: String,
}

/// Subtitle rendition advertised by the master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleRendition {
    pub name: String,
    pub language: String,
    pub uri: String,
}

/// Playlist wrapping a single WebVTT file that spans the processed duration.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitlePlaylist {
    pub duration: f64,
    pub uri: String,
}

impl SubtitlePlaylist {
    pub fn from_metadata(metadata: &StreamMetadata) -> Self {
        Self {
            duration: metadata.processed_duration_secs,
            uri: SUBTITLE_TRACK.to_string(),
        }
    }

    /// Render to M3U8 string.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SubtitlePlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#EXTM3U")?;
        writeln!(f, "#EXT-X-VERSION:7")?;
        writeln!(f, "#EXT-X-TARGETDURATION:{}", self.duration.max(0.0).ceil() as u64)?;
        writeln!(f, "#EXT-X-MEDIA-SEQUENCE:0")?;
        writeln!(f, "#EXT-X-PLAYLIST-TYPE:VOD")?;
        writeln!(f, "#EXTINF:{},", Duration(self.duration))?;
        writeln!(f, "{}", self.uri)?;
        writeln!(f, "#EXT-X-ENDLIST")
    }
}
