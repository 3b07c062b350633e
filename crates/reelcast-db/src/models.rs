//! Internal Rust models matching the database schema.

use chrono::{DateTime, Utc};
use reelcast_common::{LibraryId, LibraryKind, MediaId, TrackKind};
use serde::{Deserialize, Serialize};

/// Media library model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    pub kind: LibraryKind,
    pub paths: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A playable media item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Episode {
    pub id: MediaId,
    pub library_id: LibraryId,
    pub name: String,
    pub file_path: String,
    pub info: MediaInfo,
    pub created_at: DateTime<Utc>,
}

/// Probe information stored alongside an episode (JSON column).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaInfo {
    /// Duration reported by the container, in seconds.
    #[serde(default)]
    pub container_duration: Option<f64>,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl MediaInfo {
    /// Total duration of the media in seconds.
    ///
    /// The container duration wins when present; otherwise the first track that
    /// reports a duration is used.
    pub fn duration_secs(&self) -> Option<f64> {
        self.container_duration
            .filter(|d| usable_duration(*d))
            .or_else(|| {
                self.tracks
                    .iter()
                    .filter_map(|t| t.duration)
                    .find(|d| usable_duration(*d))
            })
    }

    /// Look up a track by its container index.
    pub fn track(&self, index: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.index == index)
    }

    /// Tracks of one kind, in container order.
    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }
}

fn usable_duration(d: f64) -> bool {
    d.is_finite() && d > 0.0
}

/// One elementary stream inside the media container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    /// Container stream index, as ffmpeg's `-map 0:N` expects it.
    pub index: u32,
    pub kind: TrackKind,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Per-track duration in seconds, when the container reports one.
    #[serde(default)]
    pub duration: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(index: u32, kind: TrackKind, duration: Option<f64>) -> Track {
        Track {
            index,
            kind,
            codec: None,
            language: None,
            duration,
        }
    }

    #[test]
    fn test_duration_prefers_container() {
        let info = MediaInfo {
            container_duration: Some(1300.0),
            tracks: vec![track(0, TrackKind::Video, Some(1299.9))],
        };
        assert_eq!(info.duration_secs(), Some(1300.0));
    }

    #[test]
    fn test_duration_falls_back_to_first_track_with_duration() {
        let info = MediaInfo {
            container_duration: None,
            tracks: vec![
                track(0, TrackKind::Video, None),
                track(1, TrackKind::Audio, Some(1410.2)),
                track(2, TrackKind::Subtitle, Some(1200.0)),
            ],
        };
        assert_eq!(info.duration_secs(), Some(1410.2));
    }

    #[test]
    fn test_duration_ignores_zero_container_duration() {
        let info = MediaInfo {
            container_duration: Some(0.0),
            tracks: vec![track(0, TrackKind::Video, Some(60.0))],
        };
        assert_eq!(info.duration_secs(), Some(60.0));
    }

    #[test]
    fn test_duration_absent() {
        let info = MediaInfo {
            container_duration: None,
            tracks: vec![track(0, TrackKind::Video, None)],
        };
        assert_eq!(info.duration_secs(), None);
        assert_eq!(MediaInfo::default().duration_secs(), None);
    }

    #[test]
    fn test_track_lookup() {
        let info = MediaInfo {
            container_duration: None,
            tracks: vec![
                track(0, TrackKind::Video, None),
                track(3, TrackKind::Subtitle, None),
            ],
        };
        assert_eq!(info.track(3).map(|t| t.kind), Some(TrackKind::Subtitle));
        assert!(info.track(1).is_none());
        assert_eq!(info.tracks_of(TrackKind::Video).count(), 1);
    }

    #[test]
    fn test_media_info_from_empty_json() {
        let info: MediaInfo = serde_json::from_str("{}").unwrap();
        assert_eq!(info, MediaInfo::default());
    }
}
