//! Media probing through `ffprobe`.
//!
//! Produces the [`MediaInfo`] stored with every episode: the container duration
//! plus one [`Track`] per elementary stream, keyed by container index.

mod tools;

pub use tools::{check_tool_with_arg, check_tools, ToolInfo};

use reelcast_common::{Error, Result, TrackKind};
use reelcast_db::models::{MediaInfo, Track};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    #[serde(default)]
    codec_type: Option<String>,
    codec_name: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
}

/// Probe a media file with a specific `ffprobe` binary.
pub fn probe_with(ffprobe: &Path, path: &Path) -> Result<MediaInfo> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::internal(format!("{} not found", ffprobe.display()))
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::internal(format!(
            "ffprobe failed on {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    parse_ffprobe_json(&output.stdout)
}

/// Parse the JSON printed by `ffprobe -show_format -show_streams`.
pub fn parse_ffprobe_json(json: &[u8]) -> Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_slice(json)?;

    let container_duration = output
        .format
        .and_then(|f| f.duration)
        .and_then(|s| s.parse::<f64>().ok());

    let tracks = output
        .streams
        .into_iter()
        .map(|stream| Track {
            index: stream.index,
            kind: match stream.codec_type.as_deref() {
                Some("video") => TrackKind::Video,
                Some("audio") => TrackKind::Audio,
                Some("subtitle") => TrackKind::Subtitle,
                _ => TrackKind::Other,
            },
            codec: stream.codec_name,
            language: stream.tags.language,
            duration: stream.duration.and_then(|s| s.parse::<f64>().ok()),
        })
        .collect();

    Ok(MediaInfo {
        container_duration,
        tracks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264", "duration": "1402.360000"},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "tags": {"language": "jpn"}},
            {"index": 2, "codec_type": "subtitle", "codec_name": "ass", "tags": {"language": "eng"}},
            {"index": 3, "codec_type": "attachment"}
        ],
        "format": {"filename": "ep1.mkv", "format_name": "matroska,webm", "duration": "1402.400000"}
    }"#;

    #[test]
    fn test_parse_ffprobe_json() {
        let info = parse_ffprobe_json(SAMPLE.as_bytes()).unwrap();

        assert_eq!(info.container_duration, Some(1402.4));
        assert_eq!(info.tracks.len(), 4);
        assert_eq!(info.tracks[0].kind, TrackKind::Video);
        assert_eq!(info.tracks[0].duration, Some(1402.36));
        assert_eq!(info.tracks[1].language.as_deref(), Some("jpn"));
        assert_eq!(info.tracks[2].kind, TrackKind::Subtitle);
        assert_eq!(info.tracks[3].kind, TrackKind::Other);
        assert_eq!(info.duration_secs(), Some(1402.4));
    }

    #[test]
    fn test_parse_without_format_duration() {
        let json = r#"{"streams": [
            {"index": 0, "codec_type": "video"},
            {"index": 1, "codec_type": "audio", "duration": "60.5"}
        ], "format": {}}"#;
        let info = parse_ffprobe_json(json.as_bytes()).unwrap();

        assert_eq!(info.container_duration, None);
        assert_eq!(info.duration_secs(), Some(60.5));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_ffprobe_json(b"not json").is_err());
    }

    #[test]
    fn test_probe_missing_binary() {
        let err = probe_with(
            Path::new("/nonexistent/ffprobe-12345"),
            Path::new("/tmp/x.mkv"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
