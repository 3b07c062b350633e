//! Path utilities for detecting media files by extension.

use std::path::Path;

/// Container extensions ffmpeg can open that we accept into a library.
const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "m4v", "ts", "webm", "mov"];

/// Check if a path has a video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use reelcast_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("episode.mkv")));
/// assert!(is_video_file(Path::new("/shows/pilot.MP4")));
/// assert!(!is_video_file(Path::new("episode.srt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
