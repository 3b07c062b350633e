//! ffmpeg-backed transcoder.
//!
//! Each job runs one `ffmpeg` producing fragmented-MP4 HLS into a private
//! temp directory. The job polls ffmpeg's own playlist, uploads the init
//! segment and every finished segment into the [`SegmentStore`], and rewrites
//! the stream metadata as it goes. Cancellation kills ffmpeg.

use async_trait::async_trait;
use bytes::Bytes;
use reelcast_common::{Error, Result, SegmentInfo, StreamId, StreamMetadata, StreamProps};
use reelcast_media::hls::parse_segment_uri;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{JobContext, Transcoder};
use crate::config::Config;
use crate::probe::probe_with;
use crate::streaming::SegmentStore;

/// Playlist ffmpeg writes into the work directory.
const OUTPUT_PLAYLIST: &str = "stream.m3u8";
/// Init segment ffmpeg writes into the work directory.
const OUTPUT_INIT: &str = "init.mp4";
const OUTPUT_SUBTITLES: &str = "subtitles.vtt";

/// H.264 High profile, level 4.0.
const VIDEO_CODEC_TAG: &str = "avc1.640028";
/// AAC-LC.
const AUDIO_CODEC_TAG: &str = "mp4a.40.2";

#[derive(Debug, Clone)]
pub struct TranscodeSettings {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Parent of the per-job temp directories. The system temp dir if unset.
    pub work_dir: Option<PathBuf>,
    pub video_encoder: String,
    pub preset: String,
    pub audio_bitrate: String,
    pub segment_secs: u32,
    pub poll_interval: Duration,
    /// Expiry given to everything the job writes.
    pub write_ttl: Duration,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl TranscodeSettings {
    pub fn from_config(config: &Config) -> Self {
        let t = &config.transcoder;
        Self {
            ffmpeg_path: t.ffmpeg_path.clone(),
            ffprobe_path: t.ffprobe_path.clone(),
            work_dir: t.work_dir.clone(),
            video_encoder: t.video_encoder.clone(),
            preset: t.preset.clone(),
            audio_bitrate: t.audio_bitrate.clone(),
            segment_secs: t.segment_secs,
            poll_interval: t.poll_interval(),
            write_ttl: config.stream.write_ttl(),
        }
    }
}

fn offset_arg(secs: f64) -> String {
    format!("{:.3}", secs)
}

/// Arguments for the main HLS transcode of `props` into `out_dir`.
fn hls_args(settings: &TranscodeSettings, props: &StreamProps, out_dir: &Path) -> Vec<OsString> {
    let video_map = match props.video_track {
        Some(n) => format!("0:{}", n),
        None => "0:v:0".to_string(),
    };
    let audio_map = match props.audio_track {
        Some(n) => format!("0:{}", n),
        None => "0:a:0?".to_string(),
    };
    let seg = settings.segment_secs;

    let mut args: Vec<OsString> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostdin".into(),
        "-ss".into(),
        offset_arg(props.start_offset_secs).into(),
        "-i".into(),
        props.media.file_path.clone().into_os_string(),
        "-map".into(),
        video_map.into(),
        "-map".into(),
        audio_map.into(),
        "-c:v".into(),
        settings.video_encoder.clone().into(),
    ];
    if !settings.preset.is_empty() {
        args.push("-preset".into());
        args.push(settings.preset.clone().into());
    }
    let encoding: Vec<OsString> = vec![
        "-profile:v".into(),
        "high".into(),
        "-level:v".into(),
        "4.0".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-force_key_frames".into(),
        format!("expr:gte(t,n_forced*{})", seg).into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        settings.audio_bitrate.clone().into(),
        "-ac".into(),
        "2".into(),
        "-sn".into(),
        "-f".into(),
        "hls".into(),
        "-hls_time".into(),
        seg.to_string().into(),
        "-hls_playlist_type".into(),
        "event".into(),
        "-hls_segment_type".into(),
        "fmp4".into(),
        "-hls_fmp4_init_filename".into(),
        OUTPUT_INIT.into(),
        "-hls_segment_filename".into(),
        out_dir.join("%d.m4s").into_os_string(),
        "-start_number".into(),
        "0".into(),
        out_dir.join(OUTPUT_PLAYLIST).into_os_string(),
    ];
    args.extend(encoding);
    args
}

/// Arguments extracting subtitle track `track` of `props` to WebVTT.
fn subtitle_args(props: &StreamProps, track: u32, out: &Path) -> Vec<OsString> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostdin".into(),
        "-y".into(),
        "-ss".into(),
        offset_arg(props.start_offset_secs).into(),
        "-i".into(),
        props.media.file_path.clone().into_os_string(),
        "-map".into(),
        format!("0:{}", track).into(),
        "-f".into(),
        "webvtt".into(),
        out.as_os_str().to_os_string(),
    ]
}

/// Finished segments listed in an ffmpeg HLS playlist, in playlist order.
fn parse_playlist(text: &str) -> Vec<SegmentInfo> {
    let mut segments = Vec::new();
    let mut duration = None;

    for line in text.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            duration = rest
                .split(',')
                .next()
                .and_then(|d| d.trim().parse::<f64>().ok());
        } else if !line.is_empty() && !line.starts_with('#') {
            if let (Some(duration_secs), Some(index)) = (duration.take(), parse_segment_uri(line)) {
                segments.push(SegmentInfo {
                    index,
                    duration_secs,
                });
            }
        }
    }

    segments
}

/// What a job has uploaded so far.
#[derive(Debug, Default)]
struct Progress {
    metadata: StreamMetadata,
    init_uploaded: bool,
}

/// Runs ffmpeg and mirrors its output into the segment store.
pub struct FfmpegTranscoder {
    settings: TranscodeSettings,
    store: SegmentStore,
}

impl FfmpegTranscoder {
    pub fn new(settings: TranscodeSettings, store: SegmentStore) -> Self {
        Self { settings, store }
    }

    fn work_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("reelcast-");
        let dir = match &self.settings.work_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    async fn put_metadata(&self, id: &StreamId, metadata: &StreamMetadata) -> Result<()> {
        self.store
            .put_metadata(id, metadata, self.settings.write_ttl)
            .await
    }

    /// Extract the selected subtitle track. Returns `None` once cancelled.
    async fn extract_subtitles(
        &self,
        props: &StreamProps,
        track: u32,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let out = dir.join(OUTPUT_SUBTITLES);
        let mut cmd = Command::new(&self.settings.ffmpeg_path);
        cmd.args(subtitle_args(props, track, &out))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::select! {
            output = cmd.output() => output?,
            _ = cancel.cancelled() => return Ok(None),
        };
        if !output.status.success() {
            return Err(Error::internal(format!(
                "subtitle extraction exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(Some(tokio::fs::read_to_string(&out).await?))
    }

    /// Language tag of a track, from a fresh probe of the source.
    async fn track_language(&self, props: &StreamProps, track: u32) -> Option<String> {
        let ffprobe = self.settings.ffprobe_path.clone();
        let file = props.media.file_path.clone();
        match tokio::task::spawn_blocking(move || probe_with(&ffprobe, &file)).await {
            Ok(Ok(info)) => info.track(track).and_then(|t| t.language.clone()),
            Ok(Err(e)) => {
                debug!(error = %e, "Could not probe subtitle language");
                None
            }
            Err(e) => {
                debug!(error = %e, "Probe task failed");
                None
            }
        }
    }

    /// Upload whatever ffmpeg finished since the last sync.
    ///
    /// Nothing is written once `cancel` has fired.
    async fn sync(
        &self,
        id: &StreamId,
        dir: &Path,
        progress: &mut Progress,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let playlist = match tokio::fs::read_to_string(dir.join(OUTPUT_PLAYLIST)).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if !progress.init_uploaded {
            let init = match tokio::fs::read(dir.join(OUTPUT_INIT)).await {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            if cancel.is_cancelled() {
                return Ok(());
            }
            self.store
                .put_init_segment(id, Bytes::from(init), self.settings.write_ttl)
                .await?;
            progress.init_uploaded = true;
            debug!(stream_id = %id, "Uploaded init segment");
        }

        for segment in parse_playlist(&playlist) {
            if progress
                .metadata
                .segments
                .last()
                .is_some_and(|last| segment.index <= last.index)
            {
                continue;
            }

            let data = tokio::fs::read(dir.join(format!("{}.m4s", segment.index))).await?;

            // The key is listed as pending before its bytes exist, so a cancel
            // at any point still finds everything this job wrote.
            if cancel.is_cancelled() {
                return Ok(());
            }
            progress.metadata.pending_segment = Some(segment.index);
            self.put_metadata(id, &progress.metadata).await?;

            if cancel.is_cancelled() {
                return Ok(());
            }
            self.store
                .put_segment(id, segment.index, Bytes::from(data), self.settings.write_ttl)
                .await?;
            progress
                .metadata
                .push_segment(segment.index, segment.duration_secs);
            progress.metadata.pending_segment = None;

            if cancel.is_cancelled() {
                return Ok(());
            }
            self.put_metadata(id, &progress.metadata).await?;
            debug!(stream_id = %id, index = segment.index, duration = segment.duration_secs, "Uploaded segment");
        }

        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn run(&self, job: JobContext) -> Result<()> {
        let props = &job.props;
        let id = props.stream_id;
        let cancel = &job.cancel;

        if cancel.is_cancelled() {
            return Ok(());
        }

        let dir = self.work_dir()?;
        let mut progress = Progress::default();
        progress.metadata.codecs.insert(VIDEO_CODEC_TAG.to_string());
        progress.metadata.codecs.insert(AUDIO_CODEC_TAG.to_string());
        self.put_metadata(&id, &progress.metadata).await?;

        if let Some(track) = props.subtitle_track {
            match self.extract_subtitles(props, track, dir.path(), cancel).await {
                Ok(Some(text)) => {
                    progress.metadata.subtitle_text = Some(text);
                    progress.metadata.subtitle_language = self.track_language(props, track).await;
                    if cancel.is_cancelled() {
                        return Ok(());
                    }
                    self.put_metadata(&id, &progress.metadata).await?;
                }
                Ok(None) => return Ok(()),
                Err(e) => warn!(stream_id = %id, track = track, error = %e, "Subtitle extraction failed"),
            }
        }

        let mut child = Command::new(&self.settings.ffmpeg_path)
            .args(hls_args(&self.settings, props, dir.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::internal(format!(
                    "{} not found",
                    self.settings.ffmpeg_path.display()
                )),
                _ => Error::Io(e),
            })?;

        info!(
            stream_id = %id,
            job_id = %job.id,
            file = %props.media.file_path.display(),
            offset = props.start_offset_secs,
            "Started ffmpeg"
        );

        let stderr = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf).await;
                buf
            })
        });

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let status = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(stream_id = %id, "Stopping ffmpeg");
                    if let Err(e) = child.kill().await {
                        warn!(stream_id = %id, error = %e, "Failed to kill ffmpeg");
                    }
                    return Ok(());
                }
                status = child.wait() => break status?,
                _ = ticker.tick() => self.sync(&id, dir.path(), &mut progress, cancel).await?,
            }
        };

        if cancel.is_cancelled() {
            return Ok(());
        }

        if !status.success() {
            let stderr = match stderr {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            return Err(Error::internal(format!(
                "ffmpeg exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        self.sync(&id, dir.path(), &mut progress, cancel).await?;
        if cancel.is_cancelled() {
            return Ok(());
        }
        progress.metadata.mark_complete();
        self.put_metadata(&id, &progress.metadata).await?;

        info!(
            stream_id = %id,
            segments = progress.metadata.segments.len(),
            duration = progress.metadata.processed_duration_secs,
            "Transcode complete"
        );
        Ok(())
    }
}
