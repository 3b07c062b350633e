use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub transcoder: TranscoderConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite catalog file. `~` is expanded.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "~/.local/share/reelcast/catalog.db".to_string()
}

impl DatabaseConfig {
    /// Path with `~` and environment variables expanded.
    pub fn resolved_path(&self) -> PathBuf {
        match shellexpand::full(&self.path) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(_) => PathBuf::from(shellexpand::tilde(&self.path).as_ref()),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process map. Stream state does not survive a restart.
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    /// e.g. `redis://127.0.0.1:6379/0`
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Prepended to every key, so several servers can share one Redis.
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// How often the memory backend reclaims expired entries.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

fn default_purge_interval() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            redis_url: None,
            key_prefix: None,
            purge_interval_secs: default_purge_interval(),
        }
    }
}

impl CacheConfig {
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs.max(1))
    }
}

/// Lifetimes of session-index and segment-store entries.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Lifetime of the client and job index entries.
    #[serde(default = "default_index_ttl")]
    pub index_ttl_secs: u64,

    /// Window a heartbeat keeps a stream alive for. Also the job's self-termination window.
    #[serde(default = "default_heartbeat_ttl")]
    pub heartbeat_ttl_secs: u64,

    /// Lifetime a successful read extends the read entry to.
    #[serde(default = "default_read_ttl")]
    pub read_ttl_secs: u64,

    /// Lifetime of entries written by the transcoder.
    #[serde(default = "default_write_ttl")]
    pub write_ttl_secs: u64,

    /// How long `?wait=true` creates wait for the job to start.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,

    /// BANDWIDTH advertised by master playlists, in bits per second.
    #[serde(default = "default_bandwidth")]
    pub bandwidth: u64,
}

fn default_index_ttl() -> u64 {
    86_400
}
fn default_heartbeat_ttl() -> u64 {
    15
}
fn default_read_ttl() -> u64 {
    3_600
}
fn default_write_ttl() -> u64 {
    3_600
}
fn default_ready_timeout() -> u64 {
    5
}
fn default_bandwidth() -> u64 {
    reelcast_media::hls::DEFAULT_BANDWIDTH
}

impl StreamConfig {
    pub fn index_ttl(&self) -> Duration {
        Duration::from_secs(self.index_ttl_secs)
    }

    pub fn heartbeat_ttl(&self) -> Duration {
        Duration::from_secs(self.heartbeat_ttl_secs)
    }

    pub fn read_ttl(&self) -> Duration {
        Duration::from_secs(self.read_ttl_secs)
    }

    pub fn write_ttl(&self) -> Duration {
        Duration::from_secs(self.write_ttl_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            index_ttl_secs: default_index_ttl(),
            heartbeat_ttl_secs: default_heartbeat_ttl(),
            read_ttl_secs: default_read_ttl(),
            write_ttl_secs: default_write_ttl(),
            ready_timeout_secs: default_ready_timeout(),
            bandwidth: default_bandwidth(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscoderConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: PathBuf,

    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: PathBuf,

    /// Maximum number of transcodes running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Scratch directory for ffmpeg output. Defaults to the system temp dir.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    #[serde(default = "default_video_encoder")]
    pub video_encoder: String,

    #[serde(default = "default_preset")]
    pub preset: String,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Nominal segment length, also used as the media playlist target duration.
    #[serde(default = "default_segment_secs")]
    pub segment_secs: u32,

    /// How often ffmpeg's output directory is scanned for new segments.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}
fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}
fn default_concurrency() -> usize {
    2
}
fn default_video_encoder() -> String {
    "libx264".to_string()
}
fn default_preset() -> String {
    "veryfast".to_string()
}
fn default_audio_bitrate() -> String {
    "192k".to_string()
}
fn default_segment_secs() -> u32 {
    reelcast_media::hls::DEFAULT_TARGET_DURATION
}
fn default_poll_interval() -> u64 {
    500
}

impl TranscoderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
            concurrency: default_concurrency(),
            work_dir: None,
            video_encoder: default_video_encoder(),
            preset: default_preset(),
            audio_bitrate: default_audio_bitrate(),
            segment_secs: default_segment_secs(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}
