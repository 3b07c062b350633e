mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./reelcast.toml",
        "./config.toml",
        "~/.config/reelcast/config.toml",
        "/etc/reelcast/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.cache.backend == CacheBackend::Redis
        && config.cache.redis_url.as_deref().map_or(true, str::is_empty)
    {
        anyhow::bail!("Cache backend is redis but no redis_url is set");
    }

    let stream = &config.stream;
    for (name, value) in [
        ("index_ttl_secs", stream.index_ttl_secs),
        ("heartbeat_ttl_secs", stream.heartbeat_ttl_secs),
        ("read_ttl_secs", stream.read_ttl_secs),
        ("write_ttl_secs", stream.write_ttl_secs),
        ("ready_timeout_secs", stream.ready_timeout_secs),
    ] {
        if value == 0 {
            anyhow::bail!("stream.{} cannot be 0", name);
        }
    }

    if config.transcoder.concurrency == 0 {
        anyhow::bail!("transcoder.concurrency cannot be 0");
    }
    if config.transcoder.segment_secs == 0 {
        anyhow::bail!("transcoder.segment_secs cannot be 0");
    }

    if let Some(ref dir) = config.transcoder.work_dir {
        if !dir.exists() {
            tracing::warn!("Transcoder work dir does not exist: {:?}", dir);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.stream.index_ttl_secs, 86_400);
        assert_eq!(config.stream.heartbeat_ttl_secs, 15);
        assert_eq!(config.stream.read_ttl_secs, 3_600);
        assert_eq!(config.stream.ready_timeout_secs, 5);
        assert_eq!(config.transcoder.segment_secs, 5);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_partial_config() {
        let file = write_config(
            r#"
            [server]
            port = 9000

            [stream]
            heartbeat_ttl_secs = 30

            [transcoder]
            concurrency = 4
            "#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.stream.heartbeat_ttl_secs, 30);
        assert_eq!(config.stream.read_ttl_secs, 3_600);
        assert_eq!(config.transcoder.concurrency, 4);
        assert_eq!(config.transcoder.video_encoder, "libx264");
    }

    #[test]
    fn test_rejects_port_zero() {
        let file = write_config("[server]\nport = 0\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_redis_without_url() {
        let file = write_config("[cache]\nbackend = \"redis\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("redis_url"));
    }

    #[test]
    fn test_accepts_redis_with_url() {
        let file = write_config(
            "[cache]\nbackend = \"redis\"\nredis_url = \"redis://127.0.0.1/\"\n",
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.cache.backend, CacheBackend::Redis);
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let file = write_config("[stream]\nheartbeat_ttl_secs = 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("heartbeat_ttl_secs"));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let file = write_config("[transcoder]\nconcurrency = 0\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/reelcast.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_database_path_expansion() {
        let db = DatabaseConfig {
            path: "~/catalog.db".to_string(),
        };
        assert!(!db.resolved_path().to_string_lossy().starts_with('~'));
    }
}
