mod cli;

use reelcast::{config, probe, server};
use reelcast_common::paths::is_video_file;
use reelcast_common::LibraryKind;
use reelcast_db::pool::{get_conn, init_pool};
use reelcast_db::queries::{episodes, libraries};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting reelcast server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    let db_pool = open_catalog(&config)?;
    server::start_server(config, db_pool).await
}

fn open_catalog(config: &config::Config) -> Result<reelcast_db::pool::DbPool> {
    let db_path = config.database.resolved_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory: {:?}", parent))?;
    }

    let db_path_str = db_path.to_string_lossy();
    tracing::info!("Opening catalog at {}", db_path_str);
    Ok(init_pool(&db_path_str)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelcast=trace,reelcast_media=trace,reelcast_db=debug,reelcast_common=debug,tower_http=debug".to_string()
        } else {
            "reelcast=debug,reelcast_media=debug,reelcast_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::LibraryAdd { name, kind, paths } => {
            add_library(&name, kind, &paths, cli.config.as_deref())
        }
        Commands::EpisodeAdd {
            library,
            name,
            file,
        } => add_episode(&library, name.as_deref(), &file, cli.config.as_deref()),
        Commands::Probe { file, json } => probe_file(&file, json, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate { file } => {
            let path = file.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("reelcast {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn add_library(
    name: &str,
    kind: LibraryKind,
    paths: &[String],
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let pool = open_catalog(&config)?;
    let conn = get_conn(&pool)?;

    let library = libraries::create_library(&conn, name, kind, paths)?;
    println!("{}", library.id);
    Ok(())
}

fn add_episode(
    library: &str,
    name: Option<&str>,
    file: &Path,
    config_path: Option<&Path>,
) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }
    if !is_video_file(file) {
        anyhow::bail!("Not a video file: {:?}", file);
    }
    let library_id = library
        .parse()
        .with_context(|| format!("Invalid library id: {}", library))?;

    let config = config::load_config_or_default(config_path)?;
    let info = probe::probe_with(&config.transcoder.ffprobe_path, file)?;
    let duration = info
        .duration_secs()
        .context("Media has no known duration and cannot be streamed")?;

    let name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string()),
    };
    let file_path = std::fs::canonicalize(file)?;

    let pool = open_catalog(&config)?;
    let conn = get_conn(&pool)?;
    let episode = episodes::create_episode(
        &conn,
        library_id,
        &name,
        &file_path.to_string_lossy(),
        &info,
    )?;

    tracing::info!(media_id = %episode.id, duration = duration, "Added episode");
    println!("{}", episode.id);
    Ok(())
}

fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let info = probe::probe_with(&config.transcoder.ffprobe_path, file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    match info.duration_secs() {
        Some(duration) => {
            let secs = duration as u64;
            let mins = secs / 60;
            let hours = mins / 60;
            println!("Duration: {:02}:{:02}:{:02}", hours, mins % 60, secs % 60);
        }
        None => println!("Duration: unknown"),
    }

    println!("\nTracks: {}", info.tracks.len());
    for track in &info.tracks {
        print!(
            "  [{}] {} {}",
            track.index,
            track.kind,
            track.codec.as_deref().unwrap_or("?")
        );
        if let Some(ref lang) = track.language {
            print!(" ({})", lang);
        }
        println!();
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    println!("Checking external tools...\n");

    let tools = probe::check_tools(
        &config.transcoder.ffmpeg_path,
        &config.transcoder.ffprobe_path,
    );
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Streams cannot be transcoded without them.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Catalog: {}", config.database.resolved_path().display());
            println!("  Cache backend: {:?}", config.cache.backend);
            println!(
                "  Heartbeat window: {}s",
                config.stream.heartbeat_ttl_secs
            );
            println!("  Transcoder concurrency: {}", config.transcoder.concurrency);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
