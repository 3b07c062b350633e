use clap::{Parser, Subcommand};
use reelcast_common::LibraryKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelcast")]
#[command(author, version, about = "Personal media server with on-demand HLS transcoding")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server
    Start {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Add a library to the catalog
    LibraryAdd {
        /// Display name
        #[arg(long)]
        name: String,

        /// Library kind: show or file
        #[arg(long, default_value = "show")]
        kind: LibraryKind,

        /// Folders the library covers
        #[arg(long = "path")]
        paths: Vec<String>,
    },

    /// Probe a media file and add it to a library as an episode
    EpisodeAdd {
        /// Library ID
        #[arg(long)]
        library: String,

        /// Episode name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Media file
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Probe a media file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        #[arg(value_name = "CONFIG")]
        file: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
