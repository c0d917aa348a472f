use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "davpush")]
#[command(author, version, about = "Relocate HLS packaging output onto a WebDAV server")]
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

/// Remote server settings; each overrides the config file.
#[derive(Args, Debug, Default)]
pub struct RemoteArgs {
    /// WebDAV server URL
    #[arg(long, env = "DAVPUSH_URL")]
    pub url: Option<String>,

    /// User for basic authentication
    #[arg(long, env = "DAVPUSH_USER")]
    pub user: Option<String>,

    /// Password for basic authentication
    #[arg(long, env = "DAVPUSH_PASS", hide_env_values = true)]
    pub pass: Option<String>,

    /// Bearer token
    #[arg(long, env = "DAVPUSH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Remote root path (default: path of the URL)
    #[arg(long)]
    pub root: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Push a packaged HLS directory to the remote server
    Push {
        /// Directory written by the packager
        #[arg(required = true)]
        dir: PathBuf,

        #[command(flatten)]
        remote: RemoteArgs,

        /// Create missing remote directories before each write
        #[arg(long)]
        ensure_directory: bool,

        /// Show where files would be written without contacting the server
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that the remote root is reachable
    Check {
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
