mod cli;

use davpush::{
    config,
    local::{self, LocalFile},
    stage::TransferStage,
    store::{EntryType, MemoryStore, RemoteStore},
    writer::RemoteWriter,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, RemoteArgs};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "davpush=debug,davpush_common=debug".to_string()
        } else {
            "davpush=info,davpush_common=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Push {
            dir,
            remote,
            ensure_directory,
            dry_run,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(push(
                dir,
                remote,
                cli.config.as_deref(),
                ensure_directory,
                dry_run,
            ))
        }
        Commands::Check { remote } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check(remote, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("davpush {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Load config and apply command-line overrides on top of it.
fn load_with_overrides(config_path: Option<&Path>, remote: RemoteArgs) -> Result<config::Config> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(url) = remote.url {
        config.remote.url = url;
    }
    if let Some(user) = remote.user {
        config.remote.user = Some(user);
    }
    if let Some(pass) = remote.pass {
        config.remote.pass = Some(pass);
    }
    if let Some(token) = remote.token {
        config.remote.token = Some(token);
    }
    if let Some(root) = remote.root {
        config.destination.root_path = Some(root);
    }

    config::validate_config(&config)?;
    Ok(config)
}

async fn push(
    dir: PathBuf,
    remote: RemoteArgs,
    config_path: Option<&Path>,
    ensure_directory: bool,
    dry_run: bool,
) -> Result<()> {
    let mut config = load_with_overrides(config_path, remote)?;

    let dir = std::fs::canonicalize(&dir)
        .with_context(|| format!("Input directory does not exist: {:?}", dir))?;
    if config.destination.input_dir.is_none() {
        config.destination.input_dir = Some(dir.clone());
    }
    if ensure_directory {
        config.destination.ensure_directory = true;
    }

    let options = config.writer_options()?;
    let files = local::scan(&dir)?;

    if dry_run {
        tracing::info!("Dry run: nothing will be read or sent to the server");
        let writer = RemoteWriter::new(Arc::new(MemoryStore::new()), options);
        for file in &files {
            println!("{}", writer.destination_for(&file.request()?)?);
        }
        println!("✓ {} files would be pushed", files.len());
        return Ok(());
    }

    let store: Arc<dyn RemoteStore> = Arc::new(config.connect()?);
    tracing::info!("Pushing {} files from {:?} to {}", files.len(), dir, options.root);

    let artifacts = files
        .into_iter()
        .map(LocalFile::into_artifact)
        .collect::<davpush_common::Result<Vec<_>>>()?;

    let stage = TransferStage::new(RemoteWriter::new(store, options));
    let summary = stage
        .run(futures::stream::iter(artifacts))
        .await
        .context("Push failed")?;

    println!("✓ Pushed {} files", summary.written);

    Ok(())
}

async fn check(remote: RemoteArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_with_overrides(config_path, remote)?;
    let options = config.writer_options()?;
    let store = config.connect()?;

    println!("Checking {} ...", config.remote.url);
    let entry = store
        .stat(&options.root)
        .await
        .with_context(|| format!("Failed to reach remote root {}", options.root))?;

    match entry {
        Some(EntryType::Directory) => {
            println!("✓ Remote root {} is a directory", options.root);
            Ok(())
        }
        Some(EntryType::File) => anyhow::bail!("Remote root {} is a file", options.root),
        None => anyhow::bail!("Remote root {} does not exist", options.root),
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            let options = config.writer_options()?;
            println!("✓ Configuration is valid");
            if !config.remote.url.is_empty() {
                println!("  Remote: {}", config.remote.url);
            }
            println!("  Root: {}", options.root);
            if let Some(ref input_dir) = config.destination.input_dir {
                println!("  Input dir: {}", input_dir.display());
            }
            println!("  Ensure directory: {}", config.destination.ensure_directory);
            println!("  Strict locations: {}", config.destination.strict_locations);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Timeout: {}s", config.remote.timeout_secs);
        }
    }

    Ok(())
}
