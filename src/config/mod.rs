mod types;

pub use types::*;

use anyhow::{Context, Result};
use davpush_common::ParseFallback;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::store::{WebDavAuth, WebDavStore};
use crate::writer::WriterOptions;

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
        "./davpush.toml",
        "~/.config/davpush/config.toml",
        "/etc/davpush/config.toml",
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

/// Validate configuration.
///
/// An empty URL is allowed here so a file can carry only destination
/// settings; [`Config::url`] rejects it when a connection is needed.
pub fn validate_config(config: &Config) -> Result<()> {
    let remote = &config.remote;

    if !remote.url.is_empty() {
        Url::parse(&remote.url).with_context(|| format!("Invalid remote url: {}", remote.url))?;
    }

    if remote.digest && (remote.user.is_none() || remote.pass.is_none()) {
        anyhow::bail!("Digest authentication needs remote user and pass");
    }

    if remote.timeout_secs == 0 {
        anyhow::bail!("Remote timeout_secs cannot be 0");
    }

    if remote.user.is_some() != remote.pass.is_some() {
        anyhow::bail!("Remote user and pass must be given together");
    }

    if let Some(ref input_dir) = config.destination.input_dir {
        if !input_dir.is_absolute() {
            anyhow::bail!("Destination input_dir must be absolute: {:?}", input_dir);
        }
        if !input_dir.exists() {
            tracing::warn!("Input directory does not exist: {:?}", input_dir);
        }
    }

    Ok(())
}

impl Config {
    /// The remote server URL.
    pub fn url(&self) -> Result<Url> {
        if self.remote.url.is_empty() {
            anyhow::bail!("No remote url configured");
        }
        Url::parse(&self.remote.url)
            .with_context(|| format!("Invalid remote url: {}", self.remote.url))
    }

    /// Credentials: user + pass takes precedence over a token. The pair is
    /// sent as digest instead of basic when `digest` is set.
    pub fn auth(&self) -> Result<WebDavAuth> {
        let remote = &self.remote;
        match (&remote.user, &remote.pass, &remote.token) {
            (Some(user), Some(pass), _) if remote.digest => Ok(WebDavAuth::Digest {
                user: user.clone(),
                pass: pass.clone(),
            }),
            (Some(user), Some(pass), _) => Ok(WebDavAuth::Basic {
                user: user.clone(),
                pass: pass.clone(),
            }),
            (_, _, Some(token)) if !token.is_empty() => Ok(WebDavAuth::Bearer(token.clone())),
            _ => anyhow::bail!("No credentials configured: set user and pass, or a token"),
        }
    }

    /// Writer options derived from the remote URL and destination settings.
    pub fn writer_options(&self) -> Result<WriterOptions> {
        let dest = &self.destination;
        let mut options = if self.remote.url.is_empty() {
            WriterOptions::new(davpush_common::paths::join_remote(
                "/",
                dest.root_path.as_deref().unwrap_or(""),
            ))
        } else {
            WriterOptions::for_url(&self.url()?, dest.root_path.as_deref())
        };

        if let Some(ref input_dir) = dest.input_dir {
            options = options.with_input_dir(input_dir.clone());
        }

        let fallback = if dest.strict_locations {
            ParseFallback::Reject
        } else {
            ParseFallback::OpaquePath
        };

        Ok(options
            .with_ensure_directory(dest.ensure_directory)
            .with_parse_fallback(fallback))
    }

    /// Build the WebDAV store for this configuration.
    pub fn connect(&self) -> Result<WebDavStore> {
        let url = self.url()?;
        let auth = self.auth()?;
        let timeout = Duration::from_secs(self.remote.timeout_secs);
        WebDavStore::new(&url, auth, Some(timeout))
            .with_context(|| format!("Failed to create WebDAV client for {}", url))
    }
}
