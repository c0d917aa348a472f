use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub destination: DestinationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// WebDAV server URL; its path is the default remote root
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub pass: Option<String>,

    /// Bearer token, used when no user/pass pair is given
    #[serde(default)]
    pub token: Option<String>,

    /// Answer the server's digest challenge with user/pass instead of
    /// sending them as basic auth
    #[serde(default)]
    pub digest: bool,

    /// Per-request timeout for non-streamed requests
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: None,
            pass: None,
            token: None,
            digest: false,
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DestinationConfig {
    /// Remote root path (default: path component of the URL)
    #[serde(default)]
    pub root_path: Option<String>,

    /// Local directory the packager writes to
    #[serde(default)]
    pub input_dir: Option<PathBuf>,

    /// Create missing parent collections before each write
    #[serde(default)]
    pub ensure_directory: bool,

    /// Reject URIs that are neither URLs nor resolvable against a base,
    /// instead of treating them as plain paths
    #[serde(default)]
    pub strict_locations: bool,
}
