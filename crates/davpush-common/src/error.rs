//! Error types shared by the davpush crates.
//!
//! Every variant raised while writing an artifact carries the artifact URI,
//! and the destination path once it has been resolved, so a failure can be
//! traced back to the item that caused it.

use std::io;

/// Boxed error reported by a remote-store implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Common error type for davpush.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The artifact carries no data, or an empty buffer/text.
    #[error("No payload for artifact {uri}")]
    NoPayload { uri: String },

    /// The input could not be turned into a supported payload.
    #[error("Unsupported payload for artifact {uri}: {reason}")]
    UnsupportedPayload { uri: String, reason: String },

    /// The resolved path would escape the configured root.
    #[error("Path traversal rejected for artifact {uri}: {path}")]
    PathTraversal { uri: String, path: String },

    /// The URI could not be parsed under any configured fallback.
    #[error("Unresolvable location: {uri}")]
    UnresolvableLocation { uri: String },

    /// The remote store rejected or failed a put/sink operation.
    #[error("Remote write failed for artifact {uri} at {destination}: {source}")]
    RemoteWrite {
        uri: String,
        destination: String,
        #[source]
        source: BoxError,
    },

    /// Reading the artifact's byte stream failed mid-transfer.
    #[error("Payload stream failed for artifact {uri} at {destination}: {source}")]
    PayloadStream {
        uri: String,
        destination: String,
        #[source]
        source: io::Error,
    },

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a new NoPayload error.
    pub fn no_payload<S: Into<String>>(uri: S) -> Self {
        Self::NoPayload { uri: uri.into() }
    }

    /// Create a new UnsupportedPayload error.
    pub fn unsupported_payload<S: Into<String>, R: Into<String>>(uri: S, reason: R) -> Self {
        Self::UnsupportedPayload {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Create a new PathTraversal error.
    pub fn path_traversal<S: Into<String>, P: Into<String>>(uri: S, path: P) -> Self {
        Self::PathTraversal {
            uri: uri.into(),
            path: path.into(),
        }
    }

    /// Create a new UnresolvableLocation error.
    pub fn unresolvable<S: Into<String>>(uri: S) -> Self {
        Self::UnresolvableLocation { uri: uri.into() }
    }

    /// Wrap a remote-store failure with the artifact context.
    pub fn remote_write<S, D, E>(uri: S, destination: D, source: E) -> Self
    where
        S: Into<String>,
        D: Into<String>,
        E: Into<BoxError>,
    {
        Self::RemoteWrite {
            uri: uri.into(),
            destination: destination.into(),
            source: source.into(),
        }
    }

    /// The URI of the artifact this error relates to, if any.
    pub fn uri(&self) -> Option<&str> {
        match self {
            Self::NoPayload { uri }
            | Self::UnsupportedPayload { uri, .. }
            | Self::PathTraversal { uri, .. }
            | Self::UnresolvableLocation { uri }
            | Self::RemoteWrite { uri, .. }
            | Self::PayloadStream { uri, .. } => Some(uri),
            Self::Io(_) => None,
        }
    }

    /// The resolved destination path, when the failure happened after resolution.
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::RemoteWrite { destination, .. } | Self::PayloadStream { destination, .. } => {
                Some(destination)
            }
            _ => None,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
