//! Remote file store capability.
//!
//! The writer only needs four operations from a store: stat a path, create a
//! directory, put a whole buffer, and open a sink that accepts bytes
//! incrementally. [`WebDavStore`] speaks WebDAV over HTTP; [`MemoryStore`]
//! keeps everything in process for dry runs and tests.

mod memory;
mod webdav;

pub use memory::{MemoryStore, StoreCall};
pub use webdav::{WebDavAuth, WebDavStore};

use bytes::Bytes;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an unexpected status.
    #[error("{method} {path} failed with status {status}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
    },

    /// A write-once path already holds data.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The sink was closed before the transfer completed.
    #[error("Write sink closed: {0}")]
    Closed(String),

    /// The server's authentication challenge could not be answered.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid store configuration or path.
    #[error("Invalid: {0}")]
    Invalid(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type of an existing remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
}

/// Options for [`RemoteStore::put_file_contents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOptions {
    /// Replace existing content. When false, the store must reject a write
    /// to a path that already exists.
    pub overwrite: bool,
}

impl PutOptions {
    pub const OVERWRITE: Self = Self { overwrite: true };
    pub const WRITE_ONCE: Self = Self { overwrite: false };
}

impl Default for PutOptions {
    fn default() -> Self {
        Self::OVERWRITE
    }
}

/// Operations the writer needs from a remote file store.
///
/// Implementations must tolerate concurrent calls from independent writers.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Look up `path`, returning `None` when nothing exists there.
    async fn stat(&self, path: &str) -> StoreResult<Option<EntryType>>;

    /// Create the directory at `path`.
    async fn create_directory(&self, path: &str) -> StoreResult<()>;

    /// Write `data` to `path` in one request.
    async fn put_file_contents(&self, path: &str, data: Bytes, options: PutOptions)
        -> StoreResult<()>;

    /// Open a sink that writes to `path` as chunks arrive.
    async fn create_write_sink(&self, path: &str) -> StoreResult<Box<dyn WriteSink>>;
}

/// Incremental writer returned by [`RemoteStore::create_write_sink`].
///
/// Data is only guaranteed to be stored once [`finish`](WriteSink::finish)
/// returns `Ok`.
#[async_trait::async_trait]
pub trait WriteSink: Send {
    /// Send one chunk.
    async fn write(&mut self, chunk: Bytes) -> StoreResult<()>;

    /// Signal end of data and wait for the store to confirm.
    async fn finish(self: Box<Self>) -> StoreResult<()>;

    /// Abandon the transfer. Whatever the store received may be discarded.
    async fn abort(self: Box<Self>, reason: String);
}

/// Parent directory of a remote path, with a trailing separator.
pub fn parent_directory(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    Some(&trimmed[..=idx])
}
