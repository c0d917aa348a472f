//! Remote writer.
//!
//! Resolves where an artifact belongs under the remote root and transfers its
//! payload there. Buffers and text go out in one request; streams are piped
//! chunk by chunk into a write sink so large segments are never held in
//! memory whole.

use std::path::PathBuf;
use std::sync::Arc;

use davpush_common::paths::{self, LocalFs, Location, ParseFallback, ResolveContext, StdFs};
use davpush_common::{AddressingMode, ByteStream, Error, Payload, Result, WriteRequest};
use futures::StreamExt;
use url::Url;

use crate::store::{parent_directory, EntryType, PutOptions, RemoteStore, WriteSink};

/// Immutable destination settings for a [`RemoteWriter`].
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Absolute remote path every destination is placed under.
    pub root: String,
    /// Local directory artifacts were produced in.
    pub input_dir: Option<PathBuf>,
    /// Base for relative URIs with no referring playlist.
    pub base_url: Option<Url>,
    /// Create the parent collection before each write if it is missing.
    pub ensure_directory: bool,
    pub parse_fallback: ParseFallback,
}

impl WriterOptions {
    /// Options rooted at `root` with everything else off.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            input_dir: None,
            base_url: None,
            ensure_directory: false,
            parse_fallback: ParseFallback::OpaquePath,
        }
    }

    /// Options for a store at `url`: the root defaults to the URL's path and
    /// the URL is the base for relative URIs.
    pub fn for_url(url: &Url, root_path: Option<&str>) -> Self {
        let mut options = Self::new(paths::remote_root(root_path, url));
        options.base_url = Some(url.clone());
        options
    }

    pub fn with_input_dir(mut self, input_dir: impl Into<PathBuf>) -> Self {
        self.input_dir = Some(input_dir.into());
        self
    }

    pub fn with_ensure_directory(mut self, ensure_directory: bool) -> Self {
        self.ensure_directory = ensure_directory;
        self
    }

    pub fn with_parse_fallback(mut self, fallback: ParseFallback) -> Self {
        self.parse_fallback = fallback;
        self
    }
}

/// Writes artifacts to a remote store, one at a time.
pub struct RemoteWriter {
    store: Arc<dyn RemoteStore>,
    options: WriterOptions,
    base: Option<Location>,
    local_fs: Arc<dyn LocalFs>,
}

impl RemoteWriter {
    pub fn new(store: Arc<dyn RemoteStore>, options: WriterOptions) -> Self {
        Self::with_local_fs(store, options, Arc::new(StdFs))
    }

    /// Create a writer with a custom local existence check.
    pub fn with_local_fs(
        store: Arc<dyn RemoteStore>,
        options: WriterOptions,
        local_fs: Arc<dyn LocalFs>,
    ) -> Self {
        tracing::debug!(root = %options.root, "RemoteWriter created");
        let base = options.base_url.clone().map(Location::Url);
        Self {
            store,
            options,
            base,
            local_fs,
        }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Destination path `request` would be written to.
    pub fn destination_for(&self, request: &WriteRequest) -> Result<String> {
        self.resolve(&request.uri, request.parent_uri.as_deref(), request.addressing)
    }

    fn resolve(
        &self,
        uri: &str,
        parent_uri: Option<&str>,
        addressing: AddressingMode,
    ) -> Result<String> {
        let ctx = ResolveContext {
            root: &self.options.root,
            input_dir: self.options.input_dir.as_deref(),
            base: self.base.as_ref(),
            fallback: self.options.parse_fallback,
        };
        paths::resolve_destination(uri, parent_uri, addressing, &ctx, self.local_fs.as_ref())
    }

    /// Write one artifact and return the remote path it was stored at.
    pub async fn write_artifact(&self, request: WriteRequest) -> Result<String> {
        let WriteRequest {
            uri,
            parent_uri,
            addressing,
            payload,
        } = request;
        tracing::debug!(%uri, root = %self.options.root, "write_artifact");

        let payload = match payload {
            Some(payload) if !payload.is_empty() => payload,
            _ => return Err(Error::no_payload(uri)),
        };

        let destination = self.resolve(&uri, parent_uri.as_deref(), addressing)?;
        tracing::debug!(%uri, %destination, "Resolved destination");

        if self.options.ensure_directory {
            self.ensure_parent(&uri, &destination).await?;
        }

        tracing::debug!(%destination, mode = payload.mode(), "Writing payload");
        match payload {
            Payload::Bytes(bytes) => self
                .store
                .put_file_contents(&destination, bytes, PutOptions::WRITE_ONCE)
                .await
                .map_err(|e| Error::remote_write(&uri, &destination, e))?,
            Payload::Text(text) => self
                .store
                .put_file_contents(&destination, text.into(), PutOptions::OVERWRITE)
                .await
                .map_err(|e| Error::remote_write(&uri, &destination, e))?,
            Payload::Stream(stream) => self.pipe(&uri, &destination, stream).await?,
        }

        Ok(destination)
    }

    async fn ensure_parent(&self, uri: &str, destination: &str) -> Result<()> {
        let Some(dir) = parent_directory(destination) else {
            return Ok(());
        };

        let stat = self
            .store
            .stat(dir)
            .await
            .map_err(|e| Error::remote_write(uri, destination, e))?;
        if stat != Some(EntryType::Directory) {
            tracing::debug!(dir, "Creating directory");
            self.store
                .create_directory(dir)
                .await
                .map_err(|e| Error::remote_write(uri, destination, e))?;
        }
        Ok(())
    }

    async fn pipe(&self, uri: &str, destination: &str, mut stream: ByteStream) -> Result<()> {
        let mut sink: Box<dyn WriteSink> = self
            .store
            .create_write_sink(destination)
            .await
            .map_err(|e| Error::remote_write(uri, destination, e))?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(source) => {
                    sink.abort(source.to_string()).await;
                    return Err(Error::PayloadStream {
                        uri: uri.to_string(),
                        destination: destination.to_string(),
                        source,
                    });
                }
            };
            written += chunk.len() as u64;
            if let Err(e) = sink.write(chunk).await {
                sink.abort(e.to_string()).await;
                return Err(Error::remote_write(uri, destination, e));
            }
        }

        sink.finish()
            .await
            .map_err(|e| Error::remote_write(uri, destination, e))?;
        tracing::trace!(destination, written, "Stream finished");
        Ok(())
    }
}
