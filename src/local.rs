//! Local packaging output as artifacts.
//!
//! Walks a directory written by an HLS packager and turns every file into an
//! [`Artifact`] addressed by its `file://` URL, so the writer lays it out
//! under the remote root exactly as it sits under the input directory.

use std::io;
use std::path::{Path, PathBuf};

use davpush_common::{AddressingMode, Artifact, Error, Payload, Result, WriteRequest};
use futures::{Stream, TryStreamExt};
use tokio_util::io::ReaderStream;
use url::Url;
use walkdir::WalkDir;

/// Playlist file extensions.
const PLAYLIST_EXTENSIONS: &[&str] = &["m3u8", "m3u"];

/// What a local file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Playlist,
    Segment,
}

impl LocalKind {
    pub fn of(path: &Path) -> Self {
        let is_playlist = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| PLAYLIST_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if is_playlist {
            Self::Playlist
        } else {
            Self::Segment
        }
    }
}

/// One file found under the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub kind: LocalKind,
}

impl LocalFile {
    /// `file://` URL addressing this file.
    pub fn uri(&self) -> Result<String> {
        Url::from_file_path(&self.path)
            .map(|url| url.to_string())
            .map_err(|_| {
                Error::unsupported_payload(self.path.display().to_string(), "path is not absolute")
            })
    }

    /// Request addressed like this file's artifact but without a payload,
    /// for resolving its destination without reading it.
    pub fn request(&self) -> Result<WriteRequest> {
        Ok(WriteRequest {
            uri: self.uri()?,
            parent_uri: None,
            addressing: AddressingMode::ByReferrer,
            payload: None,
        })
    }

    /// Build the artifact for this file.
    ///
    /// Playlists are read as text now. Segments are opened lazily and
    /// streamed when the writer consumes them.
    pub fn into_artifact(self) -> Result<Artifact> {
        let uri = self.uri()?;

        let payload = match self.kind {
            LocalKind::Playlist => Payload::Text(std::fs::read_to_string(&self.path)?),
            LocalKind::Segment => Payload::stream(file_stream(self.path)),
        };

        Ok(Artifact::new(uri, payload).with_addressing(AddressingMode::ByReferrer))
    }
}

/// Lazily open `path` and stream its contents.
pub fn file_stream(path: PathBuf) -> impl Stream<Item = io::Result<bytes::Bytes>> + Send + 'static {
    futures::stream::once(async move { tokio::fs::File::open(path).await })
        .map_ok(ReaderStream::new)
        .try_flatten()
}

/// Scan `dir` for files to push.
///
/// Segments come first and playlists last, so a playlist is only published
/// once everything it references is in place. Within each group files are
/// ordered by path.
pub fn scan(dir: &Path) -> Result<Vec<LocalFile>> {
    if !dir.is_dir() {
        return Err(Error::unsupported_payload(
            dir.display().to_string(),
            "input is not a directory",
        ));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::Io(e.into_io_error().unwrap_or_else(|| {
                io::Error::other("filesystem loop while scanning input directory")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let kind = LocalKind::of(&path);
        files.push(LocalFile { path, kind });
    }

    files.sort_by_key(|f| f.kind == LocalKind::Playlist);
    tracing::debug!(count = files.len(), dir = %dir.display(), "Scanned input directory");
    Ok(files)
}
