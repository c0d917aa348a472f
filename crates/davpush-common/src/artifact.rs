//! Artifacts flowing through the transfer pipeline.
//!
//! An [`Artifact`] is one playlist or media segment. Its payload is a closed
//! union decided by whoever builds the artifact; nothing downstream inspects
//! runtime shapes to guess how to transfer it.

use std::fmt;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;

/// Lazily produced bytes, consumed once.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;

/// A structured document that must be serialized before it is written.
pub trait Document: fmt::Debug + Send + Sync {
    /// Render the document to its text form.
    fn stringify(&self) -> String;
}

/// Data carried by an artifact.
pub enum Payload {
    /// In-memory binary data (segments). Written once, never overwritten.
    Bytes(Bytes),
    /// Text data (playlists). May be re-published.
    Text(String),
    /// A byte stream piped into a remote write sink.
    Stream(ByteStream),
}

impl Payload {
    /// Wrap a byte stream.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// True for a zero-length buffer or text. Streams are never considered empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Text(text) => text.is_empty(),
            Self::Stream(_) => false,
        }
    }

    /// Short name of the variant, for logging.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "binary",
            Self::Text(_) => "text",
            Self::Stream(_) => "stream",
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Whether an artifact needs serialization before transfer.
#[derive(Clone)]
pub enum ArtifactKind {
    /// Bytes are written as-is.
    Opaque,
    /// A structured document, stringified right before the write.
    Document(Arc<dyn Document>),
}

impl fmt::Debug for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opaque => f.write_str("Opaque"),
            Self::Document(doc) => f.debug_tuple("Document").field(doc).finish(),
        }
    }
}

/// How an artifact URI maps onto the destination tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// The URI is relative to the playlist that referenced it.
    ByReferrer,
    /// The URI is an absolute local filesystem path under the input directory.
    ByLocalRoot,
}

impl AddressingMode {
    /// Pick `ByLocalRoot` for absolute filesystem paths, `ByReferrer` otherwise.
    ///
    /// Only for producers that cannot say which scheme they use.
    pub fn infer(uri: &str) -> Self {
        if Path::new(uri).is_absolute() {
            Self::ByLocalRoot
        } else {
            Self::ByReferrer
        }
    }
}

/// One playlist or segment flowing through the pipeline.
#[derive(Debug)]
pub struct Artifact {
    /// Location of the artifact itself, possibly relative.
    pub uri: String,
    /// Location of the playlist that referenced this artifact.
    pub parent_uri: Option<String>,
    pub addressing: AddressingMode,
    pub payload: Option<Payload>,
    pub kind: ArtifactKind,
}

impl Artifact {
    /// Create an opaque artifact carrying `payload`.
    pub fn new(uri: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            uri: uri.into(),
            parent_uri: None,
            addressing: AddressingMode::ByReferrer,
            payload: Some(payload.into()),
            kind: ArtifactKind::Opaque,
        }
    }

    /// Create an opaque artifact whose payload is a byte stream.
    pub fn streamed<S>(uri: impl Into<String>, stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::new(uri, Payload::stream(stream))
    }

    /// Create a structured-document artifact. Its payload is produced by
    /// serializing the document.
    pub fn document(uri: impl Into<String>, document: Arc<dyn Document>) -> Self {
        Self {
            uri: uri.into(),
            parent_uri: None,
            addressing: AddressingMode::ByReferrer,
            payload: None,
            kind: ArtifactKind::Document(document),
        }
    }

    /// Create an artifact with no payload.
    pub fn empty(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            parent_uri: None,
            addressing: AddressingMode::ByReferrer,
            payload: None,
            kind: ArtifactKind::Opaque,
        }
    }

    /// Set the referring playlist location.
    pub fn with_parent(mut self, parent_uri: impl Into<String>) -> Self {
        self.parent_uri = Some(parent_uri.into());
        self
    }

    /// Set the addressing mode explicitly.
    pub fn with_addressing(mut self, addressing: AddressingMode) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn is_document(&self) -> bool {
        matches!(self.kind, ArtifactKind::Document(_))
    }
}

/// What the writer needs for one transfer: addressing plus an owned payload.
#[derive(Debug)]
pub struct WriteRequest {
    pub uri: String,
    pub parent_uri: Option<String>,
    pub addressing: AddressingMode,
    pub payload: Option<Payload>,
}

impl WriteRequest {
    /// Build a request addressed like `artifact`, carrying `payload`.
    pub fn for_artifact(artifact: &Artifact, payload: Option<Payload>) -> Self {
        Self {
            uri: artifact.uri.clone(),
            parent_uri: artifact.parent_uri.clone(),
            addressing: artifact.addressing,
            payload,
        }
    }
}

impl From<Artifact> for WriteRequest {
    fn from(artifact: Artifact) -> Self {
        Self {
            uri: artifact.uri,
            parent_uri: artifact.parent_uri,
            addressing: artifact.addressing,
            payload: artifact.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(&'static str);

    impl Document for Fixed {
        fn stringify(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_payload_is_empty() {
        assert!(Payload::from("").is_empty());
        assert!(Payload::from(Vec::new()).is_empty());
        assert!(!Payload::from("#EXTM3U").is_empty());
        assert!(!Payload::from(vec![0u8; 4]).is_empty());
        assert!(!Payload::stream(futures::stream::empty::<io::Result<Bytes>>()).is_empty());
    }

    #[test]
    fn test_payload_mode() {
        assert_eq!(Payload::from("x").mode(), "text");
        assert_eq!(Payload::from(vec![1u8]).mode(), "binary");
        assert_eq!(Payload::stream(futures::stream::empty::<io::Result<Bytes>>()).mode(), "stream");
    }

    #[test]
    fn test_infer_addressing() {
        assert_eq!(
            AddressingMode::infer("/var/hls/low/01.ts"),
            AddressingMode::ByLocalRoot
        );
        assert_eq!(AddressingMode::infer("low/01.ts"), AddressingMode::ByReferrer);
        assert_eq!(
            AddressingMode::infer("http://example.com/low/01.ts"),
            AddressingMode::ByReferrer
        );
    }

    #[test]
    fn test_builders() {
        let artifact = Artifact::new("01.ts", vec![1u8, 2, 3])
            .with_parent("http://example.com/low.m3u8")
            .with_addressing(AddressingMode::ByReferrer);
        assert_eq!(artifact.uri, "01.ts");
        assert_eq!(
            artifact.parent_uri.as_deref(),
            Some("http://example.com/low.m3u8")
        );
        assert!(!artifact.is_document());

        let doc = Artifact::document("master.m3u8", Arc::new(Fixed("#EXTM3U\n")));
        assert!(doc.is_document());
        assert!(doc.payload.is_none());
    }

    #[test]
    fn test_write_request_from_artifact() {
        let artifact = Artifact::new("a.m3u8", "#EXTM3U").with_parent("file:///in/main.m3u8");
        let request = WriteRequest::from(artifact);
        assert_eq!(request.uri, "a.m3u8");
        assert_eq!(request.parent_uri.as_deref(), Some("file:///in/main.m3u8"));
        assert!(matches!(request.payload, Some(Payload::Text(_))));
    }
}
