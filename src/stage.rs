//! Transfer stage.
//!
//! Sits between a producer of artifacts and whatever consumes them next.
//! Each artifact is written before the next one is pulled from upstream, so
//! writes are issued and completed strictly in order. The first failure ends
//! the stage.

use std::pin::Pin;
use std::sync::Arc;

use davpush_common::{Artifact, ArtifactKind, Payload, Result, WriteRequest};
use futures::{Stream, StreamExt};

use crate::writer::RemoteWriter;

/// Counts from a completed [`TransferStage::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    /// Artifacts written, documents included.
    pub written: usize,
    /// Structured documents serialized before writing.
    pub documents: usize,
}

/// Single-concurrency pass-through stage in front of a [`RemoteWriter`].
#[derive(Clone)]
pub struct TransferStage {
    writer: Arc<RemoteWriter>,
}

impl TransferStage {
    pub fn new(writer: RemoteWriter) -> Self {
        Self {
            writer: Arc::new(writer),
        }
    }

    /// Share a writer with other stages.
    pub fn with_shared(writer: Arc<RemoteWriter>) -> Self {
        Self { writer }
    }

    pub fn writer(&self) -> &RemoteWriter {
        &self.writer
    }

    /// Write one artifact and hand it back.
    ///
    /// Documents are serialized here; the returned artifact still carries
    /// the structured form. Buffer and text payloads are kept on the returned
    /// artifact, while a stream payload is consumed by the write.
    pub async fn process(&self, mut artifact: Artifact) -> Result<Artifact> {
        let payload = match &artifact.kind {
            ArtifactKind::Document(document) => Some(Payload::Text(document.stringify())),
            ArtifactKind::Opaque => take_for_transfer(&mut artifact.payload),
        };

        tracing::debug!("Writing data to {}", artifact.uri);
        let request = WriteRequest::for_artifact(&artifact, payload);

        match self.writer.write_artifact(request).await {
            Ok(destination) => {
                tracing::info!("The data is written to {}", destination);
                Ok(artifact)
            }
            Err(e) => {
                tracing::error!(
                    uri = %artifact.uri,
                    destination = e.destination().unwrap_or("-"),
                    "Transfer failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    /// Process `upstream` in order, yielding each artifact once written.
    ///
    /// After the first error is yielded the stream ends and nothing more is
    /// pulled from upstream.
    pub fn pipe<S>(self, upstream: S) -> impl Stream<Item = Result<Artifact>>
    where
        S: Stream<Item = Artifact>,
    {
        let state: Option<(Self, Pin<Box<S>>)> = Some((self, Box::pin(upstream)));
        futures::stream::unfold(state, |state| async move {
            let Some((stage, mut upstream)) = state else {
                return None;
            };
            let Some(artifact) = upstream.next().await else {
                return None;
            };
            match stage.process(artifact).await {
                Ok(artifact) => Some((Ok(artifact), Some((stage, upstream)))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Drain `upstream` through the stage.
    pub async fn run<S>(self, upstream: S) -> Result<TransferSummary>
    where
        S: Stream<Item = Artifact>,
    {
        let mut summary = TransferSummary::default();
        let mut output = std::pin::pin!(self.pipe(upstream));

        while let Some(result) = output.next().await {
            let artifact = result?;
            summary.written += 1;
            if artifact.is_document() {
                summary.documents += 1;
            }
        }

        tracing::info!(
            written = summary.written,
            documents = summary.documents,
            "Transfer complete"
        );
        Ok(summary)
    }
}

/// Move the payload out for writing, leaving a copy behind where that is
/// cheap. Streams can only be read once.
fn take_for_transfer(payload: &mut Option<Payload>) -> Option<Payload> {
    match payload.take() {
        Some(Payload::Bytes(bytes)) => {
            *payload = Some(Payload::Bytes(bytes.clone()));
            Some(Payload::Bytes(bytes))
        }
        Some(Payload::Text(text)) => {
            *payload = Some(Payload::Text(text.clone()));
            Some(Payload::Text(text))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_take_for_transfer_keeps_cheap_payloads() {
        let mut payload = Some(Payload::Bytes(Bytes::from_static(b"abc")));
        let taken = take_for_transfer(&mut payload);
        assert!(matches!(taken, Some(Payload::Bytes(ref b)) if b.as_ref() == b"abc"));
        assert!(matches!(payload, Some(Payload::Bytes(_))));

        let mut payload = Some(Payload::Text("#EXTM3U".to_string()));
        let taken = take_for_transfer(&mut payload);
        assert!(matches!(taken, Some(Payload::Text(ref t)) if t == "#EXTM3U"));
        assert!(matches!(payload, Some(Payload::Text(_))));
    }

    #[test]
    fn test_take_for_transfer_consumes_streams() {
        let mut payload = Some(Payload::stream(futures::stream::empty::<
            std::io::Result<Bytes>,
        >()));
        let taken = take_for_transfer(&mut payload);
        assert!(matches!(taken, Some(Payload::Stream(_))));
        assert!(payload.is_none());

        let mut payload = None;
        assert!(take_for_transfer(&mut payload).is_none());
    }
}
