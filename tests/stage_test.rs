//! TransferStage ordering and failure behavior.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use davpush::store::{MemoryStore, StoreCall};
use davpush::{RemoteWriter, TransferStage, TransferSummary, WriterOptions};
use davpush_common::{Artifact, ArtifactKind, Error, Payload};
use davpush_hls::{MasterPlaylist, MediaPlaylist, SegmentEntry, StreamInfo};
use futures::{stream, StreamExt};

const RENDITIONS: [(&str, u32); 3] = [("low", 800_000), ("mid", 1_600_000), ("high", 3_200_000)];

fn stage(store: &MemoryStore) -> TransferStage {
    let options = WriterOptions::new("/dest/").with_input_dir("/hls");
    TransferStage::new(RemoteWriter::new(Arc::new(store.clone()), options))
}

fn segment(uri: &str, parent: &str) -> Artifact {
    let items: Vec<io::Result<Bytes>> = vec![Ok(Bytes::from(format!("data:{uri}")))];
    Artifact::streamed(uri, stream::iter(items)).with_parent(parent)
}

/// Master playlist, then each rendition's playlist followed by its segments.
fn packaged_output() -> Vec<Artifact> {
    let master_uri = "file:///hls/master.m3u8";
    let mut master = MasterPlaylist::new();
    for (name, bandwidth) in RENDITIONS {
        master = master.add_stream(StreamInfo::new(format!("{name}/index.m3u8"), bandwidth));
    }

    let mut artifacts = vec![Artifact::document(master_uri, Arc::new(master))];
    for (name, _) in RENDITIONS {
        let mut playlist = MediaPlaylist::vod(6);
        for i in 1..=3 {
            playlist.segments.push(SegmentEntry::new(6.0, format!("{i:02}.ts")));
        }
        let playlist_uri = format!("file:///hls/{name}/index.m3u8");
        let segment_uris: Vec<String> = playlist.referenced_uris().map(str::to_string).collect();

        artifacts.push(
            Artifact::document(format!("{name}/index.m3u8"), Arc::new(playlist))
                .with_parent(master_uri),
        );
        for uri in segment_uris {
            artifacts.push(segment(&uri, &playlist_uri));
        }
    }
    artifacts
}

#[tokio::test]
async fn mixed_sequence_is_written_in_order() {
    let store = MemoryStore::new();
    let summary = stage(&store)
        .run(stream::iter(packaged_output()))
        .await
        .unwrap();

    assert_eq!(
        summary,
        TransferSummary {
            written: 13,
            documents: 4,
        }
    );
    assert_eq!(store.put_count(), 4);
    assert_eq!(store.sink_count(), 9);

    let paths: Vec<String> = store
        .calls()
        .into_iter()
        .map(|call| match call {
            StoreCall::Put { path, overwrite } => {
                assert!(overwrite, "playlists are overwritten");
                path
            }
            StoreCall::OpenSink(path) => path,
            other => panic!("unexpected call {other:?}"),
        })
        .collect();

    let mut expected = vec!["/dest/master.m3u8".to_string()];
    for (name, _) in RENDITIONS {
        expected.push(format!("/dest/{name}/index.m3u8"));
        for i in 1..=3 {
            expected.push(format!("/dest/{name}/{i:02}.ts"));
        }
    }
    assert_eq!(paths, expected);

    let master = store.get("/dest/master.m3u8").unwrap();
    let master = std::str::from_utf8(&master).unwrap();
    assert!(master.starts_with("#EXTM3U"));
    assert!(master.contains("mid/index.m3u8"));
    assert_eq!(
        store.get("/dest/high/03.ts").unwrap(),
        Bytes::from_static(b"data:03.ts")
    );
}

#[tokio::test]
async fn first_failure_stops_the_stage() {
    let store = MemoryStore::new();
    store.fail_writes_to("/dest/low/02.ts");

    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pulled);
    let upstream = stream::iter(packaged_output()).inspect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = stage(&store).run(upstream).await.unwrap_err();

    assert!(matches!(err, Error::RemoteWrite { ref destination, .. } if destination == "/dest/low/02.ts"));
    // master, low/index.m3u8, low/01.ts, low/02.ts
    assert_eq!(pulled.load(Ordering::SeqCst), 4);
    assert_eq!(store.calls().len(), 4);
    assert!(store.get("/dest/low/03.ts").is_none());
}

#[tokio::test]
async fn pipe_ends_after_the_error() {
    let store = MemoryStore::new();
    let artifacts = vec![
        Artifact::new("/a.m3u8", "#EXTM3U\n"),
        Artifact::empty("/b.ts"),
        Artifact::new("/c.m3u8", "#EXTM3U\n"),
    ];

    let results: Vec<_> = stage(&store).pipe(stream::iter(artifacts)).collect().await;

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(Error::NoPayload { .. })));
    assert!(store.get("/dest/c.m3u8").is_none());
}

#[tokio::test]
async fn forwarded_artifacts_keep_their_identity() {
    let store = MemoryStore::new();
    let master = Arc::new(MasterPlaylist::new().add_stream(StreamInfo::new("low/index.m3u8", 1)));
    let artifacts = vec![
        Artifact::document("/master.m3u8", master),
        Artifact::new("/init.mp4", vec![1u8, 2, 3]),
        segment("/low/01.ts", "/low/index.m3u8"),
    ];

    let forwarded: Vec<Artifact> = stage(&store)
        .pipe(stream::iter(artifacts))
        .map(|result| result.unwrap())
        .collect()
        .await;

    assert_eq!(forwarded.len(), 3);

    assert_eq!(forwarded[0].uri, "/master.m3u8");
    assert!(matches!(forwarded[0].kind, ArtifactKind::Document(_)));
    assert!(forwarded[0].payload.is_none());

    assert_eq!(forwarded[1].uri, "/init.mp4");
    assert!(matches!(forwarded[1].payload, Some(Payload::Bytes(ref b)) if b.as_ref() == &[1u8, 2, 3][..]));

    assert_eq!(forwarded[2].uri, "/low/01.ts");
    assert_eq!(forwarded[2].parent_uri.as_deref(), Some("/low/index.m3u8"));
    assert!(forwarded[2].payload.is_none());
}

#[tokio::test]
async fn empty_upstream_writes_nothing() {
    let store = MemoryStore::new();
    let summary = stage(&store)
        .run(stream::iter(Vec::<Artifact>::new()))
        .await
        .unwrap();
    assert_eq!(summary, TransferSummary::default());
    assert!(store.calls().is_empty());
}
