//! Davpush-HLS: structured HLS playlists for the transfer pipeline.
//!
//! Playlists travel through davpush as structured documents and are only
//! rendered to M3U8 text immediately before they are written. The
//! [`Document`](davpush_common::Document) implementations here provide that
//! rendering.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use davpush_common::{Artifact, Document};
//! use davpush_hls::{MediaPlaylist, SegmentEntry};
//!
//! let mut playlist = MediaPlaylist::vod(10);
//! playlist.segments.push(SegmentEntry::new(9.009, "low/01.ts"));
//!
//! let text = playlist.stringify();
//! assert!(text.starts_with("#EXTM3U"));
//!
//! let artifact = Artifact::document("low.m3u8", Arc::new(playlist));
//! assert!(artifact.is_document());
//! ```

mod playlist;

pub use playlist::{MasterPlaylist, MediaPlaylist, PlaylistType, SegmentEntry, StreamInfo};
