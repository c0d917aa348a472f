//! davpush - relocate HLS packaging output onto a WebDAV server
//!
//! Artifacts produced by a packager (playlists, init segments, media
//! segments) flow through a [`stage::TransferStage`], which hands each one
//! to a [`writer::RemoteWriter`]. The writer maps the artifact's URI to a
//! path under the remote root and stores its payload through a
//! [`store::RemoteStore`].
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod local;
pub mod stage;
pub mod store;
pub mod writer;

pub use stage::{TransferStage, TransferSummary};
pub use store::{MemoryStore, RemoteStore, WebDavAuth, WebDavStore};
pub use writer::{RemoteWriter, WriterOptions};
