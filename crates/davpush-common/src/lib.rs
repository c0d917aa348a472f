//! Davpush-Common: artifact model, errors, and destination path resolution.
//!
//! This crate provides the pieces of davpush that do no I/O of their own:
//!
//! - **Artifacts**: playlists and segments with a closed payload union
//! - **Path Resolution**: mapping artifact URIs onto the remote root
//! - **Error Handling**: common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use davpush_common::paths::{resolve_destination, ParseFallback, ResolveContext, StdFs};
//! use davpush_common::AddressingMode;
//!
//! let ctx = ResolveContext {
//!     root: "/dest/",
//!     input_dir: None,
//!     base: None,
//!     fallback: ParseFallback::OpaquePath,
//! };
//! let dest = resolve_destination(
//!     "02.ts",
//!     Some("http://media.example.com/low/index.m3u8?session=1"),
//!     AddressingMode::ByReferrer,
//!     &ctx,
//!     &StdFs,
//! )
//! .unwrap();
//! assert_eq!(dest, "/dest/low/02.ts");
//! ```

pub mod artifact;
pub mod error;
pub mod paths;

pub use artifact::{
    AddressingMode, Artifact, ArtifactKind, ByteStream, Document, Payload, WriteRequest,
};
pub use error::{BoxError, Error, Result};
pub use paths::{Location, LocalFs, ParseFallback, ResolveContext, StdFs};
