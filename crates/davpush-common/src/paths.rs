//! Destination path resolution.
//!
//! Turns an artifact URI into a path under the remote root. Two addressing
//! schemes exist: URIs relative to the referencing playlist
//! ([`AddressingMode::ByReferrer`]) and absolute local file paths addressed
//! relative to the input directory ([`AddressingMode::ByLocalRoot`]).
//!
//! All path math here is lexical. Nothing touches the remote store, and the
//! local filesystem is only consulted through [`LocalFs`].
//!
//! # Examples
//!
//! ```
//! use davpush_common::paths::normalize_to_root_relative;
//!
//! assert_eq!(normalize_to_root_relative("/abc/../def/").as_deref(), Some("./def/"));
//! assert_eq!(normalize_to_root_relative("../abc"), None);
//! ```

use std::path::Path;

use url::Url;

use crate::artifact::AddressingMode;
use crate::error::{Error, Result};

/// Marker every root-relative path starts with.
pub const ROOT_MARKER: &str = "./";

/// What [`parse_location`] does when a string is neither an absolute URL nor
/// resolvable against a base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseFallback {
    /// Treat the input as an opaque path. Parsing never fails.
    #[default]
    OpaquePath,
    /// Give up; callers surface [`Error::UnresolvableLocation`].
    Reject,
}

/// A parsed artifact location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A fully qualified URL.
    Url(Url),
    /// A path-only location with no scheme or authority.
    Opaque(String),
}

impl Location {
    /// The path component. File URLs are decoded to their filesystem form.
    pub fn path(&self) -> String {
        match self {
            Self::Url(url) if url.scheme() == "file" => url
                .to_file_path()
                .ok()
                .and_then(|p| p.to_str().map(str::to_string))
                .unwrap_or_else(|| url.path().to_string()),
            Self::Url(url) => url.path().to_string(),
            Self::Opaque(raw) => strip_query_and_fragment(raw).to_string(),
        }
    }

    pub fn href(&self) -> &str {
        match self {
            Self::Url(url) => url.as_str(),
            Self::Opaque(raw) => raw,
        }
    }

    pub fn is_file_url(&self) -> bool {
        matches!(self, Self::Url(url) if url.scheme() == "file")
    }

    /// Drop any query string and fragment.
    pub fn without_query_and_fragment(self) -> Self {
        match self {
            Self::Url(mut url) => {
                url.set_query(None);
                url.set_fragment(None);
                Self::Url(url)
            }
            Self::Opaque(raw) => Self::Opaque(strip_query_and_fragment(&raw).to_string()),
        }
    }

    /// Resolve `reference` against this location, the way a player resolves
    /// a playlist entry against the playlist URL.
    pub fn join(&self, reference: &str) -> Option<Location> {
        match self {
            Self::Url(url) => url.join(reference).ok().map(Location::Url),
            Self::Opaque(base) => {
                if reference.starts_with('/') {
                    return Some(Self::Opaque(reference.to_string()));
                }
                let base = strip_query_and_fragment(base);
                let dir = match base.rfind('/') {
                    Some(idx) => &base[..=idx],
                    None => "",
                };
                Some(Self::Opaque(format!("{dir}{reference}")))
            }
        }
    }
}

/// Filesystem existence checks, injectable for tests.
pub trait LocalFs: Send + Sync {
    /// Whether `path` exists as a regular file.
    fn is_file(&self, path: &Path) -> bool;
}

/// [`LocalFs`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl LocalFs for StdFs {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Parse `raw` as an absolute URL, then relative to `base`, then per `fallback`.
pub fn parse_location(
    raw: &str,
    base: Option<&Location>,
    fallback: ParseFallback,
) -> Option<Location> {
    if let Ok(url) = Url::parse(raw) {
        return Some(Location::Url(url));
    }

    if let Some(location) = base.and_then(|base| base.join(raw)) {
        return Some(location);
    }

    match fallback {
        ParseFallback::OpaquePath => Some(Location::Opaque(raw.to_string())),
        ParseFallback::Reject => None,
    }
}

/// Path component of `raw`, which may be a URL or a bare path.
pub fn path_from_url(raw: &str) -> String {
    parse_location(raw, None, ParseFallback::OpaquePath)
        .map(|location| location.path())
        .unwrap_or_else(|| raw.to_string())
}

/// Result of lexically normalizing a `/`-separated path.
struct Lexical<'a> {
    absolute: bool,
    trailing: bool,
    segments: Vec<&'a str>,
    /// A `..` tried to climb above the start of the path.
    escapes: bool,
}

fn lexical(path: &str) -> Lexical<'_> {
    let mut segments: Vec<&str> = Vec::new();
    let mut escapes = false;

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ => escapes = true,
            },
            other => segments.push(other),
        }
    }

    Lexical {
        absolute: path.starts_with('/'),
        trailing: path.ends_with('/'),
        segments,
        escapes,
    }
}

/// Normalize `path` into a root-relative path starting with `./`.
///
/// Returns `None` when a `..` segment would climb above the root, whether or
/// not the input was absolute. A trailing `/` survives normalization. The
/// empty string, `/`, `.` and `./` all map to `./`.
pub fn normalize_to_root_relative(path: &str) -> Option<String> {
    let lex = lexical(path);
    if lex.escapes {
        return None;
    }
    if lex.segments.is_empty() {
        return Some(ROOT_MARKER.to_string());
    }

    let mut out = format!("{ROOT_MARKER}{}", lex.segments.join("/"));
    if lex.trailing {
        out.push('/');
    }
    Some(out)
}

/// Root-relative path of a URL or bare path.
pub fn root_relative_path(raw: &str) -> Option<String> {
    normalize_to_root_relative(&path_from_url(raw))
}

/// Join a root-relative path onto the remote root, collapsing duplicate
/// separators and dot segments.
pub fn join_remote(root: &str, relative: &str) -> String {
    let joined = format!("{root}/{relative}");
    let lex = lexical(&joined);

    let mut out = String::with_capacity(joined.len());
    if lex.absolute {
        out.push('/');
    }
    out.push_str(&lex.segments.join("/"));
    if lex.trailing && !lex.segments.is_empty() {
        out.push('/');
    }
    if out.is_empty() {
        out.push('.');
    }
    out
}

/// Derive the remote root from an explicit root path or the URL's path,
/// always absolute.
pub fn remote_root(root_path: Option<&str>, url: &Url) -> String {
    let root = root_path.unwrap_or_else(|| url.path());
    if root.starts_with('/') {
        root.to_string()
    } else {
        format!("/{root}")
    }
}

pub fn strip_query_and_fragment(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    &raw[..end]
}

/// Fixed inputs for destination resolution, shared by every artifact a
/// writer handles.
#[derive(Debug, Clone)]
pub struct ResolveContext<'a> {
    /// Absolute remote path prefix.
    pub root: &'a str,
    /// Local directory the artifacts were produced under.
    pub input_dir: Option<&'a Path>,
    /// Base for relative URIs that have no referring playlist.
    pub base: Option<&'a Location>,
    pub fallback: ParseFallback,
}

/// Compute the remote destination path for one artifact.
pub fn resolve_destination(
    uri: &str,
    parent_uri: Option<&str>,
    addressing: AddressingMode,
    ctx: &ResolveContext<'_>,
    fs: &dyn LocalFs,
) -> Result<String> {
    match addressing {
        AddressingMode::ByLocalRoot => resolve_local(uri, ctx, fs),
        AddressingMode::ByReferrer => resolve_by_referrer(uri, parent_uri, ctx),
    }
}

fn resolve_local(uri: &str, ctx: &ResolveContext<'_>, fs: &dyn LocalFs) -> Result<String> {
    let local = strip_query_and_fragment(uri);
    let path = Path::new(local);

    // A materialized file is flattened onto the root. Only absolute URIs
    // name a local file.
    if path.is_absolute() && fs.is_file(path) {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            tracing::trace!(uri, name, "Local file flattened to root");
            return Ok(join_remote(ctx.root, name));
        }
    }

    let relative = relative_to_input(local, ctx.input_dir);
    to_destination(uri, relative.as_deref().unwrap_or(local), ctx.root)
}

fn resolve_by_referrer(
    uri: &str,
    parent_uri: Option<&str>,
    ctx: &ResolveContext<'_>,
) -> Result<String> {
    let parent = match parent_uri {
        Some(parent) => parse_location(parent, ctx.base, ctx.fallback),
        None => None,
    };
    let base = parent.as_ref().or(ctx.base);

    let location = parse_location(uri, base, ctx.fallback)
        .ok_or_else(|| Error::unresolvable(uri))?
        .without_query_and_fragment();

    let path = location.path();
    let relative = if location.is_file_url() {
        relative_to_input(&path, ctx.input_dir)
    } else {
        None
    };

    to_destination(uri, relative.as_deref().unwrap_or(&path), ctx.root)
}

fn relative_to_input(path: &str, input_dir: Option<&Path>) -> Option<String> {
    let input_dir = input_dir?;
    let relative = Path::new(path).strip_prefix(input_dir).ok()?.to_str()?;

    let mut relative = relative.to_string();
    if path.ends_with('/') && !relative.is_empty() {
        relative.push('/');
    }
    Some(relative)
}

fn to_destination(uri: &str, path: &str, root: &str) -> Result<String> {
    let relative =
        normalize_to_root_relative(path).ok_or_else(|| Error::path_traversal(uri, path))?;
    Ok(join_remote(root, &relative))
}
