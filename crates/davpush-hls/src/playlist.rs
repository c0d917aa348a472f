//! HLS playlist structures.

use std::fmt::Write;

use davpush_common::Document;

/// Media playlist for a single rendition.
#[derive(Debug, Clone)]
pub struct MediaPlaylist {
    /// Target duration in seconds.
    pub target_duration: u32,
    /// Media sequence number of the first segment.
    pub media_sequence: u64,
    /// Discontinuity sequence number.
    pub discontinuity_sequence: u64,
    /// Playlist type (VOD, EVENT, or live without a type tag).
    pub playlist_type: PlaylistType,
    /// Init segment URI.
    pub init_uri: Option<String>,
    /// Segment entries.
    pub segments: Vec<SegmentEntry>,
    /// Whether this is an ended playlist.
    pub ended: bool,
}

impl MediaPlaylist {
    /// Create a new VOD playlist.
    pub fn vod(target_duration: u32) -> Self {
        Self {
            target_duration,
            media_sequence: 0,
            discontinuity_sequence: 0,
            playlist_type: PlaylistType::Vod,
            init_uri: None,
            segments: Vec::new(),
            ended: true,
        }
    }

    /// Create a live playlist starting at `media_sequence`. Live playlists
    /// are re-published as segments are appended.
    pub fn live(target_duration: u32, media_sequence: u64) -> Self {
        Self {
            target_duration,
            media_sequence,
            discontinuity_sequence: 0,
            playlist_type: PlaylistType::Live,
            init_uri: None,
            segments: Vec::new(),
            ended: false,
        }
    }

    /// URIs this playlist references, init segment first.
    pub fn referenced_uris(&self) -> impl Iterator<Item = &str> {
        self.init_uri
            .as_deref()
            .into_iter()
            .chain(self.segments.iter().map(|s| s.uri.as_str()))
    }

    /// Render to M3U8 string.
    pub fn render(&self) -> String {
        let mut out = String::new();

        writeln!(out, "#EXTM3U").unwrap();
        writeln!(out, "#EXT-X-VERSION:{}", self.version()).unwrap();
        writeln!(out, "#EXT-X-TARGETDURATION:{}", self.target_duration).unwrap();
        writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", self.media_sequence).unwrap();
        if self.discontinuity_sequence > 0 {
            writeln!(
                out,
                "#EXT-X-DISCONTINUITY-SEQUENCE:{}",
                self.discontinuity_sequence
            )
            .unwrap();
        }

        match self.playlist_type {
            PlaylistType::Vod => writeln!(out, "#EXT-X-PLAYLIST-TYPE:VOD").unwrap(),
            PlaylistType::Event => writeln!(out, "#EXT-X-PLAYLIST-TYPE:EVENT").unwrap(),
            PlaylistType::Live => {}
        }

        if let Some(ref init_uri) = self.init_uri {
            writeln!(out, "#EXT-X-MAP:URI=\"{}\"", init_uri).unwrap();
        }

        for segment in &self.segments {
            if segment.discontinuity {
                writeln!(out, "#EXT-X-DISCONTINUITY").unwrap();
            }
            if let Some((offset, length)) = segment.byte_range {
                writeln!(out, "#EXT-X-BYTERANGE:{}@{}", length, offset).unwrap();
            }
            let title = segment.title.as_deref().unwrap_or("");
            writeln!(out, "#EXTINF:{:.3},{}", segment.duration, title).unwrap();
            writeln!(out, "{}", segment.uri).unwrap();
        }

        if self.ended {
            writeln!(out, "#EXT-X-ENDLIST").unwrap();
        }

        out
    }

    // EXT-X-MAP needs version 6; byte ranges need 4.
    fn version(&self) -> u8 {
        if self.init_uri.is_some() {
            6
        } else if self.segments.iter().any(|s| s.byte_range.is_some()) {
            4
        } else {
            3
        }
    }
}

impl Document for MediaPlaylist {
    fn stringify(&self) -> String {
        self.render()
    }
}

/// Playlist type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistType {
    Vod,
    Event,
    Live,
}

/// A segment entry in the playlist.
#[derive(Debug, Clone)]
pub struct SegmentEntry {
    /// Duration in seconds.
    pub duration: f64,
    /// Segment URI, usually relative to the playlist.
    pub uri: String,
    /// Optional title.
    pub title: Option<String>,
    /// Discontinuity before this segment.
    pub discontinuity: bool,
    /// Byte range (offset, length).
    pub byte_range: Option<(u64, u64)>,
}

impl SegmentEntry {
    pub fn new(duration: f64, uri: impl Into<String>) -> Self {
        Self {
            duration,
            uri: uri.into(),
            title: None,
            discontinuity: false,
            byte_range: None,
        }
    }
}

/// Master playlist with multiple renditions.
#[derive(Debug, Clone, Default)]
pub struct MasterPlaylist {
    /// Stream variants.
    pub streams: Vec<StreamInfo>,
}

impl MasterPlaylist {
    /// Create a new master playlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stream variant.
    pub fn add_stream(mut self, stream: StreamInfo) -> Self {
        self.streams.push(stream);
        self
    }

    /// Variant playlist URIs, in declaration order.
    pub fn variant_uris(&self) -> impl Iterator<Item = &str> {
        self.streams.iter().map(|s| s.uri.as_str())
    }

    /// Render to M3U8 string.
    pub fn render(&self) -> String {
        let mut out = String::new();

        writeln!(out, "#EXTM3U").unwrap();

        for stream in &self.streams {
            write!(out, "#EXT-X-STREAM-INF:BANDWIDTH={}", stream.bandwidth).unwrap();

            if let Some(average) = stream.average_bandwidth {
                write!(out, ",AVERAGE-BANDWIDTH={}", average).unwrap();
            }

            if let Some((width, height)) = stream.resolution {
                write!(out, ",RESOLUTION={}x{}", width, height).unwrap();
            }

            if !stream.codecs.is_empty() {
                write!(out, ",CODECS=\"{}\"", stream.codecs).unwrap();
            }

            if let Some(frame_rate) = stream.frame_rate {
                write!(out, ",FRAME-RATE={:.3}", frame_rate).unwrap();
            }

            writeln!(out).unwrap();
            writeln!(out, "{}", stream.uri).unwrap();
        }

        out
    }
}

impl Document for MasterPlaylist {
    fn stringify(&self) -> String {
        self.render()
    }
}

/// Stream variant information.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Variant playlist URI.
    pub uri: String,
    /// Peak bandwidth in bits per second.
    pub bandwidth: u32,
    pub average_bandwidth: Option<u32>,
    /// Video width and height.
    pub resolution: Option<(u32, u32)>,
    /// Codec string (e.g., "avc1.640029,mp4a.40.2").
    pub codecs: String,
    pub frame_rate: Option<f64>,
}

impl StreamInfo {
    pub fn new(uri: impl Into<String>, bandwidth: u32) -> Self {
        Self {
            uri: uri.into(),
            bandwidth,
            average_bandwidth: None,
            resolution: None,
            codecs: String::new(),
            frame_rate: None,
        }
    }
}
