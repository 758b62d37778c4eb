//! Playlist file codec.
//!
//! Playlists are extended-M3U files whose second line is a manifest:
//!
//! ```text
//! #EXTM3U
//! Container=<Morning+Show>C:\audio\a.mp3|C:\audio\b.wav
//! ```
//!
//! The container name is percent-encoded with `+` standing in for spaces.
//! Paths are written verbatim and joined with `|`.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// First line of every playlist file.
pub const FORMAT_HEADER: &str = "#EXTM3U";

/// Prefix of the manifest line, up to the opening bracket of the name.
const MANIFEST_PREFIX: &str = "Container=<";

/// Closing bracket of the container name.
const NAME_TERMINATOR: char = '>';

/// Separator between track paths in the manifest line.
const PATH_SEPARATOR: char = '|';

/// Name written when a document has no container name.
pub const DEFAULT_CONTAINER_NAME: &str = "Untitled";

/// A single track entry of a playlist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TrackRef {
    /// Full path of the audio file, unique within a playlist.
    pub path: String,
    /// File name without directory and extension.
    pub display_name: String,
}

impl TrackRef {
    /// Create a track reference, deriving its display name from the path.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let display_name = display_name(&path);
        Self { path, display_name }
    }
}

/// In-memory form of a playlist file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistDocument {
    /// Human-readable playlist label.
    pub container_name: String,
    /// Tracks in playback order.
    pub items: Vec<TrackRef>,
}

impl PlaylistDocument {
    /// Create a document from a name and a list of paths.
    pub fn new<I, S>(container_name: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            container_name: container_name.into(),
            items: paths.into_iter().map(TrackRef::new).collect(),
        }
    }

    /// Number of tracks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the playlist has no tracks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Position of the track with the given path.
    #[must_use]
    pub fn position(&self, path: &str) -> Option<usize> {
        self.items.iter().position(|item| item.path == path)
    }

    /// Whether a track with the given path is present.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.position(path).is_some()
    }

    /// Paths in playlist order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.path.as_str())
    }
}

/// Check whether raw text starts with the playlist format header.
#[must_use]
pub fn is_playlist_text(raw: &str) -> bool {
    raw.lines()
        .next()
        .is_some_and(|line| line.trim() == FORMAT_HEADER)
}

/// Parse playlist text.
///
/// Never fails: text without a manifest line yields an empty document, and
/// lines that are not understood are skipped.
#[must_use]
pub fn decode(raw: &str) -> PlaylistDocument {
    let Some((name, paths)) = raw.lines().find_map(parse_manifest_line) else {
        debug!("No manifest line found, decoding as empty playlist");
        return PlaylistDocument::default();
    };

    let items = paths
        .split(PATH_SEPARATOR)
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(TrackRef::new)
        .collect();

    PlaylistDocument {
        container_name: decode_name(name),
        items,
    }
}

/// Render a document as playlist text.
///
/// A document without tracks is written as the bare header: the manifest
/// line, and with it the container name, is dropped. Existing files rely on
/// this shape, so it is kept as is.
#[must_use]
pub fn encode(doc: &PlaylistDocument) -> String {
    if doc.items.is_empty() {
        return format!("{FORMAT_HEADER}\n");
    }

    let name = if doc.container_name.is_empty() {
        DEFAULT_CONTAINER_NAME
    } else {
        doc.container_name.as_str()
    };
    let joined = doc.paths().collect::<Vec<_>>().join("|");

    format!(
        "{FORMAT_HEADER}\n{MANIFEST_PREFIX}{}{NAME_TERMINATOR}{joined}\n",
        encode_name(name)
    )
}

/// Derive a display name from a track path.
///
/// Takes the last non-empty segment (splitting on both `\` and `/`) and
/// strips its extension. Dot files such as `.hidden` keep their full name.
#[must_use]
pub fn display_name(path: &str) -> String {
    let file_name = path
        .rsplit(['\\', '/'])
        .find(|segment| !segment.is_empty())
        .unwrap_or("");

    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name[..idx].to_string(),
        _ => file_name.to_string(),
    }
}

/// Split a manifest line into its raw name and raw path list.
fn parse_manifest_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_end_matches('\r').strip_prefix(MANIFEST_PREFIX)?;
    rest.split_once(NAME_TERMINATOR)
}

fn decode_name(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(name) => name.into_owned(),
        Err(e) => {
            debug!("Container name is not valid UTF-8 after decoding: {}", e);
            spaced
        }
    }
}

fn encode_name(name: &str) -> String {
    urlencoding::encode(name).replace("%20", "+")
}
