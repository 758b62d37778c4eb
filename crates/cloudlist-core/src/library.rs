//! Audio source directories and recognized file kinds.
//!
//! A directory configuration maps a storage folder holding audio files to
//! the local path those files have on the playback machine. Track paths
//! written into playlists are derived from that local path template.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::FileMeta;

/// Token replaced by the audio file name in a path template.
pub const AUDIO_FILENAME_TOKEN: &str = "{audio_filename}";

/// Prefix used for track paths when no directory is selected.
pub const DEFAULT_FALLBACK_PREFIX: &str = "C:\\Audio\\";

/// Extension of playlist files.
pub const PLAYLIST_EXTENSION: &str = ".m3u8";

/// Extensions of audio files that can be added to playlists.
pub const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav"];

/// A configured source of audio files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// Display name of the category (e.g. "Jingles").
    pub name: String,
    /// Storage folder holding the audio files.
    pub folder_id: String,
    /// Local path with an `{audio_filename}` placeholder.
    pub path_template: String,
}

impl DirectoryConfig {
    /// Create a directory configuration.
    pub fn new(
        name: impl Into<String>,
        folder_id: impl Into<String>,
        path_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            folder_id: folder_id.into(),
            path_template: path_template.into(),
        }
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a field is empty or the template
    /// lacks the file name placeholder.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Configuration(
                "Directory name cannot be empty".to_string(),
            ));
        }
        if self.folder_id.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "Directory '{}' has no storage folder",
                self.name
            )));
        }
        if !self.path_template.contains(AUDIO_FILENAME_TOKEN) {
            return Err(Error::Configuration(format!(
                "Path template for '{}' must contain {AUDIO_FILENAME_TOKEN}",
                self.name
            )));
        }
        Ok(())
    }

    /// Substitute a file name into this directory's template.
    #[must_use]
    pub fn resolve(&self, file_name: &str) -> String {
        self.path_template.replace(AUDIO_FILENAME_TOKEN, file_name)
    }
}

/// Compute the playlist path of an audio file.
///
/// With a directory selected, its template is used; otherwise the file name
/// is appended to `fallback_prefix`. The file name is used verbatim,
/// extension included.
#[must_use]
pub fn resolve_track_path(
    directory: Option<&DirectoryConfig>,
    file_name: &str,
    fallback_prefix: &str,
) -> String {
    match directory {
        Some(dir) => dir.resolve(file_name),
        None => format!("{fallback_prefix}{file_name}"),
    }
}

/// Check if a file name denotes a playlist.
#[must_use]
pub fn is_playlist_file(name: &str) -> bool {
    name.ends_with(PLAYLIST_EXTENSION)
}

/// Check if a file name denotes a supported audio file (case-insensitive).
#[must_use]
pub fn is_audio_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    AUDIO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Keep only audio files, preserving listing order.
pub fn filter_audio_files(files: Vec<FileMeta>) -> Vec<FileMeta> {
    files.into_iter().filter(|f| is_audio_file(&f.name)).collect()
}

/// Keep only playlist files, preserving listing order.
pub fn filter_playlist_files(files: Vec<FileMeta>) -> Vec<FileMeta> {
    files
        .into_iter()
        .filter(|f| is_playlist_file(&f.name))
        .collect()
}
