//! Playlist catalog.
//!
//! Browses the playlists folder and the configured audio directories of a
//! store, creates new playlist files and opens edit sessions on them.

use std::sync::Arc;

use tracing::{debug, info};

use crate::codec::{PlaylistDocument, encode};
use crate::config::AppConfig;
use crate::error::{Error, PlaylistError, Result};
use crate::library::{
    DirectoryConfig, PLAYLIST_EXTENSION, filter_audio_files, filter_playlist_files,
};
use crate::session::EditSession;
use crate::storage::{FileMeta, StorageClient};

/// Longest accepted playlist name, in bytes.
const MAX_NAME_LEN: usize = 255;

/// Entry point for browsing and creating playlists in one store.
pub struct Catalog<S: StorageClient + ?Sized> {
    storage: Arc<S>,
    playlists_folder_id: String,
    directories: Vec<DirectoryConfig>,
    fallback_prefix: String,
}

impl<S: StorageClient + ?Sized> Catalog<S> {
    /// Create a catalog over `storage`.
    pub fn new(
        storage: Arc<S>,
        playlists_folder_id: impl Into<String>,
        directories: Vec<DirectoryConfig>,
        fallback_prefix: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            playlists_folder_id: playlists_folder_id.into(),
            directories,
            fallback_prefix: fallback_prefix.into(),
        }
    }

    /// Create a catalog using the folders and directories of `config`.
    pub fn from_config(storage: Arc<S>, config: &AppConfig) -> Self {
        Self::new(
            storage,
            config.playlists_folder_id.clone(),
            config.directories.clone(),
            config.fallback_path_prefix.clone(),
        )
    }

    /// Folder holding the playlists.
    #[must_use]
    pub fn playlists_folder_id(&self) -> &str {
        &self.playlists_folder_id
    }

    /// Prefix for tracks added without a directory.
    #[must_use]
    pub fn fallback_prefix(&self) -> &str {
        &self.fallback_prefix
    }

    /// Configured audio directories.
    #[must_use]
    pub fn directories(&self) -> &[DirectoryConfig] {
        &self.directories
    }

    /// Look up a directory by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no directory has that name.
    pub fn directory(&self, name: &str) -> Result<&DirectoryConfig> {
        self.directories
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::Configuration(format!("Unknown directory: {name}")))
    }

    /// List playlist files in the playlists folder.
    ///
    /// # Errors
    ///
    /// Returns the storage client's error if the folder cannot be listed.
    pub fn playlists(&self) -> Result<Vec<FileMeta>> {
        let files = self.storage.list_files(&self.playlists_folder_id)?;
        let playlists = filter_playlist_files(files);
        debug!("Found {} playlists", playlists.len());
        Ok(playlists)
    }

    /// List audio files of a configured directory.
    ///
    /// # Errors
    ///
    /// Returns the storage client's error if the folder cannot be listed.
    pub fn audio_files(&self, directory: &DirectoryConfig) -> Result<Vec<FileMeta>> {
        let files = self.storage.list_files(&directory.folder_id)?;
        let audio = filter_audio_files(files);
        debug!("Found {} audio files in {}", audio.len(), directory.name);
        Ok(audio)
    }

    /// Create an empty playlist file named after `name`.
    ///
    /// The `.m3u8` extension is appended unless already present.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for unusable names, or the storage client's error.
    pub fn create_playlist(&self, name: &str) -> Result<FileMeta> {
        let name = name.trim();
        validate_playlist_name(name)?;

        let file_name = if name.ends_with(PLAYLIST_EXTENSION) {
            name.to_string()
        } else {
            format!("{name}{PLAYLIST_EXTENSION}")
        };
        let content = encode(&PlaylistDocument::default());
        let meta = self
            .storage
            .create_file(&file_name, &self.playlists_folder_id, &content)?;

        info!("Created playlist: {} ({})", meta.name, meta.id);
        Ok(meta)
    }

    /// Open an edit session on a playlist file.
    ///
    /// # Errors
    ///
    /// Returns the storage client's error if the file cannot be fetched.
    pub fn open(&self, file_id: &str) -> Result<EditSession<S>> {
        EditSession::open(Arc::clone(&self.storage), file_id)
    }
}

/// Validate a playlist name.
///
/// # Errors
///
/// Returns `InvalidName` if the name is empty, too long or contains
/// characters that are not allowed in file names.
pub fn validate_playlist_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| -> Error {
        PlaylistError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }
        .into()
    };

    if name.is_empty() {
        return Err(invalid("Playlist name cannot be empty"));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(invalid("Playlist name too long"));
    }

    let invalid_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];
    if name.chars().any(|c| invalid_chars.contains(&c)) {
        return Err(invalid("Playlist name contains invalid characters"));
    }

    Ok(())
}
