//! `Cloudlist` Core Library
//!
//! This crate provides the core functionality for the `Cloudlist` application:
//! - The playlist file codec (extended M3U with a `Container=` manifest line)
//! - Playlist edit sessions with add, remove, reorder, save and reset
//! - A storage client abstraction with local-folder and Drive backends
//! - Access token storage and the expiry extension policy
//! - Audio directory configuration and track path templates
//!
//! # Error Handling
//!
//! All fallible operations return [`Result`]. Storage failures are
//! categorized so callers can detect expired credentials:
//!
//! ```rust,ignore
//! use cloudlist_core::{Catalog, Result};
//!
//! fn remove_track(catalog: &Catalog<dyn StorageClient>, id: &str, path: &str) -> Result<()> {
//!     let mut session = catalog.open(id)?;
//!     session.remove(path);
//!     session.save()
//! }
//! ```

pub mod auth;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod drive;
pub mod error;
pub mod library;
pub mod session;
pub mod storage;

pub use auth::{
    AccessToken, DEFAULT_EXPIRY_WINDOW_SECS, DEFAULT_EXTENSION_SECS, ExpiryPolicy,
    FileTokenStore, MemoryTokenStore, TokenStore, extend_if_near_expiry, unix_now,
};
pub use catalog::{Catalog, validate_playlist_name};
pub use codec::{
    DEFAULT_CONTAINER_NAME, FORMAT_HEADER, PlaylistDocument, TrackRef, decode, display_name,
    encode, is_playlist_text,
};
pub use config::{AppConfig, ConfigManager, StorageBackend, config_file_path, default_token_file};
pub use drive::{DEFAULT_API_BASE, DriveClient, classify_status};
pub use error::{Error, ErrorKind, PlaylistError, Result, StorageError};
pub use library::{
    AUDIO_FILENAME_TOKEN, DEFAULT_FALLBACK_PREFIX, DirectoryConfig, filter_audio_files,
    filter_playlist_files, is_audio_file, is_playlist_file, resolve_track_path,
};
pub use session::{EditSession, PendingSave};
pub use storage::{FileMeta, LocalFolderStorage, ROOT_FOLDER_ID, StorageClient};
