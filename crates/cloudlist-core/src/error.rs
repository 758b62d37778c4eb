//! Error types for Cloudlist core operations.
//!
//! Errors are grouped by domain. Storage failures keep enough structure for
//! callers to tell an expired session (re-authenticate) apart from a missing
//! file (tell the user) and from everything else (generic failure banner).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad error category, used by front ends to pick a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The storage service rejected our credentials.
    AuthExpired,
    /// A remote folder or file does not exist.
    NotFound,
    /// Any other storage or network failure.
    TransientIo,
    /// Invalid use of a playlist edit session.
    Playlist,
    /// Bad or unreadable configuration.
    Configuration,
    /// Local file system failure.
    FileSystem,
    /// JSON (de)serialization failure.
    Serialization,
}

/// Failures reported by a storage client.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The service answered "unauthorized" or no usable token is available.
    #[error("Authentication expired, please sign in again")]
    AuthExpired,

    /// The requested folder or file does not exist.
    #[error("Not found: {id}")]
    NotFound {
        /// Identifier of the missing folder or file.
        id: String,
    },

    /// Any other non-success response or transport failure.
    #[error("{}", transient_message(.status, .message))]
    Transient {
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },
}

fn transient_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Storage request failed with status {code}: {message}"),
        None => format!("Storage request failed: {message}"),
    }
}

/// Errors raised by playlist edit sessions.
#[derive(Debug, Error)]
pub enum PlaylistError {
    /// A save was requested while another one is still in flight.
    #[error("A save is already in progress for this playlist")]
    SaveInProgress,

    /// A reorder index does not address an existing item.
    #[error("Index {index} is out of range for a playlist of {len} items")]
    IndexOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of items in the playlist.
        len: usize,
    },

    /// The track is not part of the playlist.
    #[error("Track not in playlist: {path}")]
    TrackNotFound {
        /// Path of the missing track.
        path: String,
    },

    /// A playlist name cannot be used.
    #[error("Invalid playlist name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The session has no remote file to save to.
    #[error("No playlist file is loaded")]
    NotLoaded,
}

/// Errors that can occur in Cloudlist core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage client failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Playlist session failure.
    #[error(transparent)]
    Playlist(#[from] PlaylistError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// File system operation failed.
    #[error("File system error at {path}: {message}")]
    FileSystem {
        /// Path where the error occurred.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a transient storage error.
    pub fn transient(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Storage(StorageError::Transient {
            status,
            message: message.into(),
        })
    }

    /// Create a not-found storage error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::Storage(StorageError::NotFound { id: id.into() })
    }

    /// Create an auth-expired storage error.
    pub const fn auth_expired() -> Self {
        Self::Storage(StorageError::AuthExpired)
    }

    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(StorageError::AuthExpired) => ErrorKind::AuthExpired,
            Self::Storage(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Storage(StorageError::Transient { .. }) => ErrorKind::TransientIo,
            Self::Playlist(_) => ErrorKind::Playlist,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::FileSystem { .. } | Self::Io(_) => ErrorKind::FileSystem,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether the caller should send the user through sign-in again.
    #[must_use]
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self.kind(), ErrorKind::AuthExpired)
    }

    /// Whether repeating the same operation may succeed.
    ///
    /// Only transient storage failures qualify; the core itself never retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::TransientIo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found("folder-123");
        assert_eq!(err.to_string(), "Not found: folder-123");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_transient_display_with_status() {
        let err = Error::transient(Some(503), "Service Unavailable");
        assert_eq!(
            err.to_string(),
            "Storage request failed with status 503: Service Unavailable"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_transient_display_without_status() {
        let err = Error::transient(None, "connection reset");
        assert_eq!(err.to_string(), "Storage request failed: connection reset");
    }

    #[test]
    fn test_auth_expired_is_detectable() {
        let err = Error::auth_expired();
        assert!(err.is_auth_expired());
        assert!(!err.is_retryable());
        assert!(!Error::not_found("x").is_auth_expired());
    }

    #[test]
    fn test_playlist_error_display() {
        let err: Error = PlaylistError::IndexOutOfRange { index: 4, len: 2 }.into();
        assert_eq!(
            err.to_string(),
            "Index 4 is out of range for a playlist of 2 items"
        );
        assert_eq!(err.kind(), ErrorKind::Playlist);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::FileSystem);
    }
}
