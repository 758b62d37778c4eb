//! Storage client abstraction.
//!
//! Playlists and audio files live in a remote file store addressed by opaque
//! folder and file identifiers. The [`StorageClient`] trait is the only way
//! the rest of the crate talks to it, so sessions can be tested against an
//! in-memory store and run against either the local folder backend or the
//! Drive REST backend.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// MIME type reported for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// MIME type used for playlist files.
pub const PLAYLIST_MIME_TYPE: &str = "audio/x-mpegurl";

/// Folder identifier that always denotes the top of the store.
pub const ROOT_FOLDER_ID: &str = "root";

/// Metadata of a remote file or folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    /// Opaque identifier used for subsequent requests.
    pub id: String,
    /// File name, including extension.
    pub name: String,
    /// MIME type as reported by the store.
    pub mime_type: String,
    /// Size in bytes, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Last modification time, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
}

impl FileMeta {
    /// Whether this entry is a folder.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// Operations the playlist core needs from a file store.
///
/// All methods fail with [`crate::StorageError`] kinds so callers can react
/// to expired credentials and missing files specifically.
#[cfg_attr(test, mockall::automock)]
pub trait StorageClient: Send + Sync {
    /// List every entry of a folder. Pagination is handled internally.
    fn list_files(&self, folder_id: &str) -> Result<Vec<FileMeta>>;

    /// Read a file's contents as text.
    fn get_file_content(&self, file_id: &str) -> Result<String>;

    /// Overwrite a file's contents.
    fn update_file(&self, file_id: &str, content: &str) -> Result<()>;

    /// Create a new file in a folder.
    fn create_file(&self, name: &str, parent_folder_id: &str, content: &str) -> Result<FileMeta>;
}

/// Converts an I/O error into a storage error for the given identifier.
fn io_error(id: &str, e: &io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::not_found(id)
    } else {
        Error::transient(None, format!("{id}: {e}"))
    }
}

/// Storage backed by a directory on the local file system.
///
/// Identifiers are `/`-separated paths relative to the root directory;
/// `"root"` and the empty string denote the root itself.
#[derive(Debug, Clone)]
pub struct LocalFolderStorage {
    root: PathBuf,
}

impl LocalFolderStorage {
    /// Create a local storage rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created.
    pub fn new(root: PathBuf) -> Result<Self> {
        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| Error::FileSystem {
                path: root.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(Self { root })
    }

    /// Root directory of this store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an identifier to a path under the root.
    ///
    /// Identifiers that would escape the root are reported as missing.
    fn resolve(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id == ROOT_FOLDER_ID {
            return Ok(self.root.clone());
        }
        let relative = Path::new(id);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(Error::not_found(id));
        }
        Ok(self.root.join(relative))
    }

    fn child_id(folder_id: &str, name: &str) -> String {
        if folder_id.is_empty() || folder_id == ROOT_FOLDER_ID {
            name.to_string()
        } else {
            format!("{}/{name}", folder_id.trim_end_matches('/'))
        }
    }

    fn mime_type_for(path: &Path) -> String {
        if path.is_dir() {
            return FOLDER_MIME_TYPE.to_string();
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "m3u8" => PLAYLIST_MIME_TYPE,
            _ => "application/octet-stream",
        }
        .to_string()
    }

    fn meta_for(folder_id: &str, path: &Path) -> Option<FileMeta> {
        let name = path.file_name()?.to_str()?.to_string();
        let metadata = fs::metadata(path).ok();
        let size = metadata
            .as_ref()
            .filter(|m| m.is_file())
            .map(std::fs::Metadata::len);
        let modified_time = metadata
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs().to_string());

        Some(FileMeta {
            id: Self::child_id(folder_id, &name),
            mime_type: Self::mime_type_for(path),
            name,
            size,
            modified_time,
        })
    }
}

impl StorageClient for LocalFolderStorage {
    fn list_files(&self, folder_id: &str) -> Result<Vec<FileMeta>> {
        let dir = self.resolve(folder_id)?;
        if !dir.is_dir() {
            return Err(Error::not_found(folder_id));
        }
        let entries = fs::read_dir(&dir).map_err(|e| io_error(folder_id, &e))?;

        let mut files: Vec<FileMeta> = entries
            .flatten()
            .filter_map(|entry| Self::meta_for(folder_id, &entry.path()))
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));

        debug!("Listed {} entries in {}", files.len(), dir.display());
        Ok(files)
    }

    fn get_file_content(&self, file_id: &str) -> Result<String> {
        let path = self.resolve(file_id)?;
        fs::read_to_string(&path).map_err(|e| io_error(file_id, &e))
    }

    fn update_file(&self, file_id: &str, content: &str) -> Result<()> {
        let path = self.resolve(file_id)?;
        if !path.is_file() {
            return Err(Error::not_found(file_id));
        }
        fs::write(&path, content).map_err(|e| io_error(file_id, &e))
    }

    fn create_file(&self, name: &str, parent_folder_id: &str, content: &str) -> Result<FileMeta> {
        let parent = self.resolve(parent_folder_id)?;
        if !parent.is_dir() {
            return Err(Error::not_found(parent_folder_id));
        }
        let id = Self::child_id(parent_folder_id, name);
        let path = self.resolve(&id)?;
        if path.exists() {
            return Err(Error::FileSystem {
                path,
                message: "File already exists".to_string(),
            });
        }
        fs::write(&path, content).map_err(|e| io_error(&id, &e))?;

        Self::meta_for(parent_folder_id, &path).ok_or_else(|| Error::FileSystem {
            path,
            message: "Created file has no usable name".to_string(),
        })
    }
}
