//! Playlist edit session.
//!
//! A session owns the playlist currently being edited together with the raw
//! text it was loaded from. Edits are applied in memory; `save` writes the
//! encoded document back through the storage client and `reset` throws the
//! edits away by decoding the last known remote text again.
//!
//! Only one save may be outstanding at a time. Callers that upload on
//! another task use [`EditSession::begin_save`] and
//! [`EditSession::finish_save`]; a second `begin_save` in between is rejected.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::codec::{PlaylistDocument, TrackRef, decode, encode};
use crate::error::{Error, PlaylistError, Result};
use crate::library::{DirectoryConfig, resolve_track_path};
use crate::storage::StorageClient;

/// An upload handed out by [`EditSession::begin_save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    file_id: String,
    content: String,
    snapshot: PlaylistDocument,
}

impl PendingSave {
    /// File the content is written to.
    #[must_use]
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// Encoded playlist text to upload.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Editing state for one playlist file.
pub struct EditSession<S: StorageClient + ?Sized> {
    storage: Arc<S>,
    file_id: Option<String>,
    original: String,
    document: PlaylistDocument,
    saving: bool,
}

impl<S: StorageClient + ?Sized> EditSession<S> {
    /// Create a session with no playlist selected.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            file_id: None,
            original: String::new(),
            document: PlaylistDocument::default(),
            saving: false,
        }
    }

    /// Create a session for a remote playlist file and load its contents.
    ///
    /// # Errors
    ///
    /// Returns the storage client's error if the file cannot be fetched.
    pub fn open(storage: Arc<S>, file_id: &str) -> Result<Self> {
        let mut session = Self::new(storage);
        session.select(file_id)?;
        Ok(session)
    }

    /// Switch to another remote playlist file, discarding current edits.
    ///
    /// # Errors
    ///
    /// Returns the storage client's error if the file cannot be fetched. The
    /// current playlist is kept in that case.
    pub fn select(&mut self, file_id: &str) -> Result<()> {
        if self.saving {
            return Err(PlaylistError::SaveInProgress.into());
        }
        let raw = self.storage.get_file_content(file_id)?;
        self.file_id = Some(file_id.to_string());
        self.load(raw);
        debug!(
            "Opened playlist {} with {} tracks",
            file_id,
            self.document.len()
        );
        Ok(())
    }

    /// Replace the session state with freshly fetched playlist text.
    pub fn load(&mut self, raw: impl Into<String>) {
        self.original = raw.into();
        self.document = decode(&self.original);
    }

    /// Append a track unless one with the same path is already present.
    ///
    /// Returns `true` if the track was added.
    pub fn add(&mut self, track: TrackRef) -> bool {
        if self.document.contains(&track.path) {
            debug!("Track already in playlist: {}", track.path);
            return false;
        }
        debug!("Adding track: {}", track.path);
        self.document.items.push(track);
        true
    }

    /// Add an audio file from a source directory.
    ///
    /// The track path is the directory's template applied to `file_name`,
    /// or `fallback_prefix` followed by `file_name` without a directory.
    pub fn add_file(
        &mut self,
        directory: Option<&DirectoryConfig>,
        file_name: &str,
        fallback_prefix: &str,
    ) -> bool {
        let path = resolve_track_path(directory, file_name, fallback_prefix);
        self.add(TrackRef::new(path))
    }

    /// Remove the track with the given path.
    ///
    /// Returns `true` if a track was removed.
    pub fn remove(&mut self, path: &str) -> bool {
        match self.document.position(path) {
            Some(index) => {
                debug!("Removing track: {}", path);
                self.document.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Move the track at `from` so that it ends up at index `to`.
    ///
    /// `[A, B, C]` with `reorder(0, 2)` becomes `[B, C, A]`.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if either index does not address an item;
    /// the playlist is left unchanged.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.document.len();
        for index in [from, to] {
            if index >= len {
                return Err(PlaylistError::IndexOutOfRange { index, len }.into());
            }
        }
        let track = self.document.items.remove(from);
        self.document.items.insert(to, track);
        Ok(())
    }

    /// Move a track, identified by value, to index `to`.
    ///
    /// # Errors
    ///
    /// Returns `TrackNotFound` if the track is not in the playlist, or
    /// `IndexOutOfRange` if `to` is invalid.
    pub fn move_track(&mut self, track: &TrackRef, to: usize) -> Result<()> {
        let from = self
            .document
            .position(&track.path)
            .ok_or_else(|| PlaylistError::TrackNotFound {
                path: track.path.clone(),
            })?;
        self.reorder(from, to)
    }

    /// Change the container name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for a blank name.
    pub fn rename(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlaylistError::InvalidName {
                name: name.to_string(),
                reason: "name cannot be empty".to_string(),
            }
            .into());
        }
        self.document.container_name = name.to_string();
        Ok(())
    }

    /// Discard all edits made since the last load or successful save.
    pub fn reset(&mut self) {
        debug!("Discarding playlist edits");
        self.document = decode(&self.original);
    }

    /// Start a save: mark the session as saving and encode the document.
    ///
    /// # Errors
    ///
    /// Returns `SaveInProgress` if a save is outstanding, or `NotLoaded` if
    /// the session has no remote file.
    pub fn begin_save(&mut self) -> Result<PendingSave> {
        if self.saving {
            return Err(PlaylistError::SaveInProgress.into());
        }
        let file_id = self.file_id.clone().ok_or(PlaylistError::NotLoaded)?;
        self.saving = true;
        Ok(PendingSave {
            file_id,
            content: encode(&self.document),
            snapshot: self.document.clone(),
        })
    }

    /// Complete a save started with [`Self::begin_save`].
    ///
    /// On success the uploaded text becomes the new reset point, and the
    /// document takes the form the file now has unless it was edited while
    /// the upload ran. On failure the edits stay in place and the error is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `outcome`'s error.
    pub fn finish_save(&mut self, pending: PendingSave, outcome: Result<()>) -> Result<()> {
        self.saving = false;
        match outcome {
            Ok(()) => {
                info!(
                    "Saved playlist {} ({} tracks)",
                    pending.file_id,
                    self.document.len()
                );
                if self.document == pending.snapshot {
                    self.document = decode(&pending.content);
                }
                self.original = pending.content;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to save playlist {}: {}", pending.file_id, e);
                Err(e)
            }
        }
    }

    /// Encode the document and write it to the remote file.
    ///
    /// # Errors
    ///
    /// Returns `SaveInProgress`/`NotLoaded` as [`Self::begin_save`] does, or
    /// the storage client's error. Edits are kept when the upload fails.
    pub fn save(&mut self) -> Result<()> {
        let pending = self.begin_save()?;
        let outcome = self
            .storage
            .update_file(&pending.file_id, &pending.content);
        self.finish_save(pending, outcome)
    }

    /// Whether the document differs from the last loaded or saved text.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.document != decode(&self.original)
    }

    /// Whether a save is outstanding.
    #[must_use]
    pub const fn is_saving(&self) -> bool {
        self.saving
    }

    /// The playlist being edited.
    #[must_use]
    pub const fn document(&self) -> &PlaylistDocument {
        &self.document
    }

    /// Raw text of the last load or successful save.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Remote file backing this session.
    #[must_use]
    pub fn file_id(&self) -> Option<&str> {
        self.file_id.as_deref()
    }

    /// Storage client used by this session.
    #[must_use]
    pub const fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}

/// Clears the saving flag when an async save is dropped before finishing.
struct SavingFlag<'a> {
    saving: &'a mut bool,
    file_id: String,
    finished: bool,
}

impl Drop for SavingFlag<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                "Save of {} was cancelled; the upload may still complete",
                self.file_id
            );
        }
        *self.saving = false;
    }
}

impl<S: StorageClient + ?Sized + 'static> EditSession<S> {
    /// Like [`Self::save`], but performs the upload on the blocking pool.
    ///
    /// If the returned future is dropped early the session accepts new saves
    /// again, but keeps the edits as unsaved since the upload's outcome is
    /// unknown.
    ///
    /// # Errors
    ///
    /// Same as [`Self::save`].
    pub async fn save_async(&mut self) -> Result<()> {
        let pending = self.begin_save()?;
        let storage = Arc::clone(&self.storage);
        let file_id = pending.file_id.clone();
        let content = pending.content.clone();

        let mut flag = SavingFlag {
            saving: &mut self.saving,
            file_id: pending.file_id.clone(),
            finished: false,
        };
        let outcome = tokio::task::spawn_blocking(move || storage.update_file(&file_id, &content))
            .await
            .map_err(|e| Error::transient(None, format!("Save task failed: {e}")))
            .and_then(|result| result);
        flag.finished = true;
        drop(flag);

        self.finish_save(pending, outcome)
    }
}
