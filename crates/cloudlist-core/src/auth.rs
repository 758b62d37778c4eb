//! Access token storage.
//!
//! Tokens are obtained elsewhere (the sign-in flow is not part of this
//! crate). This module only keeps them, answers whether they are still
//! usable and applies the expiry extension policy.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Seconds before expiry at which a token counts as "near expiry".
pub const DEFAULT_EXPIRY_WINDOW_SECS: u64 = 5 * 60;

/// Seconds added to a token's lifetime when it is extended.
pub const DEFAULT_EXTENSION_SECS: u64 = 60 * 60;

/// Current time as Unix epoch seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// A bearer token and the moment it stops being accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    /// Opaque bearer token.
    pub value: String,
    /// Expiry as Unix epoch seconds.
    pub expires_at: u64,
}

impl AccessToken {
    /// Create a token valid for `lifetime_secs` from `now`.
    pub fn new(value: impl Into<String>, now: u64, lifetime_secs: u64) -> Self {
        Self {
            value: value.into(),
            expires_at: now.saturating_add(lifetime_secs),
        }
    }

    /// Whether the token is still valid at `now`.
    #[must_use]
    pub const fn is_valid_at(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

/// When and by how much a token's expiry is pushed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryPolicy {
    /// Remaining lifetime below which the token is extended.
    pub window_secs: u64,
    /// Lifetime added on extension.
    pub extension_secs: u64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_EXPIRY_WINDOW_SECS,
            extension_secs: DEFAULT_EXTENSION_SECS,
        }
    }
}

/// Extend a token that is still valid but close to expiring.
///
/// Returns the extended token, or `None` when the token has already expired
/// or still has more than `policy.window_secs` left.
#[must_use]
pub fn extend_if_near_expiry(
    token: &AccessToken,
    now: u64,
    policy: &ExpiryPolicy,
) -> Option<AccessToken> {
    if !token.is_valid_at(now) {
        return None;
    }
    let remaining = token.expires_at - now;
    if remaining > policy.window_secs {
        return None;
    }
    Some(AccessToken {
        value: token.value.clone(),
        expires_at: token.expires_at.saturating_add(policy.extension_secs),
    })
}

/// Storage for the current access token.
#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    /// Current token, valid or not.
    fn get(&self) -> Option<AccessToken>;

    /// Replace the current token.
    fn set(&self, token: AccessToken) -> Result<()>;

    /// Forget any stored token.
    fn clear(&self) -> Result<()>;

    /// Whether a token is stored and valid at `now`.
    fn is_valid(&self, now: u64) -> bool {
        self.get().is_some_and(|t| t.is_valid_at(now))
    }
}

/// Token store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<AccessToken>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `token`.
    #[must_use]
    pub fn with_token(token: AccessToken) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<AccessToken> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn set(&self, token: AccessToken) -> Result<()> {
        let mut slot = self
            .token
            .write()
            .map_err(|_| Error::Configuration("Token store lock poisoned".to_string()))?;
        *slot = Some(token);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .token
            .write()
            .map_err(|_| Error::Configuration("Token store lock poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}

/// Token store persisted as a JSON file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store backed by `path`. The file is created on first `set`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Location of the token file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<AccessToken> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring unreadable token file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn set(&self, token: AccessToken) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| Error::FileSystem {
                path: parent.to_path_buf(),
                message: format!("Failed to create token directory: {e}"),
            })?;
        }
        let content = serde_json::to_string_pretty(&token)?;
        fs::write(&self.path, content).map_err(|e| Error::FileSystem {
            path: self.path.clone(),
            message: format!("Failed to write token file: {e}"),
        })?;
        debug!("Stored token expiring at {}", token.expires_at);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| Error::FileSystem {
                path: self.path.clone(),
                message: format!("Failed to remove token file: {e}"),
            })?;
            info!("Cleared stored token");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_token_validity() {
        let token = AccessToken::new("abc", 1_000, 60);
        assert_eq!(token.expires_at, 1_060);
        assert!(token.is_valid_at(1_059));
        assert!(!token.is_valid_at(1_060));
    }

    #[test]
    fn test_extend_near_expiry() {
        let policy = ExpiryPolicy {
            window_secs: 300,
            extension_secs: 3_600,
        };
        let token = AccessToken::new("abc", 0, 1_000);

        let extended = extend_if_near_expiry(&token, 800, &policy).expect("Should extend");
        assert_eq!(extended.value, "abc");
        assert_eq!(extended.expires_at, 4_600);
    }

    #[test]
    fn test_no_extension_with_time_left() {
        let token = AccessToken::new("abc", 0, 1_000);
        assert!(extend_if_near_expiry(&token, 100, &ExpiryPolicy::default()).is_none());
    }

    #[test]
    fn test_no_extension_after_expiry() {
        let token = AccessToken::new("abc", 0, 1_000);
        assert!(extend_if_near_expiry(&token, 1_000, &ExpiryPolicy::default()).is_none());
        assert!(extend_if_near_expiry(&token, 5_000, &ExpiryPolicy::default()).is_none());
    }

    #[test]
    fn test_extension_at_window_boundary() {
        let policy = ExpiryPolicy {
            window_secs: 300,
            extension_secs: 60,
        };
        let token = AccessToken::new("abc", 0, 1_000);
        assert!(extend_if_near_expiry(&token, 699, &policy).is_none());
        assert!(extend_if_near_expiry(&token, 700, &policy).is_some());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        assert!(store.get().is_none());
        assert!(!store.is_valid(0));

        store
            .set(AccessToken::new("abc", 0, 10))
            .expect("Should set");
        assert!(store.is_valid(5));
        assert!(!store.is_valid(10));

        store.clear().expect("Should clear");
        assert!(store.get().is_none());
    }

    #[test]
    fn test_file_store_persists() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let path = temp_dir.path().join("nested").join("token.json");

        let store = FileTokenStore::new(path.clone());
        assert!(store.get().is_none());

        let token = AccessToken::new("secret", 100, 3_600);
        store.set(token.clone()).expect("Should set");
        assert!(path.exists());

        let reopened = FileTokenStore::new(path.clone());
        assert_eq!(reopened.get(), Some(token));

        reopened.clear().expect("Should clear");
        assert!(!path.exists());
        assert!(reopened.get().is_none());
        reopened.clear().expect("Clearing twice is fine");
    }

    #[test]
    fn test_file_store_ignores_corrupt_file() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let path = temp_dir.path().join("token.json");
        fs::write(&path, "not json").expect("write");

        let store = FileTokenStore::new(path);
        assert!(store.get().is_none());
    }
}
