//! Application configuration management.
//!
//! Handles loading, saving, and managing application-wide settings:
//! which store to talk to, where playlists live and which audio
//! directories can be added from.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::drive::DEFAULT_API_BASE;
use crate::error::{Error, Result};
use crate::library::{DEFAULT_FALLBACK_PREFIX, DirectoryConfig};
use crate::storage::ROOT_FOLDER_ID;

/// Application directory name under the platform config/data dirs.
const APP_DIR: &str = "cloudlist";

/// Which storage backend to use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageBackend {
    /// A directory on this machine.
    Local {
        /// Root directory of the store.
        root: PathBuf,
    },
    /// The Drive REST API.
    Drive {
        /// Base URL of the API.
        #[serde(default = "default_api_base")]
        api_base: String,
    },
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::Drive {
            api_base: default_api_base(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Storage backend.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Folder holding the playlist files.
    #[serde(default = "default_playlists_folder_id")]
    pub playlists_folder_id: String,
    /// Audio source directories.
    #[serde(default)]
    pub directories: Vec<DirectoryConfig>,
    /// Prefix for track paths added without a directory.
    #[serde(default = "default_fallback_prefix")]
    pub fallback_path_prefix: String,
    /// File where the access token is kept.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

fn default_playlists_folder_id() -> String {
    ROOT_FOLDER_ID.to_string()
}

fn default_fallback_prefix() -> String {
    DEFAULT_FALLBACK_PREFIX.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            playlists_folder_id: default_playlists_folder_id(),
            directories: Vec::new(),
            fallback_path_prefix: default_fallback_prefix(),
            token_file: default_token_file(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, or defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`, or defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if a directory configuration is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::FileSystem {
            path: path.to_path_buf(),
            message: format!("Failed to read config file: {e}"),
        })?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {e}")))?;
        config.validate()?;

        info!("Loaded config from {}", path.display());
        debug!("Configured directories: {}", config.directories.len());
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| Error::FileSystem {
                path: parent.to_path_buf(),
                message: format!("Failed to create config directory: {e}"),
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| Error::FileSystem {
            path: path.to_path_buf(),
            message: format!("Failed to write config file: {e}"),
        })?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Check every directory configuration and reject duplicate names.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        for (i, dir) in self.directories.iter().enumerate() {
            dir.validate()?;
            if self.directories[..i]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&dir.name))
            {
                return Err(Error::Configuration(format!(
                    "Duplicate directory name: {}",
                    dir.name
                )));
            }
        }
        if self.playlists_folder_id.trim().is_empty() {
            return Err(Error::Configuration(
                "Playlists folder cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Look up a directory by name (case-insensitive).
    #[must_use]
    pub fn directory(&self, name: &str) -> Option<&DirectoryConfig> {
        self.directories
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }
}

/// Get the default path of the token file.
#[must_use]
pub fn default_token_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("token.json")
}

/// Get the path to the config file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(APP_DIR)
        .join("config.json")
}

/// Configuration manager that handles loading and caching config.
pub struct ConfigManager {
    config: AppConfig,
    path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager for the default config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded.
    pub fn new() -> Result<Self> {
        Self::with_path(config_file_path())
    }

    /// Create a config manager for a specific config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded.
    pub fn with_path(path: PathBuf) -> Result<Self> {
        let config = AppConfig::load_from(&path)?;
        Ok(Self { config, path })
    }

    /// Get a reference to the current configuration.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Path of the backing config file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or cannot be saved.
    pub fn update(&mut self, config: AppConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.config.save_to(&self.path)
    }

    /// Add or replace a directory configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is invalid or config cannot be saved.
    pub fn upsert_directory(&mut self, directory: DirectoryConfig) -> Result<()> {
        directory.validate()?;
        let mut config = self.config.clone();
        match config
            .directories
            .iter_mut()
            .find(|d| d.name.eq_ignore_ascii_case(&directory.name))
        {
            Some(existing) => *existing = directory,
            None => config.directories.push(directory),
        }
        self.update(config)
    }

    /// Remove a directory configuration. Returns whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be saved.
    pub fn remove_directory(&mut self, name: &str) -> Result<bool> {
        let before = self.config.directories.len();
        let mut config = self.config.clone();
        config
            .directories
            .retain(|d| !d.name.eq_ignore_ascii_case(name));
        if config.directories.len() == before {
            warn!("No directory named {} to remove", name);
            return Ok(false);
        }
        self.update(config)?;
        Ok(true)
    }

    /// Reset to default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be saved.
    pub fn reset(&mut self) -> Result<()> {
        self.update(AppConfig::default())
    }
}
