//! Command implementations.
//!
//! Each mutating command opens an edit session on the playlist, applies one
//! edit and saves. Output goes to the supplied writer so commands can be
//! tested without a terminal.

use std::io::Write;
use std::sync::Arc;

use cloudlist_core::{
    AccessToken, AppConfig, Catalog, DriveClient, EditSession, Error, ErrorKind, FileTokenStore,
    LocalFolderStorage, PlaylistError, Result, StorageBackend, StorageClient, TokenStore,
    display_name, unix_now,
};
use tracing::{error, info};

use crate::cli::Command;

/// Structured description of a failed command.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorReport {
    /// Human-readable error message.
    pub message: String,
    /// Error category for programmatic handling.
    pub kind: String,
    /// Whether the command can be retried as is.
    pub retryable: bool,
    /// What the user should do next, if anything specific.
    pub hint: Option<String>,
}

impl From<&Error> for ErrorReport {
    fn from(e: &Error) -> Self {
        let hint = match e.kind() {
            ErrorKind::AuthExpired => Some("Sign in again with `cloudlist login <token>`".to_string()),
            ErrorKind::NotFound => Some("Check the id with `cloudlist playlists`".to_string()),
            ErrorKind::TransientIo => Some("Try the command again".to_string()),
            _ => None,
        };
        Self {
            message: e.to_string(),
            kind: format!("{:?}", e.kind()),
            retryable: e.is_retryable(),
            hint,
        }
    }
}

/// Build the storage client selected by the configuration.
pub fn open_storage(config: &AppConfig) -> Result<Arc<dyn StorageClient>> {
    match &config.backend {
        StorageBackend::Local { root } => {
            info!("Using local storage at {}", root.display());
            Ok(Arc::new(LocalFolderStorage::new(root.clone())?))
        }
        StorageBackend::Drive { api_base } => {
            info!("Using Drive storage at {}", api_base);
            let tokens: Arc<dyn TokenStore> = Arc::new(token_store(config));
            Ok(Arc::new(DriveClient::new(api_base.clone(), tokens)?))
        }
    }
}

fn token_store(config: &AppConfig) -> FileTokenStore {
    FileTokenStore::new(config.token_file.clone())
}

/// Convert a 1-based position given by the user into an index.
fn index_from_position(position: usize, len: usize) -> Result<usize> {
    position
        .checked_sub(1)
        .filter(|index| *index < len)
        .ok_or_else(|| PlaylistError::IndexOutOfRange { index: position, len }.into())
}

/// Name an unnamed playlist after its file, so the first saved track does
/// not fall back to the placeholder name.
fn seed_container_name<S: StorageClient + ?Sized>(
    session: &mut EditSession<S>,
    file_id: &str,
) -> Result<()> {
    if !session.document().container_name.is_empty() {
        return Ok(());
    }
    let stem = display_name(file_id);
    if stem.is_empty() {
        return Ok(());
    }
    session.rename(&stem)
}

/// Run a command against the configured store.
pub fn execute(command: Command, config: &AppConfig, json: bool, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Login { token, expires_in } => {
            token_store(config).set(AccessToken::new(token, unix_now(), expires_in))?;
            writeln!(out, "Token stored, valid for {expires_in} seconds")?;
            return Ok(());
        }
        Command::Logout => {
            token_store(config).clear()?;
            writeln!(out, "Signed out")?;
            return Ok(());
        }
        _ => {}
    }

    let storage = open_storage(config)?;
    let catalog = Catalog::from_config(storage, config);
    run_catalog_command(&catalog, command, json, out)
}

/// Run a command that works on playlists and directories.
pub fn run_catalog_command<S: StorageClient + ?Sized>(
    catalog: &Catalog<S>,
    command: Command,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Playlists => {
            let playlists = catalog.playlists()?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&playlists)?)?;
            } else {
                for file in playlists {
                    writeln!(out, "{}\t{}", file.id, file.name)?;
                }
            }
        }
        Command::Audio { directory } => {
            let dir = catalog.directory(&directory)?.clone();
            let files = catalog.audio_files(&dir)?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&files)?)?;
            } else {
                for file in files {
                    writeln!(out, "{}", file.name)?;
                }
            }
        }
        Command::Show { file_id } => {
            let session = catalog.open(&file_id)?;
            let doc = session.document();
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(doc)?)?;
            } else {
                writeln!(out, "{}", doc.container_name)?;
                for (i, track) in doc.items.iter().enumerate() {
                    writeln!(out, "{:>3}. {}\t{}", i + 1, track.display_name, track.path)?;
                }
            }
        }
        Command::Create { name } => {
            let created = catalog.create_playlist(&name)?;
            writeln!(out, "{}\t{}", created.id, created.name)?;
        }
        Command::Add {
            file_id,
            file_name,
            directory,
        } => {
            let dir = directory
                .as_deref()
                .map(|name| catalog.directory(name).cloned())
                .transpose()?;
            let mut session = catalog.open(&file_id)?;
            seed_container_name(&mut session, &file_id)?;
            if session.add_file(dir.as_ref(), &file_name, catalog.fallback_prefix()) {
                session.save()?;
                writeln!(out, "Added {file_name}")?;
            } else {
                writeln!(out, "{file_name} is already in the playlist")?;
            }
        }
        Command::Remove { file_id, path } => {
            let mut session = catalog.open(&file_id)?;
            if session.remove(&path) {
                session.save()?;
                writeln!(out, "Removed {path}")?;
            } else {
                writeln!(out, "{path} is not in the playlist")?;
            }
        }
        Command::Move { file_id, from, to } => {
            let mut session = catalog.open(&file_id)?;
            let len = session.document().len();
            let from_index = index_from_position(from, len)?;
            let to_index = index_from_position(to, len)?;
            session.reorder(from_index, to_index)?;
            session.save()?;
            writeln!(out, "Moved track {from} to position {to}")?;
        }
        Command::Rename { file_id, name } => {
            let mut session = catalog.open(&file_id)?;
            if session.document().is_empty() {
                return Err(PlaylistError::InvalidName {
                    name,
                    reason: "empty playlists do not store a name, add a track first".to_string(),
                }
                .into());
            }
            session.rename(&name)?;
            session.save()?;
            writeln!(out, "Renamed to {}", session.document().container_name)?;
        }
        Command::Login { .. } | Command::Logout => {
            return Err(Error::Configuration(
                "Token commands do not use the catalog".to_string(),
            ));
        }
    }
    Ok(())
}

/// Report a failed command on stderr and react to expired credentials.
pub fn report_error(e: &Error, config: &AppConfig) {
    let report = ErrorReport::from(e);
    error!(
        "Command error [kind={}, retryable={}]: {}",
        report.kind, report.retryable, report.message
    );

    if e.is_auth_expired()
        && let Err(clear_err) = token_store(config).clear()
    {
        error!("Failed to clear stored token: {}", clear_err);
    }

    eprintln!("error: {}", report.message);
    if let Some(hint) = report.hint {
        eprintln!("hint: {hint}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudlist_core::DirectoryConfig;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        config: AppConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().expect("Should create temp dir");
            fs::create_dir(dir.path().join("lists")).expect("mkdir");
            fs::create_dir(dir.path().join("ads")).expect("mkdir");
            fs::write(dir.path().join("ads").join("spring.mp3"), "x").expect("write");
            let config = AppConfig {
                backend: StorageBackend::Local {
                    root: dir.path().to_path_buf(),
                },
                playlists_folder_id: "lists".to_string(),
                directories: vec![DirectoryConfig::new("Ads", "ads", "/ads/{audio_filename}")],
                token_file: dir.path().join("token.json"),
                ..AppConfig::default()
            };
            Self { dir, config }
        }

        fn run(&self, command: Command) -> Result<String> {
            let mut out = Vec::new();
            execute(command, &self.config, false, &mut out)?;
            Ok(String::from_utf8(out).expect("utf8"))
        }

        fn playlist(&self, name: &str) -> String {
            fs::read_to_string(self.dir.path().join("lists").join(name)).expect("read")
        }
    }

    #[test]
    fn test_create_add_move_remove() {
        let fixture = Fixture::new();
        fixture
            .run(Command::Create {
                name: "Spring".to_string(),
            })
            .expect("create");
        let err = fixture
            .run(Command::Rename {
                file_id: "lists/Spring.m3u8".to_string(),
                name: "Spring Ads".to_string(),
            })
            .expect_err("Renaming an empty playlist should fail");
        assert!(matches!(
            err,
            Error::Playlist(PlaylistError::InvalidName { .. })
        ));
        assert_eq!(fixture.playlist("Spring.m3u8"), "#EXTM3U\n");

        for (file_name, directory) in [("spring.mp3", Some("Ads")), ("extra.wav", None)] {
            fixture
                .run(Command::Add {
                    file_id: "lists/Spring.m3u8".to_string(),
                    file_name: file_name.to_string(),
                    directory: directory.map(str::to_string),
                })
                .expect("add");
        }
        assert_eq!(
            fixture.playlist("Spring.m3u8"),
            "#EXTM3U\nContainer=<Spring>/ads/spring.mp3|C:\\Audio\\extra.wav\n"
        );

        fixture
            .run(Command::Rename {
                file_id: "lists/Spring.m3u8".to_string(),
                name: "Spring Ads".to_string(),
            })
            .expect("rename");
        fixture
            .run(Command::Move {
                file_id: "lists/Spring.m3u8".to_string(),
                from: 2,
                to: 1,
            })
            .expect("move");
        assert_eq!(
            fixture.playlist("Spring.m3u8"),
            "#EXTM3U\nContainer=<Spring+Ads>C:\\Audio\\extra.wav|/ads/spring.mp3\n"
        );

        let output = fixture
            .run(Command::Remove {
                file_id: "lists/Spring.m3u8".to_string(),
                path: "/ads/spring.mp3".to_string(),
            })
            .expect("remove");
        assert_eq!(output, "Removed /ads/spring.mp3\n");

        let shown = fixture
            .run(Command::Show {
                file_id: "lists/Spring.m3u8".to_string(),
            })
            .expect("show");
        assert_eq!(shown, "Spring Ads\n  1. extra\tC:\\Audio\\extra.wav\n");
    }

    #[test]
    fn test_add_duplicate_reports_without_saving() {
        let fixture = Fixture::new();
        fs::write(
            fixture.dir.path().join("lists").join("a.m3u8"),
            "#EXTM3U\nContainer=<A>/ads/spring.mp3\n",
        )
        .expect("write");

        let output = fixture
            .run(Command::Add {
                file_id: "lists/a.m3u8".to_string(),
                file_name: "spring.mp3".to_string(),
                directory: Some("ads".to_string()),
            })
            .expect("add");
        assert_eq!(output, "spring.mp3 is already in the playlist\n");
    }

    #[test]
    fn test_move_rejects_zero_position() {
        let fixture = Fixture::new();
        fs::write(
            fixture.dir.path().join("lists").join("a.m3u8"),
            "#EXTM3U\nContainer=<A>/1.mp3|/2.mp3\n",
        )
        .expect("write");

        let err = fixture
            .run(Command::Move {
                file_id: "lists/a.m3u8".to_string(),
                from: 0,
                to: 1,
            })
            .expect_err("Should fail");
        assert_eq!(err.kind(), ErrorKind::Playlist);
    }

    #[test]
    fn test_listing_commands() {
        let fixture = Fixture::new();
        fs::write(fixture.dir.path().join("lists").join("a.m3u8"), "#EXTM3U\n").expect("write");

        let output = fixture.run(Command::Playlists).expect("playlists");
        assert_eq!(output, "lists/a.m3u8\ta.m3u8\n");

        let output = fixture
            .run(Command::Audio {
                directory: "ads".to_string(),
            })
            .expect("audio");
        assert_eq!(output, "spring.mp3\n");
    }

    #[test]
    fn test_login_and_logout() {
        let fixture = Fixture::new();
        fixture
            .run(Command::Login {
                token: "abc".to_string(),
                expires_in: 60,
            })
            .expect("login");
        let store = token_store(&fixture.config);
        assert!(store.is_valid(unix_now()));

        fixture.run(Command::Logout).expect("logout");
        assert!(store.get().is_none());
    }

    #[test]
    fn test_error_report_for_auth_expired() {
        let report = ErrorReport::from(&Error::auth_expired());
        assert_eq!(report.kind, "AuthExpired");
        assert!(!report.retryable);
        assert!(report.hint.is_some_and(|h| h.contains("login")));
    }

    #[test]
    fn test_index_from_position() {
        assert_eq!(index_from_position(1, 3).expect("valid"), 0);
        assert_eq!(index_from_position(3, 3).expect("valid"), 2);
        assert!(index_from_position(0, 3).is_err());
        assert!(index_from_position(4, 3).is_err());
    }
}
