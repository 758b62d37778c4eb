//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Curate audio playlists stored in cloud storage.
#[derive(Debug, Parser)]
#[command(name = "cloudlist", version, about)]
pub struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log more to the console; repeat for more detail.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory for log files.
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Do not write log files.
    #[arg(long, global = true, conflicts_with = "log_dir")]
    pub no_log_file: bool,

    /// Print listings as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List playlist files.
    Playlists,
    /// List audio files of a configured directory.
    Audio {
        /// Directory name.
        directory: String,
    },
    /// Show the tracks of a playlist.
    Show {
        /// Playlist file id.
        file_id: String,
    },
    /// Create an empty playlist.
    Create {
        /// Playlist name.
        name: String,
    },
    /// Add an audio file to a playlist.
    Add {
        /// Playlist file id.
        file_id: String,
        /// Audio file name, including extension.
        file_name: String,
        /// Directory the file belongs to; the fallback prefix is used without one.
        #[arg(short, long)]
        directory: Option<String>,
    },
    /// Remove a track from a playlist.
    Remove {
        /// Playlist file id.
        file_id: String,
        /// Track path as shown by `show`.
        path: String,
    },
    /// Move a track to another position (1-based).
    Move {
        /// Playlist file id.
        file_id: String,
        /// Current position.
        from: usize,
        /// New position.
        to: usize,
    },
    /// Change the name stored in a playlist.
    Rename {
        /// Playlist file id.
        file_id: String,
        /// New container name.
        name: String,
    },
    /// Store an access token for the Drive backend.
    Login {
        /// Bearer token.
        token: String,
        /// Token lifetime in seconds.
        #[arg(long, default_value_t = 3600)]
        expires_in: u64,
    },
    /// Forget the stored access token.
    Logout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_flags() {
        let cli = Cli::try_parse_from(["cloudlist", "-vv", "--log-dir", "/tmp/logs", "playlists"])
            .expect("Should parse");
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/logs")));
        assert!(!cli.no_log_file);

        let cli = Cli::try_parse_from(["cloudlist", "playlists", "--no-log-file"])
            .expect("Should parse");
        assert_eq!(cli.verbose, 0);
        assert!(cli.no_log_file);
    }

    #[test]
    fn test_log_dir_conflicts_with_no_log_file() {
        let result =
            Cli::try_parse_from(["cloudlist", "--log-dir", "/tmp/logs", "--no-log-file", "logout"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_move_positions() {
        let cli = Cli::try_parse_from(["cloudlist", "move", "lists/a.m3u8", "3", "1"])
            .expect("Should parse");
        assert!(matches!(
            cli.command,
            Command::Move { from: 3, to: 1, .. }
        ));
    }
}
