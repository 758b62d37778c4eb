//! `cloudlist` command-line entry point.

mod cli;
mod commands;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use cloudlist_core::{AppConfig, ConfigManager};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::logging::{LoggingConfig, LoggingGuard};

fn init_logging(cli: &Cli) -> Option<LoggingGuard> {
    let mut config =
        LoggingConfig::from_verbosity(cli.verbose).with_log_directory(cli.log_dir.clone());
    if cli.no_log_file {
        config = config.without_file();
    }
    match logging::init(&config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {e}");
            None
        }
    }
}

fn load_config(cli: &Cli) -> cloudlist_core::Result<AppConfig> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };
    info!("Loaded config from {}", manager.path().display());
    Ok(manager.config().clone())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(&cli);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config: {}", e);
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = std::io::stdout().lock();
    match commands::execute(cli.command, &config, cli.json, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            commands::report_error(&e, &config);
            ExitCode::FAILURE
        }
    }
}
