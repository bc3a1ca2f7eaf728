//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A startup summary of the effective configuration

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or a logger was already set
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            // stdout carries `info --json` and `download` output
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the configuration the process is about to run with
pub fn log_startup_configuration() {
    log::info!("yt-dlp binary: {}", config::YTDL_BIN.as_str());
    log::info!("Work directory: {}", config::TEMP_FILES_DIR.display());

    match config::telegram::BOT_TOKEN.as_ref() {
        Some(_) => log::info!("Telegram bot: enabled"),
        None => log::info!("Telegram bot: disabled (TELEGRAM_BOT not set)"),
    }

    match *config::telegram::OWNER_ID {
        Some(id) => log::info!("Telegram owner: {}", id),
        None => log::info!(
            "Telegram owner: unclaimed (first sender wins, saved to {})",
            config::telegram::OWNER_ENV_FILE.as_str()
        ),
    }
}
