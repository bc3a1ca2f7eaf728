//! yturl - social-video downloader
//!
//! Takes a YouTube, TikTok or Instagram link and produces a merged MP4 or an
//! extracted MP3, either through an HTTP API with SSE progress or through a
//! single-owner Telegram bot. All media work is delegated to yt-dlp.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, process helpers, HTTP API
//! - `download`: detection, metadata, format selection, downloads, retention
//! - `telegram`: owner registry, per-message pipeline, dispatcher
//! - `cli`: command line definition

pub mod cli;
pub mod core;
pub mod download;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use download::{DownloadHandle, DownloadJob, Downloader, Mode, ProgressEvent, RetainedFileStore, Stage};
pub use telegram::{BotGateway, OwnerRegistry};
