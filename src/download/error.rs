use std::fmt;

use crate::core::config::MIB;

/// Structured error type for download operations.
///
/// The `Display` text is what end users see on the `error` progress event,
/// so it never carries yt-dlp's raw diagnostics. Those stay in the inner
/// strings and go to the log only.
#[derive(Debug)]
pub enum DownloadError {
    /// yt-dlp could not be started at all
    Spawn(String),
    /// yt-dlp exited non-zero (inner text is the exit status, for logs)
    Failed(String),
    /// yt-dlp exited zero but the expected file is not on disk
    OutputMissing(String),
    /// The finished file is over the delivery ceiling
    SizeExceeded { size: u64, limit: u64 },
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadError::Spawn(_) => write!(f, "Failed to start download"),
            DownloadError::Failed(_) | DownloadError::OutputMissing(_) => write!(f, "Download failed"),
            DownloadError::SizeExceeded { size, limit } => write!(
                f,
                "File too large ({:.1} MB). Limit is {} MB.",
                *size as f64 / MIB as f64,
                limit / MIB
            ),
        }
    }
}

impl std::error::Error for DownloadError {}

impl DownloadError {
    /// Returns subcategory for logs
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::Spawn(_) => "spawn",
            DownloadError::Failed(_) => "ytdlp",
            DownloadError::OutputMissing(_) => "file_not_found",
            DownloadError::SizeExceeded { .. } => "size_exceeded",
        }
    }

    /// Text for the `error` progress event
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Internal detail, for logs only
    pub fn detail(&self) -> String {
        match self {
            DownloadError::Spawn(msg) | DownloadError::Failed(msg) | DownloadError::OutputMissing(msg) => msg.clone(),
            DownloadError::SizeExceeded { size, limit } => format!("{} bytes > {} bytes", size, limit),
        }
    }
}
