use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use crate::download::error::DownloadError;

/// Centralized error types for the application
///
/// Every failure a job can hit is one of these. None of them are retried:
/// the job reports the error once and ends.
///
/// # Example
///
/// ```no_run
/// use yturl::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed request parameters
    #[error("{0}")]
    InvalidInput(String),

    /// The URL does not belong to a supported platform
    #[error("Unsupported URL. Send a YouTube, TikTok, or Instagram link.")]
    UnsupportedUrl,

    /// yt-dlp exited non-zero while dumping metadata
    #[error("Failed to get video info: {0}")]
    Metadata(String),

    /// yt-dlp succeeded but printed something that is not a metadata document
    #[error("Unparseable metadata: {0}")]
    UnparseableMetadata(#[from] serde_json::Error),

    /// The selection policy found nothing acceptable
    #[error("No suitable format found")]
    NoSuitableFormat,

    /// Download/yt-dlp errors
    #[error("{0}")]
    Download(#[from] DownloadError),

    /// Unknown or expired file id
    #[error("File not found or expired")]
    NotFound,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP/Fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::UnsupportedUrl => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::NoSuitableFormat => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
