//! Media acquisition: detection, metadata, selection, download, retention

pub mod error;
pub mod formats;
pub mod metadata;
pub mod orchestrator;
pub mod platform;
pub mod progress;
pub mod retention;

// Re-exports for convenience
pub use error::DownloadError;
pub use orchestrator::{DownloadHandle, DownloadJob, Downloader};
pub use platform::{MediaReference, Platform};
pub use progress::{Mode, ProgressEvent, Stage};
pub use retention::{FetchGuard, RetainedFile, RetainedFileStore};
