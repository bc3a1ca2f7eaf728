//! Finished files waiting to be fetched.
//!
//! A finished job leaves `<file_id>.<ext>` in the work directory. Two timers
//! may delete it: the long one set when the job completes (nobody came for
//! the file) and the short one set once a response serving the file has
//! ended. Whichever fires first removes it; the other finds nothing and does
//! nothing.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::core::config::formats::{AUDIO_CONTAINER, VIDEO_CONTAINER};
use crate::core::config::retention;
use crate::core::error::{AppError, AppResult};

/// Extensions tried on lookup, in order
const KNOWN_EXTENSIONS: [&str; 2] = [VIDEO_CONTAINER, AUDIO_CONTAINER];

/// A finished artifact on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedFile {
    pub file_id: Uuid,
    pub path: PathBuf,
    pub ext: &'static str,
    pub created_at: Option<SystemTime>,
}

impl RetainedFile {
    pub fn content_type(&self) -> &'static str {
        content_type(self.ext)
    }

    /// Name offered to the client in `Content-Disposition`
    pub fn download_name(&self) -> String {
        format!("{}.{}", self.file_id, self.ext)
    }
}

pub fn content_type(ext: &str) -> &'static str {
    match ext {
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct RetainedFileStore {
    dir: PathBuf,
    fetch_grace: Duration,
}

impl RetainedFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fetch_grace: retention::fetch_grace(),
        }
    }

    pub fn with_fetch_grace(mut self, grace: Duration) -> Self {
        self.fetch_grace = grace;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, file_id: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", file_id, ext))
    }

    /// Delete `<file_id>.<ext>` after `delay`. A file that is already gone
    /// is not an error.
    pub fn schedule_delete(&self, file_id: &str, ext: &str, delay: Duration) -> JoinHandle<()> {
        let path = self.path_for(file_id, ext);
        let deadline = Instant::now() + delay;
        log::debug!("Deletion of {} scheduled in {:?}", path.display(), delay);

        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => log::debug!("Deleted retained file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    log::debug!("Retained file {} already gone", path.display());
                }
                Err(e) => log::warn!("Failed to delete retained file {}: {}", path.display(), e),
            }
        })
    }

    /// Find the artifact for `file_id`. Ids that are not UUIDs never reach
    /// the filesystem.
    pub async fn lookup(&self, file_id: &str) -> AppResult<RetainedFile> {
        let id = Uuid::parse_str(file_id).map_err(|_| AppError::NotFound)?;
        let stem = id.to_string();

        for ext in KNOWN_EXTENSIONS {
            let path = self.path_for(&stem, ext);
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                if meta.is_file() {
                    return Ok(RetainedFile {
                        file_id: id,
                        path,
                        ext,
                        created_at: meta.modified().ok(),
                    });
                }
            }
        }
        Err(AppError::NotFound)
    }

    /// Look up `file_id` for serving. The short post-fetch deletion is
    /// scheduled when the returned guard is dropped, so keep it alive for as
    /// long as the response body is being sent.
    pub async fn fetch_and_mark(&self, file_id: &str) -> AppResult<(RetainedFile, FetchGuard)> {
        let file = self.lookup(file_id).await?;
        log::info!("Serving retained file {}", file.path.display());
        let guard = FetchGuard {
            store: self.clone(),
            file_id: file.file_id.to_string(),
            ext: file.ext,
        };
        Ok((file, guard))
    }
}

/// Schedules the post-fetch deletion of a served file when dropped
#[derive(Debug)]
pub struct FetchGuard {
    store: RetainedFileStore,
    file_id: String,
    ext: &'static str,
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        if tokio::runtime::Handle::try_current().is_err() {
            log::warn!("No runtime to schedule deletion of {}.{}", self.file_id, self.ext);
            return;
        }
        self.store.schedule_delete(&self.file_id, self.ext, self.store.fetch_grace);
    }
}
