//! Download orchestration: yt-dlp process → ordered progress events.
//!
//! [`Downloader::start`] spawns one worker task per job. The worker owns the
//! child process, reads stdout and stderr line by line as a single merged
//! feed, runs every line through a [`ProgressTracker`], and pushes events
//! into a bounded channel. The caller reads them through a
//! [`DownloadHandle`], which yields exactly one terminal event (`done` or
//! `error`) and then ends.
//!
//! Dropping or cancelling the handle kills the child. A cancelled job emits
//! nothing further, in particular no `error`. Cancelled and failed jobs
//! leave no `<file_id>*` files behind.

use futures_util::stream::{self, Stream};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::config::formats::{AUDIO_CONTAINER, PREFERRED_AUDIO_EXT, VIDEO_CONTAINER};
use crate::core::config::retention;
use crate::core::process::{kill_and_reap, ytdlp_command};
use crate::download::error::DownloadError;
use crate::download::progress::{Mode, ProgressEvent, ProgressTracker};
use crate::download::retention::RetainedFileStore;

const EVENT_BUFFER: usize = 64;

/// One acquisition attempt
#[derive(Debug, Clone)]
pub struct DownloadJob {
    /// Doubles as the output file stem and the id the client fetches by
    pub job_id: Uuid,
    pub mode: Mode,
    pub format_id: String,
    pub source_url: String,
    /// Directory the output lands in
    pub work_dir: PathBuf,
}

impl DownloadJob {
    pub fn new(mode: Mode, format_id: impl Into<String>, source_url: impl Into<String>, work_dir: &Path) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            mode,
            format_id: format_id.into(),
            source_url: source_url.into(),
            work_dir: work_dir.to_path_buf(),
        }
    }

    pub fn file_id(&self) -> String {
        self.job_id.to_string()
    }

    /// Extension of the finished file
    pub fn output_ext(&self) -> &'static str {
        match self.mode {
            Mode::Video => VIDEO_CONTAINER,
            Mode::Audio => AUDIO_CONTAINER,
        }
    }

    /// Path passed to `-o`. Audio keeps yt-dlp's `%(ext)s` because the
    /// pre-conversion download has a different extension.
    pub fn output_template(&self) -> PathBuf {
        match self.mode {
            Mode::Video => self.output_path(),
            Mode::Audio => self.work_dir.join(format!("{}.%(ext)s", self.job_id)),
        }
    }

    /// Where the finished file is expected
    pub fn output_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}.{}", self.job_id, self.output_ext()))
    }
}

/// yt-dlp arguments for a job
pub fn build_args(job: &DownloadJob) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    match job.mode {
        Mode::Video => {
            let id = &job.format_id;
            args.extend([
                "-f".to_string(),
                format!("{id}+bestaudio[ext={PREFERRED_AUDIO_EXT}]/{id}+bestaudio/{id}"),
                "--merge-output-format".to_string(),
                VIDEO_CONTAINER.to_string(),
            ]);
        }
        Mode::Audio => {
            args.extend([
                "-f".to_string(),
                job.format_id.clone(),
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                AUDIO_CONTAINER.to_string(),
            ]);
        }
    }
    args.extend([
        "--newline".to_string(),
        "--no-playlist".to_string(),
        "--force-overwrites".to_string(),
        "-o".to_string(),
        job.output_template().to_string_lossy().into_owned(),
        job.source_url.clone(),
    ]);
    args
}

/// Starts download jobs against one yt-dlp binary.
#[derive(Clone)]
pub struct Downloader {
    ytdl_bin: String,
    max_file_size: Option<u64>,
    retention: Option<Arc<RetainedFileStore>>,
}

impl Downloader {
    pub fn new(ytdl_bin: impl Into<String>) -> Self {
        Self {
            ytdl_bin: ytdl_bin.into(),
            max_file_size: None,
            retention: None,
        }
    }

    /// Reject finished files above `bytes`
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Hand finished files to `store`, which deletes them if never fetched
    pub fn with_retention(mut self, store: Arc<RetainedFileStore>) -> Self {
        self.retention = Some(store);
        self
    }

    /// Spawn the job. Events are produced only while the handle is alive.
    pub fn start(&self, job: DownloadJob) -> DownloadHandle {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let worker = Worker {
            ytdl_bin: self.ytdl_bin.clone(),
            max_file_size: self.max_file_size,
            retention: self.retention.clone(),
            job,
            tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());
        DownloadHandle {
            rx,
            cancel,
            task: Some(task),
            finished: false,
        }
    }
}

/// Caller side of a running job
#[derive(Debug)]
pub struct DownloadHandle {
    rx: mpsc::Receiver<ProgressEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    finished: bool,
}

impl DownloadHandle {
    /// Next event, or `None` once the terminal event has been returned (or
    /// the job was cancelled).
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        if self.finished {
            return None;
        }
        let event = self.rx.recv().await;
        match &event {
            Some(e) if e.is_terminal() => self.finished = true,
            None => self.finished = true,
            _ => {}
        }
        event
    }

    /// Drain the job and return its terminal event
    pub async fn wait_terminal(mut self) -> Option<ProgressEvent> {
        let mut last = None;
        while let Some(event) = self.next_event().await {
            last = Some(event);
        }
        last.filter(ProgressEvent::is_terminal)
    }

    /// Kill the process. No further events are delivered.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.finished = true;
        self.rx.close();
    }

    /// Cancel and wait until the child has been killed and reaped
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("Download worker ended abnormally: {}", e);
            }
        }
    }

    /// The events as a stream; dropping the stream cancels the job
    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        stream::unfold(self, |mut handle| async move {
            let event = handle.next_event().await?;
            Some((event, handle))
        })
    }
}

impl Drop for DownloadHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker {
    ytdl_bin: String,
    max_file_size: Option<u64>,
    retention: Option<Arc<RetainedFileStore>>,
    job: DownloadJob,
    tx: mpsc::Sender<ProgressEvent>,
    cancel: CancellationToken,
}

enum Exit {
    Finished(std::process::ExitStatus),
    Cancelled,
}

impl Worker {
    async fn run(self) {
        let file_id = self.job.file_id();
        log::info!(
            "Job {} started: {} format {} from {}",
            file_id,
            self.job.mode,
            self.job.format_id,
            self.job.source_url
        );

        let mut tracker = ProgressTracker::new(self.job.mode);
        if !self.emit(tracker.initial_event()).await {
            return;
        }

        let result = match self.execute(&mut tracker).await {
            Ok(Exit::Cancelled) => {
                log::info!("Job {} cancelled", file_id);
                cleanup_job_files(&self.job.work_dir, &file_id).await;
                return;
            }
            Ok(Exit::Finished(status)) if status.success() => self.check_output().await,
            Ok(Exit::Finished(status)) => Err(DownloadError::Failed(status.to_string())),
            Err(e) => Err(e),
        };

        let terminal = match result {
            Ok(()) => {
                log::info!("Job {} done ({} legs)", file_id, tracker.legs());
                if let Some(store) = &self.retention {
                    store.schedule_delete(&file_id, self.job.output_ext(), retention::abandoned());
                }
                ProgressEvent::done(file_id.clone(), self.job.output_ext())
            }
            Err(e) => {
                log::error!("Job {} failed [{}]: {}", file_id, e.subcategory(), e.detail());
                cleanup_job_files(&self.job.work_dir, &file_id).await;
                ProgressEvent::error(e.user_message())
            }
        };
        self.emit(terminal).await;
    }

    /// Send an event; `false` once nobody is listening
    async fn emit(&self, event: ProgressEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.tx.send(event).await.is_ok()
    }

    async fn execute(&self, tracker: &mut ProgressTracker) -> Result<Exit, DownloadError> {
        let args = build_args(&self.job);
        log::debug!("yt-dlp command: {} {}", self.ytdl_bin, args.join(" "));

        let mut child = ytdlp_command(&self.ytdl_bin)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DownloadError::Spawn(format!("{}: {}", self.ytdl_bin, e)))?;

        let stdout = child.stdout.take().map(|s| BufReader::new(s).lines());
        let stderr = child.stderr.take().map(|s| BufReader::new(s).lines());
        let (mut stdout, mut stderr) = match (stdout, stderr) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                kill_and_reap(&mut child).await;
                return Err(DownloadError::Spawn("stdio not captured".to_string()));
            }
        };

        let (mut out_open, mut err_open) = (true, true);
        while out_open || err_open {
            let line = tokio::select! {
                _ = self.cancel.cancelled() => {
                    kill_and_reap(&mut child).await;
                    return Ok(Exit::Cancelled);
                }
                line = stdout.next_line(), if out_open => match line {
                    Ok(Some(line)) => line,
                    _ => { out_open = false; continue; }
                },
                line = stderr.next_line(), if err_open => match line {
                    Ok(Some(line)) => {
                        log::debug!("yt-dlp stderr: {}", line);
                        line
                    }
                    _ => { err_open = false; continue; }
                },
            };

            for event in tracker.feed(&line) {
                if !self.emit(event).await {
                    kill_and_reap(&mut child).await;
                    return Ok(Exit::Cancelled);
                }
            }
        }

        tokio::select! {
            _ = self.cancel.cancelled() => {
                kill_and_reap(&mut child).await;
                Ok(Exit::Cancelled)
            }
            status = child.wait() => status
                .map(Exit::Finished)
                .map_err(|e| DownloadError::Failed(format!("wait failed: {}", e))),
        }
    }

    async fn check_output(&self) -> Result<(), DownloadError> {
        let path = self.job.output_path();
        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|e| DownloadError::OutputMissing(format!("{}: {}", path.display(), e)))?
            .len();

        match self.max_file_size {
            Some(limit) if size > limit => Err(DownloadError::SizeExceeded { size, limit }),
            _ => Ok(()),
        }
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        log::debug!("remove {}: {}", path.display(), e);
    }
}

/// Remove `<file_id>.*` leftovers (`.part`, `.ytdl`, unmerged legs).
async fn cleanup_job_files(work_dir: &Path, file_id: &str) {
    let Ok(mut entries) = tokio::fs::read_dir(work_dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with(file_id) {
            remove_quietly(&entry.path()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job(mode: Mode) -> DownloadJob {
        DownloadJob::new(mode, "137", "https://youtu.be/abc", Path::new("/tmp/work"))
    }

    #[test]
    fn test_build_args_video() {
        let job = job(Mode::Video);
        let args = build_args(&job);
        assert_eq!(args[0], "-f");
        assert_eq!(args[1], "137+bestaudio[ext=m4a]/137+bestaudio/137");
        assert!(args.windows(2).any(|w| w == ["--merge-output-format", "mp4"]));
        assert!(!args.iter().any(|a| a == "--extract-audio"));
        let out = format!("/tmp/work/{}.mp4", job.job_id);
        assert!(args.windows(2).any(|w| w[0] == "-o" && w[1] == out));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
    }

    #[test]
    fn test_build_args_audio() {
        let job = job(Mode::Audio);
        let args = build_args(&job);
        assert_eq!(&args[..5], &["-f", "137", "--extract-audio", "--audio-format", "mp3"]);
        assert!(!args.iter().any(|a| a == "--merge-output-format"));
        let out = format!("/tmp/work/{}.%(ext)s", job.job_id);
        assert!(args.windows(2).any(|w| w[0] == "-o" && w[1] == out));
        assert!(args.iter().any(|a| a == "--newline"));
    }

    #[test]
    fn test_job_paths() {
        let job = job(Mode::Audio);
        assert_eq!(job.output_ext(), "mp3");
        assert_eq!(job.output_path(), PathBuf::from(format!("/tmp/work/{}.mp3", job.job_id)));
        assert_ne!(job.job_id, DownloadJob::new(Mode::Audio, "1", "u", Path::new("/")).job_id);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_single_error() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::new("/definitely/not/yt-dlp");
        let mut handle = downloader.start(DownloadJob::new(Mode::Video, "18", "https://youtu.be/x", dir.path()));

        let first = handle.next_event().await.unwrap();
        assert_eq!(first.stage, crate::download::progress::Stage::DownloadingVideo);
        let terminal = handle.next_event().await.unwrap();
        assert_eq!(terminal, ProgressEvent::error("Failed to start download"));
        assert!(handle.next_event().await.is_none());
    }
}
