//! Process execution utilities for yt-dlp
//!
//! Every child is created with `kill_on_drop`, so a caller that drops the
//! future or handle (client disconnect, task abort) never leaves a process
//! running behind it.

use std::process::{Output, Stdio};
use tokio::process::{Child, Command};

use crate::core::error::AppError;

/// Build a yt-dlp command with stdin closed and kill-on-drop set.
pub fn ytdlp_command(ytdl_bin: &str) -> Command {
    let mut cmd = Command::new(ytdl_bin);
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    cmd
}

/// Run a command to completion and capture stdout/stderr.
///
/// No timeout is applied here; callers bound the run by dropping the future.
pub async fn run_to_output(cmd: &mut Command) -> Result<Output, AppError> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.output().await.map_err(AppError::Io)
}

/// Kill a child and reap it so it does not linger as a zombie.
pub async fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill().await {
        // Already exited between the last poll and now
        log::debug!("kill on finished child: {}", e);
    }
}
