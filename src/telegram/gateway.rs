//! Per-message bot pipeline.
//!
//! For every accepted message: detect the link, keep an "uploading video"
//! indicator alive, fetch metadata, pick a format under the upload ceiling,
//! download it, and reply with the video or an error text. Replies are
//! threaded to the message that asked.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::download::formats::select_for_chat;
use crate::download::metadata::fetch_metadata;
use crate::download::orchestrator::{DownloadJob, Downloader};
use crate::download::platform::MediaReference;
use crate::download::progress::{Mode, Stage};
use crate::telegram::owner::OwnerRegistry;

pub const HELP_TEXT: &str = "Send me a YouTube, TikTok, or Instagram link.";

/// Outbound side of a chat
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat_id: i64, reply_to: i32, text: &str) -> AppResult<()>;

    /// Upload a file as a streamable video
    async fn send_video(&self, chat_id: i64, reply_to: i32, path: &Path) -> AppResult<()>;

    /// "uploading video..." chat action
    async fn send_presence(&self, chat_id: i64) -> AppResult<()>;
}

/// The parts of an inbound message the pipeline needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub sender_id: i64,
    pub text: String,
}

/// How a message was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Sender is not the owner; nothing was sent
    Unauthorized,
    /// No text to act on
    Ignored,
    HelpSent,
    VideoSent,
    /// An error reply was sent with this text
    Failed(String),
}

pub struct BotGateway {
    transport: Arc<dyn ChatTransport>,
    owners: Arc<OwnerRegistry>,
    ytdl_bin: String,
    work_dir: PathBuf,
    max_file_size: u64,
    presence_interval: Duration,
}

impl BotGateway {
    pub fn new(transport: Arc<dyn ChatTransport>, owners: Arc<OwnerRegistry>) -> Self {
        Self {
            transport,
            owners,
            ytdl_bin: config::YTDL_BIN.clone(),
            work_dir: config::TEMP_FILES_DIR.clone(),
            max_file_size: config::telegram::MAX_FILE_SIZE_BYTES,
            presence_interval: config::telegram::presence_interval(),
        }
    }

    pub fn with_ytdl_bin(mut self, bin: impl Into<String>) -> Self {
        self.ytdl_bin = bin.into();
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn owners(&self) -> &OwnerRegistry {
        &self.owners
    }

    /// Handle `msg` on its own task, so a long download never holds up the
    /// next message.
    pub fn spawn_handle(self: &Arc<Self>, msg: InboundMessage) -> JoinHandle<MessageOutcome> {
        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            let message_id = msg.message_id;
            let outcome = gateway.handle_message(msg).await;
            log::debug!("Message {} handled: {:?}", message_id, outcome);
            outcome
        })
    }

    /// Handle one message end to end.
    pub async fn handle_message(&self, msg: InboundMessage) -> MessageOutcome {
        if !self.owners.authorize(msg.sender_id).await.is_allowed() {
            log::debug!("Dropping message from non-owner {}", msg.sender_id);
            return MessageOutcome::Unauthorized;
        }

        let text = msg.text.trim();
        if text.is_empty() {
            return MessageOutcome::Ignored;
        }

        let reference = MediaReference::detect(text);
        if !reference.is_supported() {
            self.reply(&msg, HELP_TEXT).await;
            return MessageOutcome::HelpSent;
        }

        let presence = CancellationToken::new();
        let presence_task = tokio::spawn(presence_loop(
            Arc::clone(&self.transport),
            msg.chat_id,
            self.presence_interval,
            presence.clone(),
        ));
        let guard = presence.drop_guard();

        let outcome = match self.deliver(&msg, &reference).await {
            Ok(()) => MessageOutcome::VideoSent,
            Err(text) => {
                self.reply(&msg, &text).await;
                MessageOutcome::Failed(text)
            }
        };

        guard.disarm().cancel();
        if let Err(e) = presence_task.await {
            log::warn!("Presence task ended abnormally: {}", e);
        }
        outcome
    }

    /// Fetch, select, download and send. `Err` carries the reply text.
    async fn deliver(&self, msg: &InboundMessage, reference: &MediaReference) -> Result<(), String> {
        log::info!("Chat {}: {} link {}", msg.chat_id, reference.platform, reference.url);

        let info = fetch_metadata(&self.ytdl_bin, &reference.url)
            .await
            .map_err(|e| match e {
                AppError::Metadata(_) => e.to_string(),
                other => format!("Failed to get video info: {}", other),
            })?;

        let format = select_for_chat(&info.formats, self.max_file_size).ok_or_else(|| {
            format!(
                "No suitable format found under {} MB.",
                self.max_file_size / config::MIB
            )
        })?;
        log::info!("Chat {}: selected format {} ({}p)", msg.chat_id, format.format_id, format.height());

        let job = DownloadJob::new(Mode::Video, format.format_id.clone(), reference.url.clone(), &self.work_dir);
        let output = job.output_path();
        let downloader = Downloader::new(self.ytdl_bin.clone()).with_max_file_size(self.max_file_size);

        let result = match downloader.start(job).wait_terminal().await {
            Some(event) if event.stage == Stage::Done => self
                .transport
                .send_video(msg.chat_id, msg.message_id, &output)
                .await
                .map_err(|e| format!("Failed to send video: {}", e)),
            Some(event) => Err(event.error_message.unwrap_or_else(|| "Download failed".to_string())),
            None => Err("Download failed".to_string()),
        };

        if let Err(e) = tokio::fs::remove_file(&output).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {}", output.display(), e);
            }
        }
        result
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) {
        if let Err(e) = self.transport.send_text(msg.chat_id, msg.message_id, text).await {
            log::error!("Failed to reply in chat {}: {}", msg.chat_id, e);
        }
    }
}

/// Send the presence action now and then every `interval` until cancelled.
pub async fn presence_loop(
    transport: Arc<dyn ChatTransport>,
    chat_id: i64,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = transport.send_presence(chat_id).await {
                    log::debug!("Presence update failed for chat {}: {}", chat_id, e);
                }
            }
        }
    }
}
