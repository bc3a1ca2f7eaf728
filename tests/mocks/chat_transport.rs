//! Recording chat transport

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use yturl::core::error::AppResult;
use yturl::telegram::ChatTransport;

/// One outbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat_id: i64,
        reply_to: i32,
        text: String,
    },
    Video {
        chat_id: i64,
        reply_to: i32,
        path: PathBuf,
        /// Size of the file at the moment it was handed over
        size: u64,
    },
    Presence {
        chat_id: i64,
    },
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Everything except presence updates
    pub fn replies(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| !matches!(s, Sent::Presence { .. }))
            .collect()
    }

    pub fn presence_count(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| matches!(s, Sent::Presence { .. }))
            .count()
    }

    fn push(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(&self, chat_id: i64, reply_to: i32, text: &str) -> AppResult<()> {
        self.push(Sent::Text {
            chat_id,
            reply_to,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, reply_to: i32, path: &Path) -> AppResult<()> {
        let size = std::fs::metadata(path)?.len();
        self.push(Sent::Video {
            chat_id,
            reply_to,
            path: path.to_path_buf(),
            size,
        });
        Ok(())
    }

    async fn send_presence(&self, chat_id: i64) -> AppResult<()> {
        self.push(Sent::Presence { chat_id });
        Ok(())
    }
}
