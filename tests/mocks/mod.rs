//! Test doubles for the external collaborators
//!
//! - `fake_ytdlp`: a generated shell script standing in for yt-dlp
//! - `chat_transport`: a `ChatTransport` that records what the bot sent

pub mod chat_transport;
pub mod fake_ytdlp;

#[allow(unused_imports)]
pub use chat_transport::{RecordingTransport, Sent};
#[allow(unused_imports)]
pub use fake_ytdlp::{FakeYtDlp, FakeYtDlpBuilder};
