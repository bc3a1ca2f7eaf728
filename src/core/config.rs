use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Bytes in one mebibyte
pub const MIB: u64 = 1024 * 1024;

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Directory holding in-flight and retained output files
/// Read from TEMP_FILES_DIR environment variable
/// Defaults to the OS temp directory
pub static TEMP_FILES_DIR: Lazy<PathBuf> = Lazy::new(|| {
    env::var("TEMP_FILES_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: yturl.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "yturl.log".to_string()));

/// Port for the HTTP API
/// Read from WEB_PORT environment variable
/// Default: 8080
pub static WEB_PORT: Lazy<u16> = Lazy::new(|| env::var("WEB_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080));

/// Telegram bot configuration
pub mod telegram {
    use super::{Duration, MIB};
    use once_cell::sync::Lazy;
    use std::env;

    /// Bot token. The bot only starts when this is set.
    /// Read from TELEGRAM_BOT environment variable
    pub static BOT_TOKEN: Lazy<Option<String>> =
        Lazy::new(|| env::var("TELEGRAM_BOT").ok().filter(|s| !s.trim().is_empty()));

    /// Owner registered on a previous run
    /// Read from TELEGRAM_OWNER environment variable
    pub static OWNER_ID: Lazy<Option<i64>> = Lazy::new(|| parse_owner_id(env::var("TELEGRAM_OWNER").ok().as_deref()));

    /// Env-style file the owner id is written back to on first claim
    /// Read from OWNER_ENV_FILE environment variable
    /// Default: .env
    pub static OWNER_ENV_FILE: Lazy<String> =
        Lazy::new(|| env::var("OWNER_ENV_FILE").unwrap_or_else(|_| ".env".to_string()));

    /// Key used for the owner id in the env file
    pub const OWNER_ENV_KEY: &str = "TELEGRAM_OWNER";

    /// Bot API upload limit (50 MB)
    pub const MAX_FILE_SIZE_BYTES: u64 = 50 * MIB;

    /// Raw format sizes are inflated by this factor to account for the muxed audio track
    pub const SIZE_INFLATION: f64 = 1.15;

    /// Height used when nothing fits the ceiling by known size
    pub const FALLBACK_MAX_HEIGHT: u32 = 720;

    /// Telegram shows a chat action for ~5 seconds, so it is resent every 4
    pub const PRESENCE_INTERVAL_SECS: u64 = 4;

    pub fn presence_interval() -> Duration {
        Duration::from_secs(PRESENCE_INTERVAL_SECS)
    }

    /// `0`, empty and garbage all mean "no owner yet"
    pub fn parse_owner_id(raw: Option<&str>) -> Option<i64> {
        raw.and_then(|s| s.trim().parse::<i64>().ok()).filter(|id| *id != 0)
    }
}

/// Retained file lifetimes
pub mod retention {
    use super::Duration;

    /// Delay before deleting a file that has just been served
    pub const FETCH_GRACE_SECS: u64 = 5;

    /// Delay before deleting a finished file nobody fetched
    pub const ABANDONED_SECS: u64 = 600; // 10 minutes

    pub fn fetch_grace() -> Duration {
        Duration::from_secs(FETCH_GRACE_SECS)
    }

    pub fn abandoned() -> Duration {
        Duration::from_secs(ABANDONED_SECS)
    }
}

/// Format selection configuration
pub mod formats {
    /// Maximum number of choices shown per mode
    pub const MAX_CHOICES: usize = 5;

    /// Audio bitrates are deduplicated by rounding to this many kbps
    pub const AUDIO_BUCKET_KBPS: f64 = 10.0;

    /// Container the web client and the bot both receive for video
    pub const VIDEO_CONTAINER: &str = "mp4";

    /// Container audio extraction converts to
    pub const AUDIO_CONTAINER: &str = "mp3";

    /// Extension preferred for the audio track merged into a video download
    pub const PREFERRED_AUDIO_EXT: &str = "m4a";
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for thumbnail proxy fetches (in seconds)
    pub const THUMBNAIL_TIMEOUT_SECS: u64 = 15;

    pub fn thumbnail_timeout() -> Duration {
        Duration::from_secs(THUMBNAIL_TIMEOUT_SECS)
    }

    /// Domains the thumbnail proxy will fetch from (the domain itself or any
    /// subdomain)
    pub const THUMBNAIL_PROXY_DOMAINS: [&str; 2] = ["cdninstagram.com", "fbcdn.net"];

    /// Bot API request timeout (in seconds); uploads of up to 50 MB go through it
    pub const BOT_REQUEST_TIMEOUT_SECS: u64 = 300;

    pub fn bot_request_timeout() -> Duration {
        Duration::from_secs(BOT_REQUEST_TIMEOUT_SECS)
    }
}
