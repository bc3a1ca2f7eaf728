//! Source platform detection.
//!
//! Pure text matching: the first platform whose pattern matches anywhere in
//! the input wins, and the matched substring becomes the URL handed to
//! yt-dlp. That lets a chat message like "look at this https://youtu.be/x"
//! work the same as a bare link.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use strum::{AsRefStr, Display};

/// Supported source platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
    Unknown,
}

static PLATFORM_PATTERNS: Lazy<Vec<(Platform, Regex)>> = Lazy::new(|| {
    [
        (
            Platform::YouTube,
            r"(?i)(?:https?://)?(?:www\.|m\.|music\.)?(?:youtube\.com/(?:watch\?\S*v=|shorts/|live/|embed/)|youtu\.be/)[\w\-]+\S*",
        ),
        (
            Platform::TikTok,
            r"(?i)(?:https?://)?(?:www\.|m\.|vm\.|vt\.)?tiktok\.com/\S+",
        ),
        (
            Platform::Instagram,
            r"(?i)(?:https?://)?(?:www\.)?instagram\.com/(?:p|reel|reels|tv)/[\w\-]+\S*",
        ),
    ]
    .into_iter()
    .filter_map(|(platform, pattern)| match Regex::new(pattern) {
        Ok(re) => Some((platform, re)),
        Err(e) => {
            log::error!("Invalid platform pattern for {}: {}", platform, e);
            None
        }
    })
    .collect()
});

impl Platform {
    /// Classify free text. Returns the platform and the matched URL, or
    /// `(Unknown, "")` when nothing matches.
    pub fn detect(text: &str) -> (Platform, &str) {
        PLATFORM_PATTERNS
            .iter()
            .find_map(|(platform, re)| re.find(text).map(|m| (*platform, m.as_str())))
            .unwrap_or((Platform::Unknown, ""))
    }

    pub fn is_supported(self) -> bool {
        self != Platform::Unknown
    }
}

/// A URL plus the platform it was classified as.
///
/// For supported platforms `url` is the matched link; for `Unknown` it is the
/// raw (trimmed) input, kept for error reporting only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    pub url: String,
    pub platform: Platform,
}

impl MediaReference {
    pub fn detect(text: &str) -> Self {
        match Platform::detect(text) {
            (Platform::Unknown, _) => Self {
                url: text.trim().to_string(),
                platform: Platform::Unknown,
            },
            (platform, url) => Self {
                url: url.to_string(),
                platform,
            },
        }
    }

    pub fn is_supported(&self) -> bool {
        self.platform.is_supported()
    }
}
