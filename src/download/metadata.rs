//! Metadata fetching via `yt-dlp --dump-single-json`.
//!
//! The document is parsed into typed structs in one step: callers get either
//! a complete `MediaMetadata` or an error, never a half-filled value.

use serde::Deserialize;

use crate::core::error::{AppError, AppResult};
use crate::core::process::{run_to_output, ytdlp_command};

/// One encoding offered by the source, as reported by yt-dlp.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormatCandidate {
    pub format_id: String,
    #[serde(rename = "ext", default)]
    pub container_ext: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(rename = "vcodec", default)]
    pub video_codec: Option<String>,
    #[serde(rename = "acodec", default)]
    pub audio_codec: Option<String>,
    /// Average audio bitrate, falling back to total bitrate (kbps)
    #[serde(rename = "abr", default)]
    pub audio_bitrate_kbps: Option<f64>,
    #[serde(rename = "tbr", default)]
    pub total_bitrate_kbps: Option<f64>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub filesize: Option<u64>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub filesize_approx: Option<u64>,
}

/// Some extractors report sizes as floats (`1234567.0`); accept both.
fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|v| v.is_finite() && *v > 0.0).map(|v| v as u64))
}

impl FormatCandidate {
    /// Exact size if yt-dlp knows it, otherwise its estimate
    pub fn size_bytes(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }

    pub fn has_video(&self) -> bool {
        codec_present(self.video_codec.as_deref())
    }

    pub fn has_audio(&self) -> bool {
        codec_present(self.audio_codec.as_deref())
    }

    pub fn bitrate_kbps(&self) -> Option<f64> {
        self.audio_bitrate_kbps
            .filter(|b| *b > 0.0)
            .or(self.total_bitrate_kbps)
            .filter(|b| *b > 0.0)
    }

    pub fn height(&self) -> u32 {
        self.height.unwrap_or(0)
    }
}

fn codec_present(codec: Option<&str>) -> bool {
    matches!(codec, Some(c) if !c.is_empty() && c != "none")
}

/// Structured description of a media URL.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaMetadata {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "uploader", default)]
    pub uploader_name: Option<String>,
    #[serde(rename = "duration", default)]
    pub duration_seconds: Option<f64>,
    #[serde(rename = "thumbnail", default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatCandidate>,
}

/// Parse the JSON yt-dlp prints in dump mode.
pub fn parse_metadata(raw: &[u8]) -> AppResult<MediaMetadata> {
    Ok(serde_json::from_slice(raw)?)
}

/// Ask yt-dlp to describe `url` without downloading anything.
///
/// A non-zero exit becomes `AppError::Metadata` carrying only yt-dlp's final
/// `ERROR:` line; malformed output becomes `AppError::UnparseableMetadata`.
pub async fn fetch_metadata(ytdl_bin: &str, url: &str) -> AppResult<MediaMetadata> {
    let mut cmd = ytdlp_command(ytdl_bin);
    cmd.args(["--dump-single-json", "--no-playlist", "--no-warnings", "--skip-download", url]);

    log::debug!("Fetching metadata for URL: {}", url);
    let output = run_to_output(&mut cmd).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        log::error!("yt-dlp metadata failed ({}) for {}: {}", output.status, url, stderr.trim());
        return Err(AppError::Metadata(summarize_tool_error(&stderr)));
    }

    let metadata = parse_metadata(&output.stdout).inspect_err(|e| {
        log::error!("yt-dlp printed unparseable metadata for {}: {}", url, e);
    })?;
    log::info!(
        "Metadata for {}: '{}' with {} formats",
        url,
        metadata.title,
        metadata.formats.len()
    );
    Ok(metadata)
}

/// Reduce yt-dlp stderr to its last `ERROR:` line, without the prefix.
pub fn summarize_tool_error(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("ERROR:"))
        .map(|msg| msg.trim().to_string())
        .filter(|msg| !msg.is_empty())
        .unwrap_or_else(|| "unknown error".to_string())
}

/// Format seconds as M:SS or H:MM:SS.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
