//! Format selection.
//!
//! yt-dlp usually lists dozens of near-identical encodings. The web client
//! gets at most [`MAX_CHOICES`] per mode, one per quality tier, highest
//! first. The bot does not ask the user at all; [`select_for_chat`] picks a
//! single format under the upload ceiling.

use serde::Serialize;
use std::collections::HashSet;

use crate::core::config::formats::{AUDIO_BUCKET_KBPS, MAX_CHOICES, VIDEO_CONTAINER};
use crate::core::config::telegram::{FALLBACK_MAX_HEIGHT, SIZE_INFLATION};
use crate::download::metadata::FormatCandidate;

/// A user-facing projection of one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatChoice {
    pub format_id: String,
    #[serde(rename = "quality")]
    pub quality_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(rename = "bitrate", skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<f64>,
    #[serde(rename = "filesize")]
    pub estimated_size_bytes: Option<u64>,
}

fn is_video_candidate(f: &FormatCandidate) -> bool {
    f.container_ext == VIDEO_CONTAINER && f.has_video() && f.height() > 0
}

/// mp4 video-bearing candidates, tallest first; ties keep source order.
fn video_candidates_by_height(formats: &[FormatCandidate]) -> Vec<&FormatCandidate> {
    let mut candidates: Vec<&FormatCandidate> = formats.iter().filter(|f| is_video_candidate(f)).collect();
    // sort_by is stable
    candidates.sort_by(|a, b| b.height().cmp(&a.height()));
    candidates
}

/// Video choices: one per height, tallest first, at most five.
pub fn video_choices(formats: &[FormatCandidate]) -> Vec<FormatChoice> {
    let mut seen_heights = HashSet::new();
    video_candidates_by_height(formats)
        .into_iter()
        .filter(|f| seen_heights.insert(f.height()))
        .take(MAX_CHOICES)
        .map(|f| FormatChoice {
            format_id: f.format_id.clone(),
            quality_label: format!("{}p", f.height()),
            height: Some(f.height()),
            bitrate_kbps: f.total_bitrate_kbps,
            estimated_size_bytes: f.size_bytes(),
        })
        .collect()
}

/// Bitrate rounded to the nearest 10 kbps tier
pub fn bitrate_bucket(kbps: f64) -> i64 {
    (kbps / AUDIO_BUCKET_KBPS).round() as i64
}

/// Audio choices: audio-only streams, one per 10 kbps tier, highest first,
/// at most five.
pub fn audio_choices(formats: &[FormatCandidate]) -> Vec<FormatChoice> {
    let mut candidates: Vec<(&FormatCandidate, f64)> = formats
        .iter()
        .filter(|f| f.has_audio() && !f.has_video())
        .filter_map(|f| f.bitrate_kbps().map(|kbps| (f, kbps)))
        .collect();
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut seen_buckets = HashSet::new();
    candidates
        .into_iter()
        .filter(|(_, kbps)| seen_buckets.insert(bitrate_bucket(*kbps)))
        .take(MAX_CHOICES)
        .map(|(f, kbps)| FormatChoice {
            format_id: f.format_id.clone(),
            quality_label: format!("{}kbps", kbps.round() as i64),
            height: None,
            bitrate_kbps: Some(kbps),
            estimated_size_bytes: f.size_bytes(),
        })
        .collect()
}

/// Raw size inflated for the audio track that gets muxed in
pub fn estimated_merged_size(f: &FormatCandidate) -> Option<u64> {
    f.size_bytes().map(|size| (size as f64 * SIZE_INFLATION) as u64)
}

/// Pick one format for a chat upload limited to `ceiling` bytes.
///
/// In order:
/// 1. the tallest candidate whose inflated size is known and fits,
/// 2. else the tallest candidate at or below 720p,
/// 3. else the shortest candidate available,
/// 4. else `None`.
pub fn select_for_chat(formats: &[FormatCandidate], ceiling: u64) -> Option<&FormatCandidate> {
    let candidates = video_candidates_by_height(formats);

    candidates
        .iter()
        .find(|f| estimated_merged_size(f).is_some_and(|size| size <= ceiling))
        .or_else(|| candidates.iter().find(|f| f.height() <= FALLBACK_MAX_HEIGHT))
        .or_else(|| candidates.last())
        .copied()
}
