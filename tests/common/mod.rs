//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

pub const MIB: u64 = 1024 * 1024;

/// A metadata document with three mp4 video tiers, one webm duplicate and
/// two audio-only streams.
pub fn sample_metadata(thumbnail: &str) -> String {
    json!({
        "id": "dQw4w9WgXcQ",
        "title": "Sample Clip",
        "uploader": "Sample Channel",
        "duration": 3725.4,
        "thumbnail": thumbnail,
        "formats": [
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5, "filesize": 3_400_000},
            {"format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus", "abr": 160.1, "filesize_approx": 4_000_000},
            {"format_id": "18", "ext": "mp4", "height": 360, "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "tbr": 500.0, "filesize": 20 * MIB},
            {"format_id": "136", "ext": "mp4", "height": 720, "vcodec": "avc1.4d401f", "acodec": "none", "tbr": 1500.0, "filesize": 40 * MIB},
            {"format_id": "247", "ext": "webm", "height": 720, "vcodec": "vp9", "acodec": "none", "tbr": 1400.0},
            {"format_id": "137", "ext": "mp4", "height": 1080, "vcodec": "avc1.640028", "acodec": "none", "tbr": 4400.0, "filesize": 80 * MIB}
        ]
    })
    .to_string()
}

/// `data:` payloads of an SSE body, parsed as JSON
pub fn sse_events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

/// Whether a process with this pid is still in the process table
pub fn process_alive(pid: i32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

/// Poll `cond` every 20 ms for up to 5 s
pub async fn wait_until<F: FnMut() -> bool>(mut cond: F) -> bool {
    for _ in 0..250 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

/// Files in `dir` whose name starts with `stem`
pub fn files_with_stem(dir: &Path, stem: &str) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(stem))
        .collect()
}
