//! yt-dlp progress text → structured progress events.
//!
//! yt-dlp (run with `--newline`) prints one marker per line. Four markers
//! matter:
//!
//! | marker                      | event                                   |
//! |-----------------------------|-----------------------------------------|
//! | `[download] Destination:`   | starts a new leg; 2nd leg in video mode |
//! |                             | emits `downloading_audio` at 0%         |
//! | `[download]  42.0%`         | `downloading_video`/`downloading_audio` |
//! | `[Merger]`                  | `merging`, indeterminate                |
//! | `[ExtractAudio]`            | `converting`, indeterminate             |
//!
//! Destination and percent are checked in that order on the same line (so a
//! percent on the line that opened leg 2 is already attributed to audio).
//! Merger and ExtractAudio are checked only when neither of the first two
//! matched; their trigger text never overlaps the `[download]` markers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

/// What the caller asked for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize, Display, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    #[default]
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    DownloadingVideo,
    DownloadingAudio,
    Merging,
    Converting,
    Done,
    Error,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Error)
    }
}

/// Percent value for stages without a measurable fraction
pub const INDETERMINATE: f64 = -1.0;

/// One step of a job, as sent to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub stage: Stage,
    pub percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProgressEvent {
    pub fn stage(stage: Stage, percent: f64) -> Self {
        Self {
            stage,
            percent,
            file_id: None,
            ext: None,
            error_message: None,
        }
    }

    pub fn done(file_id: impl Into<String>, ext: impl Into<String>) -> Self {
        Self {
            file_id: Some(file_id.into()),
            ext: Some(ext.into()),
            ..Self::stage(Stage::Done, 100.0)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::stage(Stage::Error, 0.0)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Destination,
    Percent,
    Merge,
    ExtractAudio,
}

/// Closed pattern table, in precedence order
static MARKERS: Lazy<Vec<(Marker, Regex)>> = Lazy::new(|| {
    [
        (Marker::Destination, r"\[download\] Destination:"),
        (Marker::Percent, r"\[download\]\s+([\d.]+)%"),
        (Marker::Merge, r"\[Merger\]"),
        (Marker::ExtractAudio, r"\[ExtractAudio\]"),
    ]
    .into_iter()
    .filter_map(|(marker, pattern)| Regex::new(pattern).ok().map(|re| (marker, re)))
    .collect()
});

fn marker_regex(marker: Marker) -> Option<&'static Regex> {
    MARKERS.iter().find(|(m, _)| *m == marker).map(|(_, re)| re)
}

/// Per-job line classifier. Feed it every output line in order.
#[derive(Debug)]
pub struct ProgressTracker {
    mode: Mode,
    legs: u32,
}

impl ProgressTracker {
    pub fn new(mode: Mode) -> Self {
        Self { mode, legs: 0 }
    }

    /// Number of `Destination:` lines seen so far
    pub fn legs(&self) -> u32 {
        self.legs
    }

    /// Event emitted before yt-dlp has printed anything
    pub fn initial_event(&self) -> ProgressEvent {
        let stage = match self.mode {
            Mode::Video => Stage::DownloadingVideo,
            Mode::Audio => Stage::DownloadingAudio,
        };
        ProgressEvent::stage(stage, 0.0)
    }

    fn download_stage(&self) -> Stage {
        if self.mode == Mode::Audio || self.legs >= 2 {
            Stage::DownloadingAudio
        } else {
            Stage::DownloadingVideo
        }
    }

    /// Classify one line. Usually yields zero or one event, at most two.
    pub fn feed(&mut self, line: &str) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        let mut download_marker = false;

        if marker_regex(Marker::Destination).is_some_and(|re| re.is_match(line)) {
            download_marker = true;
            self.legs += 1;
            if self.legs == 2 && self.mode == Mode::Video {
                events.push(ProgressEvent::stage(Stage::DownloadingAudio, 0.0));
            }
        }

        if let Some(percent) = marker_regex(Marker::Percent)
            .and_then(|re| re.captures(line))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
        {
            download_marker = true;
            events.push(ProgressEvent::stage(self.download_stage(), percent));
        }

        if !download_marker {
            if marker_regex(Marker::Merge).is_some_and(|re| re.is_match(line)) {
                events.push(ProgressEvent::stage(Stage::Merging, INDETERMINATE));
            } else if marker_regex(Marker::ExtractAudio).is_some_and(|re| re.is_match(line)) {
                events.push(ProgressEvent::stage(Stage::Converting, INDETERMINATE));
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stages(events: &[ProgressEvent]) -> Vec<(Stage, f64)> {
        events.iter().map(|e| (e.stage, e.percent)).collect()
    }

    #[test]
    fn test_video_two_legs_and_merge() {
        let mut tracker = ProgressTracker::new(Mode::Video);
        let lines = [
            "[youtube] abc: Downloading webpage",
            "[download] Destination: /tmp/x.f137.mp4",
            "[download]   0.0% of 10.00MiB at 1.00MiB/s ETA 00:10",
            "[download]  55.3% of 10.00MiB at 1.00MiB/s ETA 00:05",
            "[download] 100% of 10.00MiB in 00:10",
            "[download] Destination: /tmp/x.f140.m4a",
            "[download]  12.5% of 3.00MiB",
            "[Merger] Merging formats into \"/tmp/x.mp4\"",
            "Deleting original file /tmp/x.f137.mp4",
        ];
        let events: Vec<ProgressEvent> = lines.iter().flat_map(|l| tracker.feed(l)).collect();
        assert_eq!(
            stages(&events),
            vec![
                (Stage::DownloadingVideo, 0.0),
                (Stage::DownloadingVideo, 55.3),
                (Stage::DownloadingVideo, 100.0),
                (Stage::DownloadingAudio, 0.0),
                (Stage::DownloadingAudio, 12.5),
                (Stage::Merging, INDETERMINATE),
            ]
        );
        assert_eq!(tracker.legs(), 2);
    }

    #[test]
    fn test_audio_mode_always_audio_stage() {
        let mut tracker = ProgressTracker::new(Mode::Audio);
        let mut events = tracker.feed("[download] Destination: /tmp/x.webm");
        events.extend(tracker.feed("[download]  40.0% of 3.00MiB"));
        events.extend(tracker.feed("[ExtractAudio] Destination: /tmp/x.mp3"));
        assert_eq!(
            stages(&events),
            vec![(Stage::DownloadingAudio, 40.0), (Stage::Converting, INDETERMINATE)]
        );
        // ExtractAudio's own "Destination:" is not a download leg
        assert_eq!(tracker.legs(), 1);
    }

    #[test]
    fn test_audio_mode_second_destination_is_silent() {
        let mut tracker = ProgressTracker::new(Mode::Audio);
        tracker.feed("[download] Destination: a");
        assert!(tracker.feed("[download] Destination: b").is_empty());
    }

    #[test]
    fn test_third_leg_stays_audio() {
        let mut tracker = ProgressTracker::new(Mode::Video);
        tracker.feed("[download] Destination: a");
        tracker.feed("[download] Destination: b");
        assert!(tracker.feed("[download] Destination: c").is_empty());
        assert_eq!(
            stages(&tracker.feed("[download]   3.0%")),
            vec![(Stage::DownloadingAudio, 3.0)]
        );
    }

    #[test]
    fn test_unrelated_lines_ignored() {
        let mut tracker = ProgressTracker::new(Mode::Video);
        for line in ["", "[info] abc: Downloading 1 format(s): 137+140", "WARNING: x", "[download] Got 100 %"] {
            assert!(tracker.feed(line).is_empty(), "{}", line);
        }
    }

    #[test]
    fn test_initial_event() {
        assert_eq!(
            ProgressTracker::new(Mode::Video).initial_event().stage,
            Stage::DownloadingVideo
        );
        assert_eq!(
            ProgressTracker::new(Mode::Audio).initial_event().stage,
            Stage::DownloadingAudio
        );
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(ProgressEvent::done("id-1", "mp4")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"stage": "done", "percent": 100.0, "fileId": "id-1", "ext": "mp4"})
        );
        let json = serde_json::to_value(ProgressEvent::error("Download failed")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"stage": "error", "percent": 0.0, "error": "Download failed"})
        );
        let json = serde_json::to_value(ProgressEvent::stage(Stage::Merging, INDETERMINATE)).unwrap();
        assert_eq!(json, serde_json::json!({"stage": "merging", "percent": -1.0}));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("audio".parse::<Mode>().unwrap(), Mode::Audio);
        assert_eq!("video".parse::<Mode>().unwrap(), Mode::Video);
        assert!("gif".parse::<Mode>().is_err());
        assert_eq!(Mode::default(), Mode::Video);
    }
}
