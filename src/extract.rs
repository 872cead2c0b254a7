//! Clip-extraction commands derived from match records.
//!
//! A command downloads a short window around a match with an external
//! downloader (`yt-dlp` by default):
//!
//! ```text
//! yt-dlp -f 134+140 'https://youtu.be/<id>' --download-sections '*00:01:35-00:01:50' -o '<id>-100.%(ext)s'
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::types::{MatchRecord, Video};

/// Downloader invocation and the window taken around each match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClipSpec {
    /// Downloader executable.
    pub downloader: String,
    /// Format selector passed with `-f`.
    pub format: String,
    /// Offset of the clip start from the match, seconds (usually negative).
    pub lead_seconds: f64,
    /// Clip length, seconds.
    pub trail_seconds: f64,
}

impl Default for ClipSpec {
    fn default() -> Self {
        Self {
            downloader: "yt-dlp".to_string(),
            format: "134+140".to_string(),
            lead_seconds: -5.0,
            trail_seconds: 15.0,
        }
    }
}

/// `[start, end]` of a clip, seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub start: f64,
    pub end: f64,
}

impl ClipSpec {
    /// Window around a match at `offset` seconds. Both ends are clamped at
    /// zero so a lead reaching before the start of the video stays valid.
    pub fn window(&self, offset: f64) -> ClipWindow {
        let start = offset + self.lead_seconds;
        ClipWindow {
            start: start.max(0.0),
            end: (start + self.trail_seconds).max(0.0),
        }
    }
}

/// Zero-padded `HH:MM:SS`. Hours are not wrapped at 24.
pub fn format_duration(seconds: f64) -> String {
    let hours = (seconds / 3600.0).floor() as i64;
    let minutes = ((seconds / 60.0) % 60.0).floor() as i64;
    let secs = (seconds % 60.0).floor() as i64;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Extraction command for one match.
pub fn build_command(record: &MatchRecord, video: &Video, spec: &ClipSpec) -> String {
    let window = spec.window(record.time_offset_seconds);
    format!(
        "{} -f {} '{}' --download-sections '*{}-{}' -o '{}-{}.%(ext)s'",
        spec.downloader,
        spec.format,
        video.url(),
        format_duration(window.start),
        format_duration(window.end),
        video.id,
        record.time_offset_seconds,
    )
}

/// Export document for a whole result.
///
/// Matches are taken in the given order. A `# <title>` header block is
/// written whenever the video changes, and a command identical to the one
/// just written is skipped along with its comment lines. The output depends
/// only on the inputs.
pub fn build_export_document(matches: &[MatchRecord], videos: &[Video], spec: &ClipSpec) -> String {
    let mut doc = String::new();
    let mut prev_video: Option<usize> = None;
    let mut prev_command = String::new();

    for (match_index, record) in matches.iter().enumerate() {
        let Some(video) = videos.get(record.archive_index) else {
            warn!(
                match_index,
                archive_index = record.archive_index,
                "skipping match for unknown video"
            );
            continue;
        };

        if prev_video != Some(record.archive_index) {
            prev_video = Some(record.archive_index);
            doc.push_str("\n\n# ");
            doc.push_str(&video.title);
            doc.push('\n');
        }

        let command = build_command(record, video, spec);
        if command != prev_command {
            doc.push_str("# ");
            doc.push_str(&record.text);
            doc.push('\n');
            doc.push_str("# ");
            doc.push_str(&video.url_at(record.time_offset_seconds));
            doc.push('\n');
            doc.push_str(&command);
            doc.push_str("\n\n");
            prev_command = command;
        }
    }
    doc
}
