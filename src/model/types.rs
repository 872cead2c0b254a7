//! Normalized entity structs shared by the session, the derived-data
//! components and the presentation layer.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One entry of the archive list (`get_archives`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub name: String,
    /// URL, path or `data:` URI of the archive icon.
    pub icon: String,
}

/// A source video. Its position in [`Archive::videos`] is the archive index
/// referenced by [`MatchRecord::archive_index`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Video {
    pub id: String,
    pub title: String,
    /// Upload time, seconds since the Unix epoch.
    pub uploaded_at: i64,
}

impl Video {
    /// Canonical short link for the video.
    pub fn url(&self) -> String {
        format!("https://youtu.be/{}", self.id)
    }

    /// Link that starts playback at `seconds`.
    pub fn url_at(&self, seconds: f64) -> String {
        format!("https://youtu.be/{}?t={}", self.id, seconds)
    }
}

/// A named collection of videos. Replaced wholesale on refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Archive {
    pub name: String,
    pub icon: Option<String>,
    pub videos: Vec<Video>,
}

impl Archive {
    pub fn video(&self, archive_index: usize) -> Option<&Video> {
        self.videos.get(archive_index)
    }
}

/// One occurrence of the search pattern within a video transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchRecord {
    pub archive_index: usize,
    pub time_offset_seconds: f64,
    pub text: String,
    /// Client-side state: set the first time the match is opened.
    #[serde(default)]
    pub visited: bool,
}

impl MatchRecord {
    pub fn new(archive_index: usize, time_offset_seconds: f64, text: impl Into<String>) -> Self {
        Self {
            archive_index,
            time_offset_seconds,
            text: text.into(),
            visited: false,
        }
    }
}

/// A `[begin, end)` slice of the match list covering one contiguous run of
/// a single video.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRange {
    pub begin: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_range(&self) -> Range<usize> {
        self.begin..self.end
    }
}

/// A validated search result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPayload {
    pub version: u64,
    pub matches: Vec<MatchRecord>,
    /// Occurrence count per archive index.
    pub per_video_count: Vec<u64>,
    /// Server-determined pages, each an ordered list of per-video ranges.
    pub pages: Vec<Vec<PageRange>>,
}

impl ResultPayload {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Every range of every page, in order.
    pub fn page_boundaries(&self) -> impl Iterator<Item = &PageRange> {
        self.pages.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_urls_use_short_link() {
        let video = Video {
            id: "abc123".into(),
            title: "t".into(),
            uploaded_at: 0,
        };
        assert_eq!(video.url(), "https://youtu.be/abc123");
        assert_eq!(video.url_at(42.0), "https://youtu.be/abc123?t=42");
    }

    #[test]
    fn page_range_len_saturates() {
        assert_eq!(PageRange::new(2, 5).len(), 3);
        assert!(PageRange::new(4, 4).is_empty());
        assert_eq!(PageRange::new(5, 2).len(), 0);
    }
}
