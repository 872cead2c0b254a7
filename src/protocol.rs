//! Wire records exchanged with the search server.
//!
//! Every request is a JSON `POST` to the same endpoint. The archive list is
//! requested with the literal body `get_archives`; everything else is a JSON
//! object. Responses are decoded into the loose wire shapes below and then
//! validated into the model types, so nothing past this module reads
//! optional-looking fields ad hoc.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::types::{Archive, ArchiveSummary, MatchRecord, PageRange, ResultPayload, Video};
use crate::paginator::{LayoutError, RESULTS_PER_PAGE, check_layout, derive_layout};

/// Body of the archive list request.
pub const ARCHIVE_LIST_REQUEST: &str = "get_archives";

/// Search request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchRequest {
    /// Archive (context) to search within.
    pub archive: String,
    /// Lowercased search pattern.
    pub substr: String,
    /// Desired width of each returned text segment, in characters.
    pub substr_size: u32,
}

/// Archive metadata request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveRequest {
    pub get_archive: String,
}

/// One match as sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireMatch {
    /// Archive index.
    pub i: usize,
    /// Offset into the video, seconds.
    pub t: f64,
    /// Text segment around the match.
    pub s: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visited: Option<bool>,
}

/// Search response. The server answers `{}` when no query could be run, so
/// every field is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<Vec<WireMatch>>,
    /// Match count per archive index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<Vec<PageRange>>>,
    /// Page index per archive index. Advisory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_pages: Option<Vec<usize>>,
}

/// One video as sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireVideo {
    /// Video id.
    pub i: String,
    /// Title.
    pub t: String,
    /// Upload timestamp, seconds since the epoch.
    pub u: i64,
}

/// Archive metadata response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveResponse {
    pub version: u64,
    pub archive: Vec<WireVideo>,
}

/// Errors raised while validating a decoded response.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("search response carries results but no version")]
    MissingVersion,

    #[error("invalid page layout: {0}")]
    InvalidPages(#[from] LayoutError),

    #[error("match {match_index} references archive index {index}, archive has {videos} videos")]
    ArchiveIndexOutOfRange {
        match_index: usize,
        index: usize,
        videos: usize,
    },

    #[error("{counts} per-video counts for an archive of {videos} videos")]
    CountMismatch { counts: usize, videos: usize },
}

impl SearchRequest {
    pub fn new(archive: impl Into<String>, pattern: impl Into<String>, substr_size: u32) -> Self {
        Self {
            archive: archive.into(),
            substr: pattern.into(),
            substr_size,
        }
    }
}

impl ArchiveRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            get_archive: name.into(),
        }
    }
}

impl SearchResponse {
    /// Validate the response shape.
    ///
    /// Returns `Ok(None)` when the response has no `search` field, which the
    /// caller renders as the empty state. Client-side `visited` flags from the
    /// wire are discarded; every match of a fresh result starts unvisited.
    pub fn into_payload(self) -> Result<Option<ResultPayload>, ProtocolError> {
        let Some(search) = self.search else {
            return Ok(None);
        };
        let version = self.version.ok_or(ProtocolError::MissingVersion)?;

        let matches: Vec<MatchRecord> = search
            .into_iter()
            .map(|m| MatchRecord::new(m.i, m.t, m.s))
            .collect();

        // The server omits the layout when the match count is an exact
        // multiple of its page size; rebuild it with the same cut.
        let pages = match self.pages {
            Some(pages) => pages,
            None => derive_layout(&matches, RESULTS_PER_PAGE),
        };
        check_layout(&matches, &pages)?;

        Ok(Some(ResultPayload {
            version,
            matches,
            per_video_count: self.archive.unwrap_or_default(),
            pages,
        }))
    }
}

impl ArchiveResponse {
    /// Build the archive record named `name`, returning it with its version.
    pub fn into_archive(self, name: impl Into<String>, icon: Option<String>) -> (Archive, u64) {
        let videos = self
            .archive
            .into_iter()
            .map(|v| Video {
                id: v.i,
                title: v.t,
                uploaded_at: v.u,
            })
            .collect();
        (
            Archive {
                name: name.into(),
                icon,
                videos,
            },
            self.version,
        )
    }
}

/// Check that a payload references only videos that exist in `archive`.
pub fn validate_against(payload: &ResultPayload, archive: &Archive) -> Result<(), ProtocolError> {
    let videos = archive.videos.len();
    if let Some((match_index, m)) = payload
        .matches
        .iter()
        .enumerate()
        .find(|(_, m)| m.archive_index >= videos)
    {
        return Err(ProtocolError::ArchiveIndexOutOfRange {
            match_index,
            index: m.archive_index,
            videos,
        });
    }

    let counts = payload.per_video_count.len();
    if (!payload.matches.is_empty() || counts > 0) && counts != videos {
        return Err(ProtocolError::CountMismatch { counts, videos });
    }
    Ok(())
}

/// Decode the archive list body.
pub fn decode_archive_list(body: &[u8]) -> Result<Vec<ArchiveSummary>, serde_json::Error> {
    serde_json::from_slice(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn archive_of(n: usize) -> Archive {
        Archive {
            name: "demo".into(),
            icon: None,
            videos: (0..n)
                .map(|i| Video {
                    id: format!("vid{i}"),
                    title: format!("Video {i}"),
                    uploaded_at: 1_600_000_000,
                })
                .collect(),
        }
    }

    #[test]
    fn search_request_serializes_wire_names() {
        let req = SearchRequest::new("demo", "cat", 120);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({"archive": "demo", "substr": "cat", "substr_size": 120})
        );
    }

    #[test]
    fn archive_request_serializes_wire_names() {
        let value = serde_json::to_value(ArchiveRequest::new("demo")).unwrap();
        assert_eq!(value, json!({"get_archive": "demo"}));
    }

    #[test]
    fn empty_object_means_no_result() {
        let resp: SearchResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp.into_payload().unwrap(), None);
    }

    #[test]
    fn full_response_decodes_into_payload() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "search": [
                {"s": "the cat sat", "t": 10, "i": 0},
                {"s": "a cat", "t": 20, "i": 0, "visited": true},
                {"s": "cats", "t": 5, "i": 1}
            ],
            "archive": [2, 1],
            "version": 2,
            "pages": [[{"begin": 0, "end": 2}], [{"begin": 2, "end": 3}]],
            "archive_pages": [0, 1]
        }))
        .unwrap();

        let payload = resp.into_payload().unwrap().unwrap();
        assert_eq!(payload.version, 2);
        assert_eq!(payload.matches.len(), 3);
        assert!(payload.matches.iter().all(|m| !m.visited));
        assert_eq!(payload.per_video_count, vec![2, 1]);
        assert_eq!(payload.pages.len(), 2);
        validate_against(&payload, &archive_of(2)).unwrap();
    }

    #[test]
    fn results_without_version_are_rejected() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "search": [{"s": "cat", "t": 1, "i": 0}],
            "archive": [1],
            "pages": [[{"begin": 0, "end": 1}]]
        }))
        .unwrap();
        assert_eq!(
            resp.into_payload().unwrap_err(),
            ProtocolError::MissingVersion
        );
    }

    #[test]
    fn gapped_pages_are_rejected() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "search": [
                {"s": "cat", "t": 1, "i": 0},
                {"s": "cat", "t": 2, "i": 1}
            ],
            "archive": [1, 1],
            "version": 2,
            "pages": [[{"begin": 0, "end": 1}], [{"begin": 0, "end": 2}]]
        }))
        .unwrap();
        assert!(matches!(
            resp.into_payload(),
            Err(ProtocolError::InvalidPages(_))
        ));
    }

    #[test]
    fn missing_layout_is_derived_from_video_runs() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "search": [
                {"s": "cat", "t": 1, "i": 0},
                {"s": "cat", "t": 2, "i": 0},
                {"s": "cat", "t": 3, "i": 1}
            ],
            "archive": [2, 1],
            "version": 2
        }))
        .unwrap();
        let payload = resp.into_payload().unwrap().unwrap();
        assert_eq!(
            payload.pages,
            vec![vec![PageRange::new(0, 2), PageRange::new(2, 3)]]
        );
    }

    #[test]
    fn missing_layout_is_cut_at_page_size() {
        let search: Vec<_> = (0..2 * RESULTS_PER_PAGE)
            .map(|n| json!({"s": "cat", "t": n, "i": n / 100}))
            .collect();
        let resp: SearchResponse = serde_json::from_value(json!({
            "search": search,
            "archive": vec![100; 2 * RESULTS_PER_PAGE / 100 + 1],
            "version": 3
        }))
        .unwrap();
        let payload = resp.into_payload().unwrap().unwrap();
        assert_eq!(payload.pages.len(), 2);
        assert_eq!(payload.pages[0].last().unwrap().end, RESULTS_PER_PAGE);
        assert_eq!(payload.pages[1][0].begin, RESULTS_PER_PAGE);
        assert_eq!(payload.pages[1].last().unwrap().end, 2 * RESULTS_PER_PAGE);
    }

    #[test]
    fn out_of_range_archive_index_is_rejected() {
        let payload = ResultPayload {
            version: 1,
            matches: vec![MatchRecord::new(3, 1.0, "cat")],
            per_video_count: vec![1],
            pages: vec![vec![PageRange::new(0, 1)]],
        };
        assert_eq!(
            validate_against(&payload, &archive_of(1)).unwrap_err(),
            ProtocolError::ArchiveIndexOutOfRange {
                match_index: 0,
                index: 3,
                videos: 1
            }
        );
    }

    #[test]
    fn count_length_must_match_video_count() {
        let payload = ResultPayload {
            version: 1,
            matches: vec![MatchRecord::new(0, 1.0, "cat")],
            per_video_count: vec![1],
            pages: vec![vec![PageRange::new(0, 1)]],
        };
        assert_eq!(
            validate_against(&payload, &archive_of(2)).unwrap_err(),
            ProtocolError::CountMismatch {
                counts: 1,
                videos: 2
            }
        );
    }

    #[test]
    fn archive_response_builds_archive() {
        let resp: ArchiveResponse = serde_json::from_value(json!({
            "archive": [{"i": "abc", "u": 1577836800, "t": "First"}],
            "version": 1
        }))
        .unwrap();
        let (archive, version) = resp.into_archive("demo", Some("icon.png".into()));
        assert_eq!(version, 1);
        assert_eq!(archive.videos[0].id, "abc");
        assert_eq!(archive.videos[0].uploaded_at, 1_577_836_800);
        assert_eq!(archive.icon.as_deref(), Some("icon.png"));
    }

    #[test]
    fn archive_list_decodes() {
        let list =
            decode_archive_list(br#"[{"name":"demo","icon":"data:image/webp;base64,AA=="}]"#)
                .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "demo");
    }
}
