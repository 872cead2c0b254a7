//! Shared fixtures: a scripted in-memory search service and log capture.

use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use subsearch::model::types::ArchiveSummary;
use subsearch::protocol::{ArchiveResponse, SearchRequest, SearchResponse};
use subsearch::service::{SearchService, ServiceError};

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedService {
    searches: Mutex<VecDeque<Result<SearchResponse, ServiceError>>>,
    archives: Mutex<VecDeque<Result<ArchiveResponse, ServiceError>>>,
    archive_list: Mutex<Vec<ArchiveSummary>>,
    search_log: Mutex<Vec<SearchRequest>>,
    archive_log: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedService {
    pub fn with_archives(names: &[&str]) -> Self {
        let service = Self::default();
        *service.archive_list.lock().unwrap() = names
            .iter()
            .map(|name| ArchiveSummary {
                name: name.to_string(),
                icon: format!("{name}.webp"),
            })
            .collect();
        service
    }

    pub fn push_search(&self, response: Result<SearchResponse, ServiceError>) {
        self.searches.lock().unwrap().push_back(response);
    }

    pub fn push_archive(&self, response: Result<ArchiveResponse, ServiceError>) {
        self.archives.lock().unwrap().push_back(response);
    }

    pub fn search_requests(&self) -> Vec<SearchRequest> {
        self.search_log.lock().unwrap().clone()
    }

    pub fn archive_requests(&self) -> Vec<String> {
        self.archive_log.lock().unwrap().clone()
    }
}

impl SearchService for ScriptedService {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ServiceError> {
        self.search_log.lock().unwrap().push(request.clone());
        self.searches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Unavailable("no scripted search".into())))
    }

    async fn fetch_archive(&self, name: &str) -> Result<ArchiveResponse, ServiceError> {
        self.archive_log.lock().unwrap().push(name.to_string());
        self.archives
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Unavailable("no scripted archive".into())))
    }

    async fn fetch_archives(&self) -> Result<Vec<ArchiveSummary>, ServiceError> {
        Ok(self.archive_list.lock().unwrap().clone())
    }
}

/// Two videos: `aaa` (2020) and `bbb` (2021).
#[allow(dead_code)]
pub fn two_video_archive(version: u64) -> ArchiveResponse {
    serde_json::from_value(json!({
        "version": version,
        "archive": [
            {"i": "aaa", "t": "First episode", "u": 1_577_836_800},
            {"i": "bbb", "t": "Second episode", "u": 1_614_945_600}
        ]
    }))
    .unwrap()
}

/// Three matches for "cat", two in video 0 and one in video 1, split over
/// two pages.
#[allow(dead_code)]
pub fn cat_result(version: u64) -> SearchResponse {
    serde_json::from_value(json!({
        "version": version,
        "search": [
            {"i": 0, "t": 10, "s": "the cat sat"},
            {"i": 0, "t": 95, "s": "a cat again"},
            {"i": 1, "t": 3, "s": "cats everywhere"}
        ],
        "archive": [2, 1],
        "pages": [[{"begin": 0, "end": 2}], [{"begin": 2, "end": 3}]],
        "archive_pages": [0, 1]
    }))
    .unwrap()
}

/// One match in video 0, single page.
#[allow(dead_code)]
pub fn dog_result(version: u64) -> SearchResponse {
    serde_json::from_value(json!({
        "version": version,
        "search": [{"i": 0, "t": 42, "s": "hot dog"}],
        "archive": [1, 0],
        "pages": [[{"begin": 0, "end": 1}]],
        "archive_pages": [0, 0]
    }))
    .unwrap()
}

#[allow(dead_code)]
pub fn no_result() -> SearchResponse {
    serde_json::from_value(json!({})).unwrap()
}
