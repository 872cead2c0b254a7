//! The search session: archive context, query lifecycle and the derived
//! presentation state of the current result.
//!
//! ```text
//! Idle -> AwaitingResult -> (StaleCache -> AwaitingArchiveRefresh ->)? Ready
//! ```
//!
//! Every query is stamped with a sequence number. Switching context or
//! issuing a newer query bumps the sequence, and a completion carrying an
//! older stamp is dropped without touching state.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{ArchiveCache, ArchiveCacheState};
use crate::chart::{self, BarSpec};
use crate::config::DEFAULT_SEGMENT_WIDTH;
use crate::extract::{self, ClipSpec};
use crate::highlight::{Markup, PatternHighlighter};
use crate::model::types::{ArchiveSummary, MatchRecord, Video};
use crate::paginator::Paginator;
use crate::protocol::{ProtocolError, SearchRequest, SearchResponse, validate_against};
use crate::service::{SearchService, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    AwaitingResult,
    StaleCache,
    AwaitingArchiveRefresh,
    Ready,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no archive selected")]
    NoArchiveContext,

    #[error("unknown archive '{0}'")]
    UnknownArchive(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("malformed response: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(
        "archive '{archive}' is at version {archive_version} after refresh, result is at {result_version}"
    )]
    VersionMismatch {
        archive: String,
        archive_version: u64,
        result_version: u64,
    },

    #[error("no result to navigate")]
    NoResult,

    #[error("page {index} out of range ({count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("match {index} out of range ({count} matches)")]
    MatchOutOfRange { index: usize, count: usize },
}

impl SessionError {
    /// Whether submitting the same query again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Service(e) => e.is_retryable(),
            SessionError::VersionMismatch { .. } => true,
            _ => false,
        }
    }
}

/// A query that has been issued and is waiting for its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    seq: u64,
    request: SearchRequest,
}

impl QueryTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStart {
    Issued(QueryTicket),
    /// Same normalized pattern as the last query; nothing to send.
    Duplicate,
    /// No archive is selected.
    NoContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ready { matches: usize },
    /// The server had nothing for this pattern.
    Empty,
    Duplicate,
    NoContext,
    /// A newer query or a context switch overtook this response.
    Superseded,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Requested width of text segments (`substr_size`).
    pub segment_width: u32,
    pub clip: ClipSpec,
    pub markup: Markup,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            segment_width: DEFAULT_SEGMENT_WIDTH,
            clip: ClipSpec::default(),
            markup: Markup::HTML,
        }
    }
}

/// The result currently on display, self-contained so that later cache
/// replacements cannot change it underneath the view.
#[derive(Debug, Clone)]
pub struct ActiveResult {
    pub archive: String,
    pub pattern: String,
    pub version: u64,
    pub videos: Vec<Video>,
    pub matches: Vec<MatchRecord>,
    pub per_video_count: Vec<u64>,
    pub paginator: Paginator,
    pub chart: Vec<BarSpec>,
}

pub struct SearchSession<S> {
    service: S,
    options: SessionOptions,
    cache: ArchiveCache,
    archives: Vec<ArchiveSummary>,
    context: Option<String>,
    state: SessionState,
    last_pattern: Option<String>,
    seq: u64,
    result: Option<ActiveResult>,
    selected_page: usize,
    last_error: Option<String>,
}

impl<S: SearchService> SearchSession<S> {
    pub fn new(service: S, options: SessionOptions) -> Self {
        Self {
            service,
            options,
            cache: ArchiveCache::new(),
            archives: Vec::new(),
            context: None,
            state: SessionState::Idle,
            last_pattern: None,
            seq: 0,
            result: None,
            selected_page: 0,
            last_error: None,
        }
    }

    /// Fetch the archive list and select `preferred` if listed, else the
    /// first archive. An empty list leaves the session without a context.
    pub async fn load_archives(
        &mut self,
        preferred: Option<&str>,
    ) -> Result<Option<&str>, SessionError> {
        let archives = match self.service.fetch_archives().await {
            Ok(list) => list,
            Err(e) => return Err(self.fail(e.into())),
        };
        info!(count = archives.len(), "archive_list_loaded");
        self.archives = archives;

        let pick = preferred
            .and_then(|p| self.archives.iter().find(|a| a.name == p))
            .or_else(|| self.archives.first())
            .map(|a| a.name.clone());
        if let Some(wanted) = preferred
            && pick.as_deref() != Some(wanted)
        {
            warn!(archive = wanted, "preferred archive not listed");
        }

        match pick {
            Some(name) => self.switch_context(name),
            None => {
                warn!("archive list is empty; searching is disabled");
                self.clear_result();
                self.context = None;
                self.last_pattern = None;
                self.seq += 1;
                self.state = SessionState::Idle;
            }
        }
        Ok(self.context.as_deref())
    }

    /// Make `name` the archive subsequent queries run against.
    pub fn set_context(&mut self, name: &str) -> Result<(), SessionError> {
        if !self.archives.iter().any(|a| a.name == name) {
            return Err(SessionError::UnknownArchive(name.to_string()));
        }
        self.switch_context(name.to_string());
        Ok(())
    }

    fn switch_context(&mut self, name: String) {
        debug!(archive = %name, "context switch");
        self.clear_result();
        self.context = Some(name);
        // Lets the same pattern be searched again in the new archive.
        self.last_pattern = None;
        self.seq += 1;
        self.state = SessionState::Idle;
    }

    fn clear_result(&mut self) {
        self.result = None;
        self.selected_page = 0;
        self.last_error = None;
    }

    /// Issue a query for `pattern` in the current context.
    pub fn begin_query(&mut self, pattern: &str) -> QueryStart {
        let Some(archive) = self.context.clone() else {
            return QueryStart::NoContext;
        };
        let normalized = pattern.to_lowercase();
        if self.last_pattern.as_deref() == Some(normalized.as_str()) {
            debug!(pattern = %normalized, "duplicate query skipped");
            return QueryStart::Duplicate;
        }

        self.seq += 1;
        self.last_pattern = Some(normalized.clone());
        self.last_error = None;
        self.state = SessionState::AwaitingResult;
        debug!(seq = self.seq, archive = %archive, pattern = %normalized, "query issued");
        QueryStart::Issued(QueryTicket {
            seq: self.seq,
            request: SearchRequest::new(archive, normalized, self.options.segment_width),
        })
    }

    /// Apply the response to an issued query.
    pub async fn complete_query(
        &mut self,
        ticket: QueryTicket,
        response: Result<SearchResponse, ServiceError>,
    ) -> Result<SubmitOutcome, SessionError> {
        if ticket.seq != self.seq {
            debug!(
                seq = ticket.seq,
                current = self.seq,
                "dropping superseded response"
            );
            return Ok(SubmitOutcome::Superseded);
        }
        let response = match response {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e.into())),
        };
        match self.process(ticket.request, response).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Issue a query and wait for it to be applied.
    pub async fn submit(&mut self, pattern: &str) -> Result<SubmitOutcome, SessionError> {
        let ticket = match self.begin_query(pattern) {
            QueryStart::Issued(ticket) => ticket,
            QueryStart::Duplicate => return Ok(SubmitOutcome::Duplicate),
            QueryStart::NoContext => return Ok(SubmitOutcome::NoContext),
        };
        let response = self.service.search(ticket.request()).await;
        self.complete_query(ticket, response).await
    }

    async fn process(
        &mut self,
        request: SearchRequest,
        response: SearchResponse,
    ) -> Result<SubmitOutcome, SessionError> {
        let SearchRequest {
            archive: archive_name,
            substr: pattern,
            ..
        } = request;

        let payload = match response.into_payload()? {
            Some(payload) if !payload.is_empty() => payload,
            _ => {
                info!(archive = %archive_name, pattern = %pattern, "search_empty");
                self.clear_result();
                self.state = SessionState::Ready;
                return Ok(SubmitOutcome::Empty);
            }
        };

        // At most one refresh per result.
        let mut refreshed = false;
        while self.cache.is_stale(payload.version) || self.cache.archive(&archive_name).is_none() {
            if refreshed {
                return Err(SessionError::VersionMismatch {
                    archive: archive_name,
                    archive_version: self.cache.version(),
                    result_version: payload.version,
                });
            }
            self.state = SessionState::StaleCache;
            debug!(
                archive = %archive_name,
                cached = self.cache.version(),
                result = payload.version,
                "archive cache stale"
            );
            self.refresh_archive(&archive_name).await?;
            refreshed = true;
        }

        let archive = self
            .cache
            .archive(&archive_name)
            .ok_or_else(|| SessionError::UnknownArchive(archive_name.clone()))?;
        validate_against(&payload, archive)?;

        let videos = archive.videos.clone();
        let paginator = Paginator::build(&payload.matches, &payload.pages, &videos);
        let chart = chart::build(&payload.per_video_count, &videos);
        let mut matches = payload.matches;
        for m in &mut matches {
            m.visited = false;
        }
        let count = matches.len();

        info!(
            archive = %archive_name,
            pattern = %pattern,
            matches = count,
            pages = paginator.len(),
            "search_complete"
        );
        self.result = Some(ActiveResult {
            archive: archive_name,
            pattern,
            version: payload.version,
            videos,
            matches,
            per_video_count: payload.per_video_count,
            paginator,
            chart,
        });
        self.selected_page = 0;
        self.state = SessionState::Ready;
        Ok(SubmitOutcome::Ready { matches: count })
    }

    /// Replace the cache with fresh metadata for `name`.
    pub async fn refresh_archive(&mut self, name: &str) -> Result<u64, SessionError> {
        self.state = SessionState::AwaitingArchiveRefresh;
        let response = self.service.fetch_archive(name).await?;
        let icon = self
            .archives
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.icon.clone());
        let (archive, version) = response.into_archive(name, icon);
        info!(
            archive = name,
            version,
            videos = archive.videos.len(),
            "archive_refreshed"
        );
        self.cache.replace(ArchiveCacheState::single(archive, version));
        Ok(version)
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        warn!(error = %err, retryable = err.is_retryable(), "query failed");
        // Forget the pattern so resubmitting it is not treated as a duplicate.
        self.last_pattern = None;
        self.state = SessionState::Idle;
        self.last_error = Some(err.to_string());
        err
    }

    pub fn select_page(&mut self, index: usize) -> Result<(), SessionError> {
        let result = self.result.as_ref().ok_or(SessionError::NoResult)?;
        let count = result.paginator.len();
        if index >= count {
            return Err(SessionError::PageOutOfRange { index, count });
        }
        self.selected_page = index;
        Ok(())
    }

    /// Move to the next page; `false` when already on the last one.
    pub fn next_page(&mut self) -> bool {
        self.select_page(self.selected_page + 1).is_ok()
    }

    pub fn prev_page(&mut self) -> bool {
        match self.selected_page.checked_sub(1) {
            Some(index) => self.select_page(index).is_ok(),
            None => false,
        }
    }

    /// Jump to the page holding the first match of a video (a chart bar
    /// click). Returns the page, or `None` when the video has no matches.
    pub fn select_video(&mut self, archive_index: usize) -> Option<usize> {
        let result = self.result.as_ref()?;
        let page = result.paginator.locate_page(archive_index, &result.matches)?;
        self.selected_page = page;
        Some(page)
    }

    /// Record that a match was opened; returns its watch URL.
    pub fn mark_visited(&mut self, match_index: usize) -> Result<String, SessionError> {
        let result = self.result.as_mut().ok_or(SessionError::NoResult)?;
        let count = result.matches.len();
        let out_of_range = || SessionError::MatchOutOfRange {
            index: match_index,
            count,
        };
        let record = result.matches.get_mut(match_index).ok_or_else(out_of_range)?;
        record.visited = true;
        let video = result
            .videos
            .get(record.archive_index)
            .ok_or_else(out_of_range)?;
        Ok(video.url_at(record.time_offset_seconds))
    }

    /// Extraction command for one match of the current result.
    pub fn command_for(&self, match_index: usize) -> Result<String, SessionError> {
        let result = self.result.as_ref().ok_or(SessionError::NoResult)?;
        let count = result.matches.len();
        let out_of_range = || SessionError::MatchOutOfRange {
            index: match_index,
            count,
        };
        let record = result.matches.get(match_index).ok_or_else(out_of_range)?;
        let video = result
            .videos
            .get(record.archive_index)
            .ok_or_else(out_of_range)?;
        Ok(extract::build_command(record, video, &self.options.clip))
    }

    /// Export document for every match of the current result.
    pub fn export_document(&self) -> Option<String> {
        self.result.as_ref().map(|r| {
            extract::build_export_document(&r.matches, &r.videos, &self.options.clip)
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn archives(&self) -> &[ArchiveSummary] {
        &self.archives
    }

    pub fn cache(&self) -> &ArchiveCache {
        &self.cache
    }

    pub fn result(&self) -> Option<&ActiveResult> {
        self.result.as_ref()
    }

    pub fn selected_page(&self) -> usize {
        self.selected_page
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Presentation model of the selected page.
    pub fn view(&self) -> Option<ResultsView> {
        let result = self.result.as_ref()?;
        let highlighter = PatternHighlighter::new(&result.pattern, self.options.markup);
        let chart = chart::is_visible(result.matches.len(), result.videos.len())
            .then(|| result.chart.clone());
        let page_labels = if result.paginator.has_multiple_pages() {
            page_labels(result.paginator.len())
        } else {
            Vec::new()
        };

        let groups = result
            .paginator
            .page(self.selected_page)
            .map(|page| {
                page.groups
                    .iter()
                    .map(|group| GroupView {
                        archive_index: group.archive_index,
                        video_id: group.video.id.clone(),
                        title: group.video.title.clone(),
                        upload_date: chart::format_upload_date(group.video.uploaded_at),
                        rows: group
                            .range
                            .as_range()
                            .filter_map(|i| result.matches.get(i).map(|m| (i, m)))
                            .map(|(match_index, m)| RowView {
                                match_index,
                                timestamp: extract::format_duration(m.time_offset_seconds),
                                marked_text: highlighter.highlight(&m.text),
                                url: group.video.url_at(m.time_offset_seconds),
                                command: extract::build_command(m, &group.video, &self.options.clip),
                                visited: m.visited,
                            })
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(ResultsView {
            archive: result.archive.clone(),
            pattern: result.pattern.clone(),
            count: result.matches.len(),
            page_labels,
            selected_page: self.selected_page,
            chart,
            groups,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsView {
    pub archive: String,
    pub pattern: String,
    pub count: usize,
    /// Empty when everything fits on one page.
    pub page_labels: Vec<String>,
    pub selected_page: usize,
    /// Present only when worth drawing.
    pub chart: Option<Vec<BarSpec>>,
    pub groups: Vec<GroupView>,
}

impl ResultsView {
    pub fn rows(&self) -> impl Iterator<Item = &RowView> {
        self.groups.iter().flat_map(|g| g.rows.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupView {
    pub archive_index: usize,
    pub video_id: String,
    pub title: String,
    pub upload_date: String,
    pub rows: Vec<RowView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub match_index: usize,
    pub timestamp: String,
    pub marked_text: String,
    pub url: String,
    pub command: String,
    pub visited: bool,
}

/// 1-based page labels, zero-padded to the width of `count + 1`.
pub fn page_labels(count: usize) -> Vec<String> {
    let width = (count + 1).to_string().len();
    (1..=count).map(|n| format!("{n:0width$}")).collect()
}
