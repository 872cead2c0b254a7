//! Server-determined pagination of a flat match list.
//!
//! A page is an ordered list of per-video ranges over the match list. The
//! layout is validated once at the protocol boundary with [`check_layout`];
//! [`Paginator::build`] re-checks it and panics on a bad layout, since by then
//! a violation is a bug rather than bad input.

use serde::Serialize;
use thiserror::Error;

use crate::model::types::{MatchRecord, PageRange, Video};

/// Why a page layout does not partition the match list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("page {page} range starts at {found}, expected {expected}")]
    NotContiguous {
        page: usize,
        expected: usize,
        found: usize,
    },

    #[error("page {page} range {begin}..{end} is empty or inverted")]
    EmptyRange { page: usize, begin: usize, end: usize },

    #[error("page {page} range ends at {end}, past {total} matches")]
    OutOfBounds { page: usize, end: usize, total: usize },

    #[error("page {page} range {begin}..{end} mixes matches from several videos")]
    MixedVideos { page: usize, begin: usize, end: usize },

    #[error("page {page} has no ranges")]
    EmptyPage { page: usize },

    #[error("pages cover {covered} of {total} matches")]
    NotExhaustive { covered: usize, total: usize },
}

/// Verify that `pages` partitions `[0, matches.len())` contiguously, in
/// ascending order, with every range covering a single video.
///
/// A long run of one video may continue from one page into the next; the
/// server cuts pages at a fixed match count.
pub fn check_layout(matches: &[MatchRecord], pages: &[Vec<PageRange>]) -> Result<(), LayoutError> {
    let total = matches.len();
    let mut expected = 0;

    for (page, ranges) in pages.iter().enumerate() {
        if ranges.is_empty() {
            if total == 0 {
                continue;
            }
            return Err(LayoutError::EmptyPage { page });
        }
        for range in ranges {
            if range.begin != expected {
                return Err(LayoutError::NotContiguous {
                    page,
                    expected,
                    found: range.begin,
                });
            }
            if range.end < range.begin || (range.is_empty() && total > 0) {
                return Err(LayoutError::EmptyRange {
                    page,
                    begin: range.begin,
                    end: range.end,
                });
            }
            if range.end > total {
                return Err(LayoutError::OutOfBounds {
                    page,
                    end: range.end,
                    total,
                });
            }
            let slice = &matches[range.as_range()];
            if let Some(first) = slice.first()
                && slice.iter().any(|m| m.archive_index != first.archive_index)
            {
                return Err(LayoutError::MixedVideos {
                    page,
                    begin: range.begin,
                    end: range.end,
                });
            }
            expected = range.end;
        }
    }

    if expected != total {
        return Err(LayoutError::NotExhaustive {
            covered: expected,
            total,
        });
    }
    Ok(())
}

/// Matches per page in the server's layout.
pub const RESULTS_PER_PAGE: usize = 2048;

/// Split `matches` into per-video runs, starting a new page every
/// `page_size` matches.
pub fn derive_layout(matches: &[MatchRecord], page_size: usize) -> Vec<Vec<PageRange>> {
    let page_size = page_size.max(1);
    let mut pages: Vec<Vec<PageRange>> = Vec::new();
    for (idx, m) in matches.iter().enumerate() {
        if idx % page_size == 0 {
            pages.push(Vec::new());
        }
        let Some(page) = pages.last_mut() else {
            continue;
        };
        match page.last_mut() {
            Some(last) if matches[last.begin].archive_index == m.archive_index => {
                last.end = idx + 1;
            }
            _ => page.push(PageRange::new(idx, idx + 1)),
        }
    }
    pages
}

/// One video's contiguous run of matches within a page, with the metadata
/// shown in its header row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoGroup {
    pub archive_index: usize,
    pub video: Video,
    pub range: PageRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub groups: Vec<VideoGroup>,
}

impl Page {
    pub fn match_count(&self) -> usize {
        self.groups.iter().map(|g| g.range.len()).sum()
    }

    pub fn first_match(&self) -> Option<usize> {
        self.groups.first().map(|g| g.range.begin)
    }

    pub fn end_match(&self) -> Option<usize> {
        self.groups.last().map(|g| g.range.end)
    }

    /// Indices into the match list, in display order.
    pub fn match_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.iter().flat_map(|g| g.range.as_range())
    }
}

/// Pages of the current result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Paginator {
    pages: Vec<Page>,
}

impl Paginator {
    /// Build pages from a validated layout.
    ///
    /// # Panics
    ///
    /// Panics when `boundaries` does not partition `matches` (see
    /// [`check_layout`]) or references a video missing from `videos`.
    pub fn build(matches: &[MatchRecord], boundaries: &[Vec<PageRange>], videos: &[Video]) -> Self {
        if let Err(e) = check_layout(matches, boundaries) {
            panic!("invalid page layout: {e}");
        }

        let pages = boundaries
            .iter()
            .filter(|ranges| !ranges.is_empty() && ranges.iter().any(|r| !r.is_empty()))
            .map(|ranges| Page {
                groups: ranges
                    .iter()
                    .map(|range| {
                        let archive_index = matches[range.begin].archive_index;
                        let video = videos.get(archive_index).cloned().unwrap_or_else(|| {
                            panic!(
                                "archive index {archive_index} out of range for {} videos",
                                videos.len()
                            )
                        });
                        VideoGroup {
                            archive_index,
                            video,
                            range: *range,
                        }
                    })
                    .collect(),
            })
            .collect();

        Self { pages }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Whether a page selector should be shown at all.
    pub fn has_multiple_pages(&self) -> bool {
        self.pages.len() > 1
    }

    /// Matches on page `index`, in display order.
    pub fn page_matches<'a>(&self, index: usize, matches: &'a [MatchRecord]) -> Vec<&'a MatchRecord> {
        self.page(index)
            .map(|page| page.match_indices().filter_map(|i| matches.get(i)).collect())
            .unwrap_or_default()
    }

    /// Page holding the match at `match_index`.
    pub fn page_of_match(&self, match_index: usize) -> Option<usize> {
        let idx = self
            .pages
            .partition_point(|p| p.end_match().is_some_and(|end| end <= match_index));
        let page = self.pages.get(idx)?;
        (page.first_match()? <= match_index).then_some(idx)
    }

    /// Page holding the first match of the video at `archive_index`, or
    /// `None` when that video has no matches.
    pub fn locate_page(&self, archive_index: usize, matches: &[MatchRecord]) -> Option<usize> {
        let first = matches.iter().position(|m| m.archive_index == archive_index)?;
        self.page_of_match(first)
    }
}
