//! Versioned snapshot of archive metadata.

use std::collections::HashMap;

use crate::model::types::Archive;

/// Version reported before the first refresh.
pub const INITIAL_VERSION: u64 = 0;

/// One consistent snapshot of all cached archives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveCacheState {
    archives: HashMap<String, Archive>,
    version: u64,
}

impl ArchiveCacheState {
    pub fn new(version: u64) -> Self {
        Self {
            archives: HashMap::new(),
            version,
        }
    }

    /// Snapshot holding a single archive.
    pub fn single(archive: Archive, version: u64) -> Self {
        Self::new(version).with_archive(archive)
    }

    pub fn with_archive(mut self, archive: Archive) -> Self {
        self.archives.insert(archive.name.clone(), archive);
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Archive metadata cache. Only ever replaced as a whole.
#[derive(Debug, Default)]
pub struct ArchiveCache {
    state: ArchiveCacheState,
    /// `false` until the first `replace`; an unpopulated cache is stale
    /// against every version, including [`INITIAL_VERSION`].
    populated: bool,
}

impl ArchiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a payload stamped with `payload_version` was computed against
    /// a different snapshot than the one held here. Equality only.
    pub fn is_stale(&self, payload_version: u64) -> bool {
        !self.populated || payload_version != self.state.version
    }

    pub fn replace(&mut self, state: ArchiveCacheState) {
        self.state = state;
        self.populated = true;
    }

    pub fn version(&self) -> u64 {
        if self.populated {
            self.state.version
        } else {
            INITIAL_VERSION
        }
    }

    pub fn archive(&self, name: &str) -> Option<&Archive> {
        self.state.archives.get(name)
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::Video;

    fn archive(name: &str) -> Archive {
        Archive {
            name: name.into(),
            icon: None,
            videos: vec![Video {
                id: "a".into(),
                title: "A".into(),
                uploaded_at: 0,
            }],
        }
    }

    #[test]
    fn fresh_cache_is_stale_for_every_version() {
        let cache = ArchiveCache::new();
        assert_eq!(cache.version(), INITIAL_VERSION);
        assert!(cache.is_stale(7));
        assert!(cache.is_stale(INITIAL_VERSION));
        assert!(!cache.is_populated());
    }

    #[test]
    fn replace_makes_that_version_current() {
        let mut cache = ArchiveCache::new();
        cache.replace(ArchiveCacheState::single(archive("demo"), 7));
        assert!(cache.is_populated());
        assert!(!cache.is_stale(7));
        assert!(cache.is_stale(6));
        assert!(cache.is_stale(8));
        assert_eq!(cache.archive("demo").unwrap().videos.len(), 1);
    }

    #[test]
    fn replace_drops_previous_archives() {
        let mut cache = ArchiveCache::new();
        cache.replace(ArchiveCacheState::single(archive("one"), 1));
        cache.replace(ArchiveCacheState::single(archive("two"), 2));
        assert!(cache.archive("one").is_none());
        assert!(cache.archive("two").is_some());
        assert!(cache.is_stale(1));
    }
}
