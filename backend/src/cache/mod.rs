//! Row Set Cache - Reuse prepared rows across report runs
//!
//! Loading and cleaning the spreadsheets is the only slow part of a run.
//! Prepared rows are kept per list of sources and reused until one of the
//! files changes size or modification time. The cache holds a bounded
//! number of source lists; the least recently used one is evicted first.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{PipelineResult, ReportError};
use crate::parser::SourceSpec;
use crate::transform::pipeline::{prepare, PreparedRows};

/// Identity of a source file at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub path: PathBuf,
    pub sheet: Option<String>,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl SourceKey {
    /// Stat the file behind a source
    pub fn of(spec: &SourceSpec) -> PipelineResult<Self> {
        let meta = fs::metadata(&spec.path)
            .map_err(|e| ReportError::source_unavailable(spec.to_string(), e.into()))?;
        Ok(Self {
            path: spec.path.clone(),
            sheet: spec.sheet.clone(),
            size: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Source lists kept when no capacity is configured
pub const DEFAULT_CAPACITY: usize = 8;

struct CacheEntry {
    keys: Vec<SourceKey>,
    prepared: Arc<PreparedRows>,
    last_used: u64,
}

/// Cache of prepared rows, keyed by the list of sources
pub struct RowSetCache {
    entries: HashMap<Vec<SourceSpec>, CacheEntry>,
    capacity: usize,
    clock: u64,
    hits: u64,
    misses: u64,
}

impl Default for RowSetCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl RowSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` source lists (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return the cached rows for `sources`, preparing them if absent or stale
    pub fn get_or_prepare(&mut self, sources: &[SourceSpec]) -> PipelineResult<Arc<PreparedRows>> {
        if sources.is_empty() {
            return Err(ReportError::NoSources);
        }
        let keys = sources
            .iter()
            .map(SourceKey::of)
            .collect::<PipelineResult<Vec<_>>>()?;

        self.clock += 1;
        if let Some(entry) = self.entries.get_mut(sources) {
            if entry.keys == keys {
                entry.last_used = self.clock;
                self.hits += 1;
                tracing::debug!(sources = sources.len(), "row set cache hit");
                return Ok(Arc::clone(&entry.prepared));
            }
            tracing::info!("sources changed on disk, reloading");
        }

        self.misses += 1;
        let prepared = Arc::new(prepare(sources)?);
        if !self.entries.contains_key(sources) && self.entries.len() >= self.capacity {
            self.evict_least_recent();
        }
        self.entries.insert(
            sources.to_vec(),
            CacheEntry {
                keys,
                prepared: Arc::clone(&prepared),
                last_used: self.clock,
            },
        );
        Ok(prepared)
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(sources, _)| sources.clone());
        if let Some(sources) = oldest {
            tracing::debug!(sources = sources.len(), "evicting cached row set");
            self.entries.remove(&sources);
        }
    }

    /// Drop every cached row set
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    const CSV: &str = "Item Name,Cost,Stock,Total Sales\nX,10,5,0\n";

    #[test]
    fn test_second_lookup_is_a_hit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stock.csv");
        fs::write(&path, CSV).unwrap();
        let sources = vec![SourceSpec::new(&path)];

        let mut cache = RowSetCache::new();
        let first = cache.get_or_prepare(&sources).unwrap();
        let second = cache.get_or_prepare(&sources).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_changed_file_is_reloaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stock.csv");
        fs::write(&path, CSV).unwrap();
        let sources = vec![SourceSpec::new(&path)];

        let mut cache = RowSetCache::new();
        assert_eq!(cache.get_or_prepare(&sources).unwrap().rows.len(), 1);

        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "Y,4,2,1").unwrap();
        drop(file);

        assert_eq!(cache.get_or_prepare(&sources).unwrap().rows.len(), 2);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let dir = tempdir().unwrap();
        let lists: Vec<Vec<SourceSpec>> = ["a.csv", "b.csv", "c.csv"]
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, CSV).unwrap();
                vec![SourceSpec::new(path)]
            })
            .collect();

        let mut cache = RowSetCache::with_capacity(2);
        cache.get_or_prepare(&lists[0]).unwrap();
        cache.get_or_prepare(&lists[1]).unwrap();
        cache.get_or_prepare(&lists[0]).unwrap();
        cache.get_or_prepare(&lists[2]).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.misses(), 3);

        // a.csv was used after b.csv, so b.csv went
        cache.get_or_prepare(&lists[0]).unwrap();
        assert_eq!(cache.hits(), 2);
        cache.get_or_prepare(&lists[1]).unwrap();
        assert_eq!(cache.misses(), 4);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_still_holds_one() {
        assert_eq!(RowSetCache::with_capacity(0).capacity(), 1);
    }

    #[test]
    fn test_missing_source_is_unavailable() {
        let mut cache = RowSetCache::new();
        let err = cache
            .get_or_prepare(&[SourceSpec::new("does-not-exist.csv")])
            .unwrap_err();
        assert!(matches!(err, ReportError::SourceUnavailable { .. }));
        assert!(cache.is_empty());
    }
}
