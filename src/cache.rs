use std::collections::HashMap;

use tracing::debug;

use crate::error::LoadError;
use crate::loader::{SheetSelection, Workbook};
use crate::source::{SourceKey, WorkbookSource};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    source: SourceKey,
    selection: SheetSelection,
}

/// Memoizes parsed workbooks by source identity.
///
/// An unchanged file (same path, modification time and length) or an
/// identical upload is served from memory. Loading a changed version of the
/// same file or upload evicts the stale entries for it.
#[derive(Debug, Default)]
pub struct LoadCache {
    entries: HashMap<CacheKey, Workbook>,
    hits: usize,
    misses: usize,
}

impl LoadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(
        &mut self,
        source: &WorkbookSource,
        selection: &SheetSelection,
    ) -> Result<&Workbook, LoadError> {
        let key = CacheKey {
            source: source.key()?,
            selection: selection.clone(),
        };
        if self.entries.contains_key(&key) {
            self.hits += 1;
            debug!(source = %source.display_name(), "load cache hit");
        } else {
            let workbook = Workbook::load(source, selection)?;
            let before = self.entries.len();
            self.entries.retain(|k, _| {
                k.source == key.source || !k.source.same_origin(&key.source)
            });
            if self.entries.len() < before {
                debug!(source = %source.display_name(), "stale cache entries evicted");
            }
            self.misses += 1;
            self.entries.insert(key.clone(), workbook);
        }
        Ok(&self.entries[&key])
    }

    /// Drop every cached workbook for the file or upload behind `source`.
    pub fn invalidate(&mut self, source: &WorkbookSource) -> Result<(), LoadError> {
        let key = source.key()?;
        self.entries.retain(|k, _| !k.source.same_origin(&key));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv(content: &str) -> WorkbookSource {
        WorkbookSource::bytes("upload.csv", content.as_bytes().to_vec())
    }

    #[test]
    fn repeated_load_hits_cache() {
        let mut cache = LoadCache::new();
        let source = csv("a,b\n1,2\n");
        cache.load(&source, &SheetSelection::All).unwrap();
        cache.load(&source, &SheetSelection::All).unwrap();
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn changed_content_reloads_and_evicts() {
        let mut cache = LoadCache::new();
        cache.load(&csv("a\n1\n"), &SheetSelection::All).unwrap();
        let workbook = cache.load(&csv("a\n1\n2\n"), &SheetSelection::All).unwrap();
        assert_eq!(workbook.first().unwrap().frame.height(), 2);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn other_selection_of_same_content_is_kept() {
        let mut cache = LoadCache::new();
        let source = csv("a\n1\n");
        cache.load(&source, &SheetSelection::First).unwrap();
        cache.load(&source, &SheetSelection::All).unwrap();
        assert_eq!(cache.len(), 2);
        cache.load(&source, &SheetSelection::First).unwrap();
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn failed_load_is_not_cached() {
        let mut cache = LoadCache::new();
        let missing = WorkbookSource::path("/no/such/book.xlsx");
        assert!(cache.load(&missing, &SheetSelection::First).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_drops_entries() {
        let mut cache = LoadCache::new();
        let source = csv("a\n1\n");
        cache.load(&source, &SheetSelection::All).unwrap();
        cache.invalidate(&source).unwrap();
        assert!(cache.is_empty());
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
