use std::collections::HashMap;

use indexmap::IndexMap;

use crate::data::EntityKind;
use crate::errors::CorpusError;
use crate::types::{CanonicalKey, EntityId};

/// Per-run memoization of materialized entities keyed by canonical key.
///
/// One map per entity kind. A miss invokes the factory exactly once; a hit
/// returns the cached id without touching the factory or the repository it
/// wraps. Owned by a single ingestion pass and not shared across threads.
#[derive(Debug, Default)]
pub struct EntityCache {
    tables: HashMap<EntityKind, IndexMap<CanonicalKey, EntityId>>,
    stats: CacheStats,
}

/// Hit/miss counters for one cache lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id cached for `(kind, key)`, creating it with `factory` on miss.
    ///
    /// A failing factory leaves the cache untouched.
    pub fn get_or_create<F>(
        &mut self,
        kind: EntityKind,
        key: &str,
        factory: F,
    ) -> Result<EntityId, CorpusError>
    where
        F: FnOnce() -> Result<EntityId, CorpusError>,
    {
        if let Some(id) = self.get(kind, key) {
            self.stats.hits = self.stats.hits.saturating_add(1);
            return Ok(id);
        }
        let id = factory()?;
        self.stats.misses = self.stats.misses.saturating_add(1);
        self.tables
            .entry(kind)
            .or_default()
            .insert(key.to_string(), id);
        Ok(id)
    }

    /// Cached id for `(kind, key)` without creating anything.
    pub fn get(&self, kind: EntityKind, key: &str) -> Option<EntityId> {
        self.tables.get(&kind)?.get(key).copied()
    }

    /// Register an entity materialized outside `get_or_create` (e.g. restored state).
    pub fn seed(&mut self, kind: EntityKind, key: impl Into<CanonicalKey>, id: EntityId) {
        self.tables.entry(kind).or_default().insert(key.into(), id);
    }

    /// Number of cached entities of `kind`.
    pub fn len(&self, kind: EntityKind) -> usize {
        self.tables.get(&kind).map_or(0, IndexMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(IndexMap::is_empty)
    }

    /// Canonical keys of `kind` in first-seen order.
    pub fn keys(&self, kind: EntityKind) -> Vec<&str> {
        self.tables
            .get(&kind)
            .map(|table| table.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drop all cached entries, ending the current run.
    pub fn clear(&mut self) {
        self.tables.clear();
        self.stats = CacheStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn factory_runs_once_per_key() {
        let mut cache = EntityCache::new();
        let calls = Cell::new(0);
        let factory = || {
            calls.set(calls.get() + 1);
            Ok(calls.get())
        };
        let first = cache
            .get_or_create(EntityKind::Group, "LAZARUS", factory)
            .unwrap();
        let second = cache
            .get_or_create(EntityKind::Group, "LAZARUS", || {
                panic!("factory must not run on hit")
            })
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn kinds_have_separate_tables() {
        let mut cache = EntityCache::new();
        let country = cache
            .get_or_create(EntityKind::Country, "CHINA", || Ok(1))
            .unwrap();
        let file_type = cache
            .get_or_create(EntityKind::FileType, "CHINA", || Ok(7))
            .unwrap();
        assert_eq!(country, 1);
        assert_eq!(file_type, 7);
        assert_eq!(cache.len(EntityKind::Country), 1);
        assert_eq!(cache.len(EntityKind::Alias), 0);
    }

    #[test]
    fn failing_factory_does_not_cache() {
        let mut cache = EntityCache::new();
        let err = cache.get_or_create(EntityKind::Report, "R", || {
            Err(CorpusError::Repository("offline".into()))
        });
        assert!(err.is_err());
        assert!(cache.get(EntityKind::Report, "R").is_none());
        assert_eq!(
            cache
                .get_or_create(EntityKind::Report, "R", || Ok(3))
                .unwrap(),
            3
        );
    }

    #[test]
    fn keys_preserve_first_seen_order_and_clear_resets() {
        let mut cache = EntityCache::new();
        cache.seed(EntityKind::Group, "B", 2);
        cache.seed(EntityKind::Group, "A", 1);
        assert_eq!(cache.keys(EntityKind::Group), vec!["B", "A"]);
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
