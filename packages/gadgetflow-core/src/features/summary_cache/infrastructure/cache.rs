//! Summary cache
//!
//! LRU map from summary key to summary, plus the "created types" registry
//! used to narrow virtual dispatch. One cache per engine run.

use crate::features::summary_cache::domain::Summary;
use crate::shared::models::SummaryKey;
use lru::LruCache;
use rustc_hash::FxHashSet;
use std::num::NonZeroUsize;
use std::rc::Rc;
use tracing::debug;

pub struct SummaryCache {
    cache: LruCache<SummaryKey, Rc<Summary>>,

    /// Types observed in constructor calls
    created_types: FxHashSet<String>,

    empty: Rc<Summary>,
    hits: usize,
    misses: usize,
}

impl SummaryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            created_types: FxHashSet::default(),
            empty: Rc::new(Summary::Empty),
            hits: 0,
            misses: 0,
        }
    }

    /// Updates hit/miss statistics
    pub fn get(&mut self, key: &SummaryKey) -> Option<Rc<Summary>> {
        match self.cache.get(key) {
            Some(summary) => {
                self.hits += 1;
                Some(Rc::clone(summary))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, key: SummaryKey, summary: Rc<Summary>) {
        if let Some((evicted, _)) = self.cache.push(key.clone(), summary) {
            if evicted != key {
                debug!(key = %evicted, "Summary evicted");
            }
        }
    }

    pub fn contains(&self, key: &SummaryKey) -> bool {
        self.cache.contains(key)
    }

    /// Shared `Summary::Empty`
    pub fn empty(&self) -> Rc<Summary> {
        Rc::clone(&self.empty)
    }

    /// Returns true if the type was not known yet
    pub fn register_created_type(&mut self, type_name: &str) -> bool {
        if self.created_types.contains(type_name) {
            return false;
        }
        self.created_types.insert(type_name.to_string())
    }

    pub fn created_types(&self) -> &FxHashSet<String> {
        &self.created_types
    }

    /// Forget every summary and created type
    pub fn reset(&mut self) {
        self.cache.clear();
        self.created_types.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn stats(&self) -> String {
        format!(
            "Summaries: {} entries, {} hits, {} misses, {:.2}% hit rate, {} created types",
            self.len(),
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.created_types.len()
        )
    }
}

impl Default for SummaryCache {
    fn default() -> Self {
        Self::new(65_536)
    }
}
