//! Per-site polymorphic lookup cache.
//!
//! A site keeps a short list of lines, each remembering the answer for one key (a module,
//! a lexical scope) in one engine, guarded by the tokens of the lookup that produced it.
//! The list is an immutable snapshot swapped on fill, so hits never lock. Once more keys
//! than the limit have been seen the site is megamorphic and stops caching for good.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::runner::ds::constant::ConstantEntry;
use crate::runner::ds::token::Guards;

pub struct CacheLine<K> {
    key: K,
    context: Uuid,
    entry: Option<Arc<ConstantEntry>>,
    visible: bool,
    guards: Guards,
}

impl<K: PartialEq> CacheLine<K> {
    pub fn new(
        key: K,
        context: Uuid,
        entry: Option<Arc<ConstantEntry>>,
        visible: bool,
        guards: Guards,
    ) -> Self {
        CacheLine {
            key,
            context,
            entry,
            visible,
            guards,
        }
    }

    fn matches(&self, key: &K, context: Uuid) -> bool {
        self.context == context && self.key == *key
    }

    pub fn is_valid(&self) -> bool {
        self.guards.is_valid()
    }

    pub fn entry(&self) -> Option<&Arc<ConstantEntry>> {
        self.entry.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

/// Hit/miss counters for one site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct PolymorphicCache<K> {
    lines: ArcSwap<Vec<Arc<CacheLine<K>>>>,
    fill_lock: Mutex<()>,
    megamorphic: AtomicBool,
    bound_context: Mutex<Option<Uuid>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: PartialEq> PolymorphicCache<K> {
    pub fn new() -> Self {
        PolymorphicCache {
            lines: ArcSwap::from_pointee(Vec::new()),
            fill_lock: Mutex::new(()),
            megamorphic: AtomicBool::new(false),
            bound_context: Mutex::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A still-valid line for `key` in `context`. Counts a hit or a miss.
    pub fn get(&self, key: &K, context: Uuid) -> Option<Arc<CacheLine<K>>> {
        let hit = self
            .lines
            .load()
            .iter()
            .find(|line| line.matches(key, context) && line.is_valid())
            .cloned();
        match hit {
            Some(line) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(line)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// May this cache store lines for `context`? The first context seen owns the site.
    pub fn accepts(&self, context: Uuid) -> bool {
        let mut bound = self.bound_context.lock();
        match *bound {
            Some(owner) => owner == context,
            None => {
                *bound = Some(context);
                true
            }
        }
    }

    /// Stores `line`, dropping invalid lines and any older line for the same key. Returns
    /// false if the cache is (or just became) megamorphic.
    pub fn fill(&self, line: CacheLine<K>, limit: usize) -> bool {
        if self.is_megamorphic() || !line.is_valid() {
            return false;
        }
        let _guard = self.fill_lock.lock();
        let current = self.lines.load_full();
        let mut next: Vec<Arc<CacheLine<K>>> = current
            .iter()
            .filter(|existing| existing.is_valid() && !existing.matches(&line.key, line.context))
            .cloned()
            .collect();
        if next.len() >= limit {
            self.megamorphic.store(true, Ordering::Release);
            self.lines.store(Arc::new(Vec::new()));
            return false;
        }
        next.push(Arc::new(line));
        self.lines.store(Arc::new(next));
        true
    }

    pub fn is_megamorphic(&self) -> bool {
        self.megamorphic.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.lines.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<K: PartialEq> Default for PolymorphicCache<K> {
    fn default() -> Self {
        Self::new()
    }
}
