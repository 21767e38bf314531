//! Lookup sites: one per constant reference in host code.
//!
//! - [`ExplicitModuleSite`]: `expr::NAME`, the module is supplied on every call.
//! - [`LexicalSite`]: a bare `NAME` whose lexical scope is fixed when the site is built.
//! - [`DynamicScopeSite`]: a bare `NAME` whose scope is only known at run time.
//!
//! All three run the same cold lookup and cache its answer per key. A cached answer still
//! goes through value resolution, so autoloads and deprecation warnings behave exactly as
//! on the cold path.

use std::sync::Arc;

use crate::runner::ds::error::Result;
use crate::runner::ds::lex_env::LexicalScope;
use crate::runner::ds::module::ModuleId;
use crate::runner::ds::value::Value;
use crate::runner::engine::ConstantEngine;
use crate::runner::eval::cache::{CacheLine, CacheStats, PolymorphicCache};
use crate::runner::eval::types::{ConstantLookupResult, LookupOptions, LookupStart};

pub struct ExplicitModuleSite {
    name: Arc<str>,
    check_name: bool,
    options: LookupOptions,
    cache: PolymorphicCache<ModuleId>,
}

impl ExplicitModuleSite {
    pub fn new(name: &str) -> Self {
        ExplicitModuleSite {
            name: Arc::from(name),
            check_name: true,
            options: LookupOptions::QUALIFIED,
            cache: PolymorphicCache::new(),
        }
    }

    pub fn with_options(mut self, options: LookupOptions) -> Self {
        self.options = options;
        self
    }

    /// Skip name validation. For names the host already knows are well-formed.
    pub fn without_name_check(mut self) -> Self {
        self.check_name = false;
        self
    }

    pub fn resolve(
        &self,
        engine: &ConstantEngine,
        module: ModuleId,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        let start = LookupStart::module(module, self.options);
        if let Some(line) = cached(&self.cache, engine, &module) {
            return engine.read_entry(
                &start,
                &self.name,
                line.entry(),
                line.is_visible(),
                trigger_missing_hook,
            );
        }
        if self.check_name {
            engine.check_name(module, &self.name)?;
        }
        let (result, visible) = engine.cold_lookup(&start, &self.name)?;
        remember(&self.cache, engine, module, &result, visible, &self.name);
        engine.read_entry(&start, &self.name, result.entry(), visible, trigger_missing_hook)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cached_lines(&self) -> usize {
        self.cache.len()
    }

    pub fn is_megamorphic(&self) -> bool {
        self.cache.is_megamorphic()
    }
}

pub struct LexicalSite {
    name: Arc<str>,
    scope: Arc<LexicalScope>,
    cache: PolymorphicCache<()>,
}

impl LexicalSite {
    pub fn new(scope: Arc<LexicalScope>, name: &str) -> Self {
        LexicalSite {
            name: Arc::from(name),
            scope,
            cache: PolymorphicCache::new(),
        }
    }

    pub fn resolve(&self, engine: &ConstantEngine, trigger_missing_hook: bool) -> Result<Option<Value>> {
        let start = LookupStart::Lexical(&self.scope);
        if let Some(line) = cached(&self.cache, engine, &()) {
            return engine.read_entry(
                &start,
                &self.name,
                line.entry(),
                line.is_visible(),
                trigger_missing_hook,
            );
        }
        let (result, visible) = engine.cold_lookup(&start, &self.name)?;
        remember(&self.cache, engine, (), &result, visible, &self.name);
        engine.read_entry(&start, &self.name, result.entry(), visible, trigger_missing_hook)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &Arc<LexicalScope> {
        &self.scope
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cached_lines(&self) -> usize {
        self.cache.len()
    }
}

/// Scopes compare by identity: two structurally equal chains are different call contexts.
#[derive(Clone)]
struct ScopeKey(Arc<LexicalScope>);

impl PartialEq for ScopeKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

pub struct DynamicScopeSite {
    name: Arc<str>,
    cache: PolymorphicCache<ScopeKey>,
}

impl DynamicScopeSite {
    pub fn new(name: &str) -> Self {
        DynamicScopeSite {
            name: Arc::from(name),
            cache: PolymorphicCache::new(),
        }
    }

    pub fn resolve(
        &self,
        engine: &ConstantEngine,
        scope: &Arc<LexicalScope>,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        let start = LookupStart::Lexical(scope);
        let key = ScopeKey(scope.clone());
        if let Some(line) = cached(&self.cache, engine, &key) {
            return engine.read_entry(
                &start,
                &self.name,
                line.entry(),
                line.is_visible(),
                trigger_missing_hook,
            );
        }
        let (result, visible) = engine.cold_lookup(&start, &self.name)?;
        remember(&self.cache, engine, key, &result, visible, &self.name);
        engine.read_entry(&start, &self.name, result.entry(), visible, trigger_missing_hook)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cached_lines(&self) -> usize {
        self.cache.len()
    }

    pub fn is_megamorphic(&self) -> bool {
        self.cache.is_megamorphic()
    }
}

fn cached<K: PartialEq>(
    cache: &PolymorphicCache<K>,
    engine: &ConstantEngine,
    key: &K,
) -> Option<Arc<CacheLine<K>>> {
    if !engine.config().caching_enabled() || cache.is_megamorphic() {
        return None;
    }
    cache.get(key, engine.id())
}

fn remember<K: PartialEq>(
    cache: &PolymorphicCache<K>,
    engine: &ConstantEngine,
    key: K,
    result: &ConstantLookupResult,
    visible: bool,
    name: &str,
) {
    if !engine.config().caching_enabled() || !result.is_cacheable() {
        return;
    }
    if !cache.accepts(engine.id()) {
        tracing::trace!(target: "autoconst::cache", constant = name, "site belongs to another engine, not caching");
        return;
    }
    let was_megamorphic = cache.is_megamorphic();
    let line = CacheLine::new(
        key,
        engine.id(),
        result.entry().cloned(),
        visible,
        result.guards().clone(),
    );
    if cache.fill(line, engine.config().constant_cache) {
        tracing::trace!(target: "autoconst::cache", constant = name, lines = cache.len(), "cached lookup");
    } else if !was_megamorphic && cache.is_megamorphic() {
        tracing::debug!(target: "autoconst::cache", constant = name, "lookup site went megamorphic");
    }
}
