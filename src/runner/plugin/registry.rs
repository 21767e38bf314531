//! In-memory feature registry.
//!
//! Features are named bodies registered up front. `require` runs a body at most once per
//! successful load, under a per-path lock. A body that fails is not marked loaded and can
//! be required again.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::runner::ds::error::{ConstantError, Result};
use crate::runner::engine::ConstantEngine;
use crate::runner::plugin::resolver::FeatureLoader;

pub type FeatureFn = dyn Fn(&ConstantEngine) -> Result<()> + Send + Sync;

const FEATURE_SUFFIX: &str = ".rb";

/// Registry of loadable features.
pub struct FeatureRegistry {
    features: RwLock<FxHashMap<String, Arc<FeatureFn>>>,
    loaded: Mutex<FxHashSet<String>>,
    executions: Mutex<FxHashMap<String, usize>>,
    locks: FeatureLocks,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        FeatureRegistry {
            features: RwLock::new(FxHashMap::default()),
            loaded: Mutex::new(FxHashSet::default()),
            executions: Mutex::new(FxHashMap::default()),
            locks: FeatureLocks::new(),
        }
    }

    /// Register a feature body under `path`. Re-registering replaces the body.
    pub fn register<F>(&self, path: impl Into<String>, body: F)
    where
        F: Fn(&ConstantEngine) -> Result<()> + Send + Sync + 'static,
    {
        self.features.write().insert(path.into(), Arc::new(body));
    }

    pub fn has_feature(&self, path: &str) -> bool {
        self.find_feature(path).is_some()
    }

    pub fn is_loaded(&self, path: &str) -> bool {
        match self.find_feature(path) {
            Some(feature) => self.loaded.lock().contains(&feature),
            None => false,
        }
    }

    /// How many times the body of `path` has been run.
    pub fn execution_count(&self, path: &str) -> usize {
        match self.find_feature(path) {
            Some(feature) => self.executions.lock().get(&feature).copied().unwrap_or(0),
            None => 0,
        }
    }

    /// Registered feature paths, sorted.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.features.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureLoader for FeatureRegistry {
    fn require(&self, engine: &ConstantEngine, path: &str) -> Result<bool> {
        let feature = self
            .find_feature(path)
            .ok_or_else(|| ConstantError::LoadError {
                path: path.to_string(),
            })?;
        if self.loaded.lock().contains(&feature) {
            return Ok(false);
        }
        let _lock = match self.locks.acquire(&feature) {
            Some(lock) => lock,
            None => {
                tracing::debug!(target: "autoconst::require", feature = %feature, "circular require ignored");
                return Ok(false);
            }
        };
        // Another thread may have finished the load while we waited for the lock.
        if self.loaded.lock().contains(&feature) {
            return Ok(false);
        }
        let body = self
            .features
            .read()
            .get(&feature)
            .cloned()
            .ok_or_else(|| ConstantError::LoadError {
                path: path.to_string(),
            })?;
        *self.executions.lock().entry(feature.clone()).or_insert(0) += 1;
        tracing::debug!(target: "autoconst::require", feature = %feature, "loading feature");
        body(engine)?;
        self.loaded.lock().insert(feature);
        Ok(true)
    }

    fn is_current_thread_holding_lock(&self, path: &str) -> bool {
        self.locks.is_held_by_current_thread(path)
    }

    fn find_feature(&self, path: &str) -> Option<String> {
        let features = self.features.read();
        if features.contains_key(path) {
            return Some(path.to_string());
        }
        let with_suffix = format!("{}{}", path, FEATURE_SUFFIX);
        if features.contains_key(&with_suffix) {
            return Some(with_suffix);
        }
        path.strip_suffix(FEATURE_SUFFIX)
            .filter(|stripped| features.contains_key(*stripped))
            .map(|stripped| stripped.to_string())
    }

    fn name(&self) -> &str {
        "feature_registry"
    }
}

/// Per-path load locks. A thread asking for a lock it already holds gets `None` instead
/// of deadlocking; other threads wait for the release.
struct FeatureLocks {
    owners: Mutex<FxHashMap<String, ThreadId>>,
    released: Condvar,
}

impl FeatureLocks {
    fn new() -> Self {
        FeatureLocks {
            owners: Mutex::new(FxHashMap::default()),
            released: Condvar::new(),
        }
    }

    fn acquire(&self, path: &str) -> Option<FeatureLockGuard<'_>> {
        let me = thread::current().id();
        let mut owners = self.owners.lock();
        loop {
            match owners.get(path) {
                None => {
                    owners.insert(path.to_string(), me);
                    return Some(FeatureLockGuard {
                        locks: self,
                        path: path.to_string(),
                    });
                }
                Some(owner) if *owner == me => return None,
                Some(_) => self.released.wait(&mut owners),
            }
        }
    }

    fn is_held_by_current_thread(&self, path: &str) -> bool {
        self.owners.lock().get(path) == Some(&thread::current().id())
    }
}

struct FeatureLockGuard<'a> {
    locks: &'a FeatureLocks,
    path: String,
}

impl Drop for FeatureLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.owners.lock().remove(&self.path);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn find_feature_with_and_without_suffix() {
        let registry = FeatureRegistry::new();
        registry.register("helper.rb", |_| Ok(()));
        registry.register("plain", |_| Ok(()));
        assert_eq!(registry.find_feature("helper").as_deref(), Some("helper.rb"));
        assert_eq!(registry.find_feature("helper.rb").as_deref(), Some("helper.rb"));
        assert_eq!(registry.find_feature("plain.rb").as_deref(), Some("plain"));
        assert_eq!(registry.find_feature("missing"), None);
        assert_eq!(registry.feature_names(), vec!["helper.rb", "plain"]);
    }

    #[test]
    fn require_runs_body_once() {
        let engine = ConstantEngine::new();
        let registry = FeatureRegistry::new();
        registry.register("once", |_| Ok(()));
        assert!(registry.require(&engine, "once").unwrap());
        assert!(!registry.require(&engine, "once").unwrap());
        assert_eq!(registry.execution_count("once"), 1);
        assert!(registry.is_loaded("once"));
    }

    #[test]
    fn require_unknown_path_is_a_load_error() {
        let engine = ConstantEngine::new();
        let registry = FeatureRegistry::new();
        let err = registry.require(&engine, "nowhere").unwrap_err();
        assert_eq!(err.to_string(), "cannot load such file -- nowhere");
    }

    #[test]
    fn failed_body_can_be_retried() {
        let engine = ConstantEngine::new();
        let registry = FeatureRegistry::new();
        let fail = Arc::new(AtomicBool::new(true));
        let flag = fail.clone();
        registry.register("flaky", move |_| {
            if flag.load(Ordering::SeqCst) {
                Err(ConstantError::raised("RuntimeError", "boom"))
            } else {
                Ok(())
            }
        });
        assert!(registry.require(&engine, "flaky").is_err());
        assert!(!registry.is_loaded("flaky"));
        fail.store(false, Ordering::SeqCst);
        assert!(registry.require(&engine, "flaky").unwrap());
        assert_eq!(registry.execution_count("flaky"), 2);
    }

    #[test]
    fn lock_is_reentrant_by_detection() {
        let locks = FeatureLocks::new();
        let guard = locks.acquire("a");
        assert!(guard.is_some());
        assert!(locks.is_held_by_current_thread("a"));
        assert!(locks.acquire("a").is_none());
        drop(guard);
        assert!(!locks.is_held_by_current_thread("a"));
    }
}
