//! Traits the engine calls out through.
//!
//! The engine never loads code itself. When an autoload fires it asks a
//! [`FeatureLoader`] to `require` the registered path, and when a lookup finds nothing it
//! asks a [`ConstMissingHook`] what to do.

use crate::runner::ds::error::Result;
use crate::runner::ds::module::ModuleId;
use crate::runner::ds::value::Value;
use crate::runner::engine::ConstantEngine;

/// Loads features on behalf of autoload.
pub trait FeatureLoader: Send + Sync {
    /// Load the feature at `path`, running its body against `engine`.
    ///
    /// Returns `Ok(false)` when the feature was already loaded or is being loaded by the
    /// current thread (a circular require), and `Ok(true)` when this call ran it.
    /// Implementations serialize loads of one path: a second thread asking for a path
    /// that is being loaded blocks until the first load finishes.
    fn require(&self, engine: &ConstantEngine, path: &str) -> Result<bool>;

    /// Does the current thread hold the per-path load lock for `path`?
    ///
    /// `path` is a resolved feature path as returned by [`find_feature`](Self::find_feature).
    fn is_current_thread_holding_lock(&self, path: &str) -> bool;

    /// Resolve a requested path to the feature it would load, if any.
    ///
    /// This must be cheap and must not load anything.
    fn find_feature(&self, path: &str) -> Option<String>;

    /// Human-readable name for this loader (for debugging/logging).
    fn name(&self) -> &str {
        "feature_loader"
    }
}

/// Decides what a failed lookup evaluates to.
pub trait ConstMissingHook: Send + Sync {
    /// Called with the module the lookup started from and the missing name. Either
    /// produce a value or raise.
    fn const_missing(&self, engine: &ConstantEngine, module: ModuleId, name: &str) -> Result<Value>;
}
