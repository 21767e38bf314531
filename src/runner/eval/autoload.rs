//! Value resolution and the autoload state machine.
//!
//! An autoload entry moves `Pending -> Loading(thread) -> value | Pending | Undefined`.
//! Only the thread that wins the `Pending -> Loading` swap runs the feature; every other
//! reader sees the constant as missing until the load publishes. The loading thread's own
//! writes to the constant are parked and published when the feature returns.

use std::sync::Arc;

use crate::runner::ds::constant::{AutoloadPhase, Binding, ConstantEntry, LoadingState};
use crate::runner::ds::constant_table::{AutoloadOutcome, ConstantTable};
use crate::runner::ds::error::{ConstantError, Result};
use crate::runner::ds::module::ModuleId;
use crate::runner::ds::value::Value;
use crate::runner::engine::ConstantEngine;
use crate::runner::eval::lookup;
use crate::runner::eval::types::LookupStart;

macro_rules! autoload_log {
    ($engine:expr, $($arg:tt)+) => {
        if $engine.config().log_autoload {
            tracing::info!(target: "autoconst::autoload", $($arg)+);
        }
    };
}

impl ConstantEngine {
    /// Registers `path` as the feature that defines `module::name`. Does nothing if the
    /// constant already has any binding.
    pub fn declare_autoload(&self, module: ModuleId, name: &str, path: &str) -> Result<()> {
        if !crate::parser::is_valid_constant_name(name) {
            return Err(ConstantError::InvalidAutoloadName {
                module: self.module_name(module),
                name: name.to_string(),
            });
        }
        if path.is_empty() {
            return Err(ConstantError::EmptyAutoloadPath);
        }
        let target = self.namespace().module(module)?;
        if target.constants().declare_autoload(name, path) {
            autoload_log!(
                self,
                constant = %self.constant_name(module, name),
                path,
                "setting up autoload"
            );
        }
        Ok(())
    }

    /// `autoload?`: the registered path of an autoload reachable from `module`, unless the
    /// current thread is already loading it.
    pub fn autoload_path(&self, module: ModuleId, name: &str) -> Result<Option<String>> {
        self.check_name(module, name)?;
        let result = lookup::lookup_in_ancestry(self.namespace(), module, name, false)?;
        let entry = match result.entry() {
            Some(entry) => entry,
            None => return Ok(None),
        };
        match entry.autoload() {
            Some(autoload) => match autoload.loading_state() {
                Some(state) if state.is_current_thread() => Ok(None),
                _ => Ok(Some(autoload.path().to_string())),
            },
            None => Ok(None),
        }
    }

    pub(crate) fn resolve_entry(
        &self,
        start: &LookupStart<'_>,
        name: &str,
        entry: &Arc<ConstantEntry>,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        match entry.binding() {
            Binding::Value(value) => Ok(Some(value.clone())),
            Binding::Undefined => {
                self.constant_missing(start.missing_module(), name, trigger_missing_hook)
            }
            Binding::Autoload(autoload) => match autoload.phase() {
                AutoloadPhase::Pending => self.autoload_constant(start, name, entry, trigger_missing_hook),
                AutoloadPhase::Loading(state) if state.is_current_thread() => match state.unpublished() {
                    Some(value) => Ok(Some(value)),
                    None => self.constant_missing(start.missing_module(), name, trigger_missing_hook),
                },
                AutoloadPhase::Loading(_) => {
                    autoload_log!(
                        self,
                        constant = %self.constant_name(entry.declaring_module(), name),
                        "constant is being autoloaded by another thread"
                    );
                    self.constant_missing(start.missing_module(), name, trigger_missing_hook)
                }
            },
        }
    }

    fn autoload_constant(
        &self,
        start: &LookupStart<'_>,
        name: &str,
        stub: &Arc<ConstantEntry>,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        let path = match stub.autoload_path() {
            Some(path) => path.to_string(),
            None => return self.constant_missing(start.missing_module(), name, trigger_missing_hook),
        };
        let declaring = stub.declaring_module();
        let qualified = self.constant_name(declaring, name);

        if let Some(feature) = self.loader().find_feature(&path) {
            if self.loader().is_current_thread_holding_lock(&feature) {
                autoload_log!(
                    self,
                    constant = %qualified,
                    path = %path,
                    "feature is already being required by this thread, treating constant as missing"
                );
                return self.constant_missing(start.missing_module(), name, trigger_missing_hook);
            }
        }

        let module = self.namespace().module(declaring)?;
        let table = module.constants();
        let state = match table.start_autoload(name, stub) {
            Some(state) => state,
            None => return self.after_lost_race(start, name, stub, trigger_missing_hook),
        };

        autoload_log!(self, constant = %qualified, path = %path, "starting autoload");
        let mut load = LoadInProgress {
            table,
            name,
            state: &state,
            done: false,
        };
        if let Err(source) = self.loader().require(self, &path) {
            load.finish(AutoloadOutcome::Restore);
            autoload_log!(self, constant = %qualified, path = %path, "autoload failed");
            return Err(ConstantError::AutoloadFailure {
                qualified,
                path,
                source: Box::new(source),
            });
        }

        if let Some(value) = state.take_unpublished() {
            if let Some(value) = load
                .finish(AutoloadOutcome::Published(value))
                .as_ref()
                .and_then(|entry| entry.value())
            {
                autoload_log!(self, constant = %qualified, "autoload published constant");
                return Ok(Some(value.clone()));
            }
            return self.after_load(start, name, trigger_missing_hook);
        }

        // Loading a feature does not guarantee it defined this constant. The entry stays
        // loading through the re-lookup so no other thread can start a second load.
        let retry = lookup::lookup(self.namespace(), start, name)?;
        let found = retry.entry().and_then(|entry| entry.value()).cloned();
        if load.finish(AutoloadOutcome::Undefined).is_some() {
            autoload_log!(
                self,
                constant = %qualified,
                path = %path,
                "feature did not define constant, undefining it"
            );
        }
        match found {
            Some(value) => Ok(Some(value)),
            None => self.after_load(start, name, trigger_missing_hook),
        }
    }

    // The load ended without publishing through this thread. A value another thread bound in
    // the meantime still counts.
    fn after_load(
        &self,
        start: &LookupStart<'_>,
        name: &str,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        let retry = lookup::lookup(self.namespace(), start, name)?;
        match retry.entry().and_then(|entry| entry.value()) {
            Some(value) => Ok(Some(value.clone())),
            None => self.constant_missing(start.missing_module(), name, trigger_missing_hook),
        }
    }

    // Another thread started the load or replaced the stub first. Whatever is bound now
    // decides the answer; a load in progress reads as missing.
    fn after_lost_race(
        &self,
        start: &LookupStart<'_>,
        name: &str,
        stub: &Arc<ConstantEntry>,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        let retry = lookup::lookup(self.namespace(), start, name)?;
        match retry.entry() {
            Some(entry) if !Arc::ptr_eq(entry, stub) && !entry.is_pending_autoload() => {
                self.resolve_entry(start, name, entry, trigger_missing_hook)
            }
            _ => self.constant_missing(start.missing_module(), name, trigger_missing_hook),
        }
    }
}

/// Ends the load exactly once. If the feature panics the load is rolled back to a pending
/// stub on unwind.
struct LoadInProgress<'a> {
    table: &'a ConstantTable,
    name: &'a str,
    state: &'a Arc<LoadingState>,
    done: bool,
}

impl LoadInProgress<'_> {
    fn finish(&mut self, outcome: AutoloadOutcome) -> Option<Arc<ConstantEntry>> {
        self.done = true;
        self.table.finish_autoload(self.name, self.state, outcome)
    }
}

impl Drop for LoadInProgress<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.table
                .finish_autoload(self.name, self.state, AutoloadOutcome::Restore);
        }
    }
}
