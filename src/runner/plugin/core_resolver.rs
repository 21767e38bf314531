//! Stock missing-constant hooks.

use crate::runner::ds::error::{ConstantError, Result};
use crate::runner::ds::module::ModuleId;
use crate::runner::ds::value::Value;
use crate::runner::engine::ConstantEngine;
use crate::runner::plugin::resolver::ConstMissingHook;

/// The default hook: a missing constant is a `NameError`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RaiseNameError;

impl ConstMissingHook for RaiseNameError {
    fn const_missing(&self, engine: &ConstantEngine, module: ModuleId, name: &str) -> Result<Value> {
        Err(ConstantError::Missing {
            module: engine.module_name(module),
            name: name.to_string(),
            qualified: engine.constant_name(module, name),
        })
    }
}

/// Adapts a closure into a [`ConstMissingHook`].
pub struct FnConstMissing<F> {
    handler: F,
}

impl<F> FnConstMissing<F>
where
    F: Fn(&ConstantEngine, ModuleId, &str) -> Result<Value> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        FnConstMissing { handler }
    }
}

impl<F> ConstMissingHook for FnConstMissing<F>
where
    F: Fn(&ConstantEngine, ModuleId, &str) -> Result<Value> + Send + Sync,
{
    fn const_missing(&self, engine: &ConstantEngine, module: ModuleId, name: &str) -> Result<Value> {
        (self.handler)(engine, module, name)
    }
}
