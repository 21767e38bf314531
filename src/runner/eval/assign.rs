//! Constant assignment: `M::X = v` and `M::X ||= v`.

use crate::runner::ds::constant::SourceLocation;
use crate::runner::ds::error::Result;
use crate::runner::ds::module::ModuleId;
use crate::runner::ds::value::Value;
use crate::runner::engine::ConstantEngine;
use crate::runner::plugin::warning::ConstantWarning;

impl ConstantEngine {
    pub fn write(&self, module: ModuleId, name: &str, value: Value) -> Result<Value> {
        self.write_at(module, name, value, None)
    }

    /// Binds `module::name`. Replacing an existing value warns `already initialized
    /// constant`, pointing at both definitions when their locations are known. An
    /// anonymous module value takes its name from the constant.
    pub fn write_at(
        &self,
        module: ModuleId,
        name: &str,
        value: Value,
        location: Option<SourceLocation>,
    ) -> Result<Value> {
        let target = self.namespace().module(module)?;
        let declared = target
            .constants()
            .declare(name, value.clone(), location.clone());
        if let Some(previous) = declared.previous.filter(|previous| previous.has_value()) {
            self.report(ConstantWarning::already_initialized(
                &self.constant_name(module, name),
                name,
                location,
                previous.defined_at().cloned(),
            ));
        }
        if let Some(child) = value.as_module() {
            self.namespace().adopt(child, module, name)?;
        }
        Ok(value)
    }

    /// `module::name ||= rhs` with an already evaluated module.
    pub fn or_assign<F>(&self, module: ModuleId, name: &str, rhs: F) -> Result<Value>
    where
        F: FnOnce(&ConstantEngine) -> Result<Value>,
    {
        self.or_assign_scoped(|_| Ok(module), name, rhs)
    }

    /// `expr::name ||= rhs`. `module_expr` runs exactly once, before anything else;
    /// `rhs` runs only when the constant is undefined or falsy. Errors raised while
    /// checking definedness, private constants included, propagate.
    pub fn or_assign_scoped<M, F>(&self, module_expr: M, name: &str, rhs: F) -> Result<Value>
    where
        M: FnOnce(&ConstantEngine) -> Result<ModuleId>,
        F: FnOnce(&ConstantEngine) -> Result<Value>,
    {
        let module = module_expr(self)?;
        if self.is_defined_strict(module, name)? {
            if let Some(current) = self.resolve(module, name, true, false)? {
                if current.is_truthy() {
                    return Ok(current);
                }
            }
        }
        let value = rhs(self)?;
        self.write(module, name, value)
    }
}
