//! Reflective constant operations (`const_get`, `remove_const`, `private_constant`, ...).

use rustc_hash::FxHashSet;

use crate::parser::ConstantPath;
use crate::runner::ds::constant::Visibility;
use crate::runner::ds::error::{ConstantError, Result};
use crate::runner::ds::module::ModuleId;
use crate::runner::ds::value::Value;
use crate::runner::engine::ConstantEngine;
use crate::runner::eval::types::{LookupOptions, LookupStart};

impl ConstantEngine {
    /// `module.const_get(path, inherit)`. Accepts `A::B::C` and `::A`. Ignores
    /// visibility, runs autoloads and calls the missing hook for each segment.
    pub fn const_get(&self, module: ModuleId, path: &str, inherit: bool) -> Result<Value> {
        let parsed = self.parse_path(module, path)?;
        let (owner, last) = self.walk_path(module, &parsed, true)?;
        match owner {
            Some(owner) => self.reflective_read(owner, last, inherit, true)?.ok_or_else(|| {
                ConstantError::Missing {
                    module: self.module_name(owner),
                    name: last.to_string(),
                    qualified: self.constant_name(owner, last),
                }
            }),
            None => Err(ConstantError::NotAModule {
                path: parsed.to_string(),
            }),
        }
    }

    /// `module.const_defined?(path, inherit)`. Intermediate segments are resolved, and
    /// autoloaded if needed; the last one only has to be bound.
    pub fn const_defined(&self, module: ModuleId, path: &str, inherit: bool) -> Result<bool> {
        let parsed = self.parse_path(module, path)?;
        let (owner, last) = match self.walk_path(module, &parsed, false)? {
            (Some(owner), last) => (owner, last),
            (None, _) => return Ok(false),
        };
        let options = LookupOptions::REFLECTIVE.with_inherit(inherit);
        let start = LookupStart::module(owner, options);
        let (result, _) = self.cold_lookup(&start, last)?;
        Ok(result.entry().map_or(false, |entry| entry.is_defined()))
    }

    /// `module.const_set(name, value)`: a validated [`write`](Self::write).
    pub fn const_set(&self, module: ModuleId, name: &str, value: Value) -> Result<Value> {
        self.check_name(module, name)?;
        self.write(module, name, value)
    }

    /// Removes `module`'s own binding for `name` and returns its value, `None` for an
    /// autoload that never ran.
    pub fn remove_const(&self, module: ModuleId, name: &str) -> Result<Option<Value>> {
        self.check_name(module, name)?;
        let target = self.namespace().module(module)?;
        match target.constants().remove(name) {
            Some(removed) => Ok(removed.value().cloned()),
            None => Err(self.not_defined(module, name)),
        }
    }

    pub fn private_constant(&self, module: ModuleId, names: &[&str]) -> Result<()> {
        self.change_visibility(module, names, Visibility::Private)
    }

    pub fn public_constant(&self, module: ModuleId, names: &[&str]) -> Result<()> {
        self.change_visibility(module, names, Visibility::Public)
    }

    /// Marks constants deprecated; every later read warns.
    pub fn deprecate_constant(&self, module: ModuleId, names: &[&str]) -> Result<()> {
        let target = self.namespace().module(module)?;
        for name in names {
            if !target.constants().deprecate(name) {
                return Err(self.not_defined(module, name));
            }
        }
        Ok(())
    }

    /// `module.constants(inherit)`: public names, own table first, then ancestors in
    /// order. `Object`'s constants are only listed for `Object` itself.
    pub fn constants(&self, module: ModuleId, inherit: bool) -> Result<Vec<String>> {
        let object = self.object_class();
        let sources = if inherit {
            self.ancestors(module)?
                .into_iter()
                .filter(|id| *id != object || module == object)
                .collect()
        } else {
            vec![module]
        };
        let mut seen = FxHashSet::default();
        let mut names = Vec::new();
        for id in sources {
            for entry in self.namespace().module(id)?.constants().entries() {
                if entry.visibility() == Visibility::Public && seen.insert(entry.name().to_string()) {
                    names.push(entry.name().to_string());
                }
            }
        }
        Ok(names)
    }

    fn change_visibility(&self, module: ModuleId, names: &[&str], visibility: Visibility) -> Result<()> {
        let target = self.namespace().module(module)?;
        for name in names {
            if !target.constants().set_visibility(name, visibility) {
                return Err(self.not_defined(module, name));
            }
        }
        Ok(())
    }

    fn not_defined(&self, module: ModuleId, name: &str) -> ConstantError {
        ConstantError::NotDefined {
            module: self.module_name(module),
            name: name.to_string(),
            qualified: self.constant_name(module, name),
        }
    }

    fn parse_path(&self, module: ModuleId, path: &str) -> Result<ConstantPath> {
        ConstantPath::parse(path).map_err(|_| ConstantError::InvalidName {
            module: self.module_name(module),
            name: path.to_string(),
        })
    }

    fn reflective_read(
        &self,
        module: ModuleId,
        name: &str,
        inherit: bool,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        let options = LookupOptions::REFLECTIVE.with_inherit(inherit);
        self.resolve_with(module, name, false, options, trigger_missing_hook)
    }

    /// Resolves every segment but the last to a module. Returns the module owning the last
    /// segment, or `None` when some segment is missing (only when `strict` is unset).
    fn walk_path<'p>(
        &self,
        module: ModuleId,
        path: &'p ConstantPath,
        strict: bool,
    ) -> Result<(Option<ModuleId>, &'p str)> {
        let mut current = if path.is_absolute() {
            self.object_class()
        } else {
            module
        };
        let segments = path.segments();
        for (index, segment) in segments[..segments.len() - 1].iter().enumerate() {
            let value = match self.reflective_read(current, segment, true, strict)? {
                Some(value) => value,
                None => return Ok((None, path.last())),
            };
            current = match value.as_module() {
                Some(next) => next,
                None if strict => {
                    return Err(ConstantError::NotAModule {
                        path: path.prefix(index),
                    })
                }
                None => return Ok((None, path.last())),
            };
        }
        Ok((Some(current), path.last()))
    }
}
