//! The module arena shared by every thread of an engine.
//!
//! Modules are never freed, so a [`ModuleId`] stays valid for the namespace's lifetime.
//! The arena itself is a copy-on-write snapshot: creating a module publishes a new
//! vector, lookups by id never lock.
//!
//! ## Ancestry
//!
//! `ancestors(m)` is `m` itself, then its included modules (most recently included first,
//! each followed by its own includes), then the ancestry of its superclass. A module
//! appearing twice is only listed at its first position.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::runner::ds::error::{ConstantError, Result};
use crate::runner::ds::module::{Module, ModuleId, ModuleKind, ModuleRef};

pub struct Namespace {
    modules: ArcSwap<Vec<ModuleRef>>,
    write_lock: Mutex<()>,
    object: ModuleId,
}

impl Namespace {
    pub fn new() -> Self {
        let object = ModuleId::new(0);
        let root = Module::new(object, ModuleKind::Class, None);
        root.set_name_if_anonymous("Object".to_string());
        Namespace {
            modules: ArcSwap::from_pointee(vec![Arc::new(root)]),
            write_lock: Mutex::new(()),
            object,
        }
    }

    /// The root class. Top-level constants live here.
    pub fn object(&self) -> ModuleId {
        self.object
    }

    pub fn module(&self, id: ModuleId) -> Result<ModuleRef> {
        self.modules
            .load()
            .get(id.index())
            .cloned()
            .ok_or(ConstantError::UnknownModule(id))
    }

    pub fn len(&self) -> usize {
        self.modules.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates an anonymous module. Classes without an explicit superclass inherit from
    /// `Object`; plain modules have none.
    pub fn new_module(&self, kind: ModuleKind, superclass: Option<ModuleId>) -> Result<ModuleId> {
        let superclass = match (kind, superclass) {
            (ModuleKind::Module, _) => None,
            (ModuleKind::Class, None) => Some(self.object),
            (ModuleKind::Class, Some(parent)) => {
                if !self.module(parent)?.is_class() {
                    return Err(ConstantError::raised(
                        "TypeError",
                        format!("superclass must be a Class ({} given)", self.display_name(parent)),
                    ));
                }
                Some(parent)
            }
        };
        let _guard = self.write_lock.lock();
        let current = self.modules.load_full();
        let id = ModuleId::new(current.len());
        let mut next = Vec::clone(&current);
        next.push(Arc::new(Module::new(id, kind, superclass)));
        self.modules.store(Arc::new(next));
        Ok(id)
    }

    pub fn is_class(&self, id: ModuleId) -> Result<bool> {
        Ok(self.module(id)?.is_class())
    }

    pub fn display_name(&self, id: ModuleId) -> String {
        self.module(id)
            .map(|m| m.display_name())
            .unwrap_or_else(|_| id.to_string())
    }

    pub fn ancestors(&self, id: ModuleId) -> Result<Vec<ModuleId>> {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        let mut next = Some(id);
        while let Some(current) = next {
            let module = self.module(current)?;
            self.collect_with_includes(&module, &mut out, &mut seen)?;
            next = module.superclass();
        }
        Ok(out)
    }

    fn collect_with_includes(
        &self,
        module: &Module,
        out: &mut Vec<ModuleId>,
        seen: &mut FxHashSet<ModuleId>,
    ) -> Result<()> {
        if !seen.insert(module.id()) {
            return Ok(());
        }
        out.push(module.id());
        for included in module.includes().iter().rev() {
            let included = self.module(*included)?;
            self.collect_with_includes(&included, out, seen)?;
        }
        Ok(())
    }

    /// Includes `included` into `target`. Including a module already in the ancestry is a
    /// no-op. Every module whose ancestry reaches `target` has its constants token bumped,
    /// since lookups through it may now find different entries.
    pub fn include_module(&self, target: ModuleId, included: ModuleId) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let target_module = self.module(target)?;
        let included_module = self.module(included)?;
        if included_module.is_class() {
            return Err(ConstantError::raised(
                "TypeError",
                format!(
                    "wrong argument type Class (expected Module): {}",
                    included_module.display_name()
                ),
            ));
        }
        if self.ancestors(included)?.contains(&target) {
            return Err(ConstantError::raised("ArgumentError", "cyclic include detected"));
        }
        if self.ancestors(target)?.contains(&included) {
            return Ok(false);
        }
        target_module.push_include(included);
        let modules = self.modules.load();
        let mut reaches = FxHashMap::default();
        for module in modules.iter() {
            if self.reaches(module, target, &mut reaches)? {
                module.constants().bump_version();
            }
        }
        Ok(true)
    }

    // Whether `target` is in `module`'s ancestry, memoized per module.
    fn reaches(
        &self,
        module: &Module,
        target: ModuleId,
        memo: &mut FxHashMap<ModuleId, bool>,
    ) -> Result<bool> {
        if module.id() == target {
            return Ok(true);
        }
        if let Some(known) = memo.get(&module.id()) {
            return Ok(*known);
        }
        let mut found = false;
        for included in module.includes().iter() {
            if self.reaches(&*self.module(*included)?, target, memo)? {
                found = true;
                break;
            }
        }
        if !found {
            if let Some(superclass) = module.superclass() {
                found = self.reaches(&*self.module(superclass)?, target, memo)?;
            }
        }
        memo.insert(module.id(), found);
        Ok(found)
    }

    /// Names an anonymous module after the constant it was just assigned to, then names any
    /// anonymous modules already stored in its own constants.
    pub fn adopt(&self, child: ModuleId, parent: ModuleId, name: &str) -> Result<()> {
        let child_module = self.module(child)?;
        if !child_module.is_anonymous() {
            return Ok(());
        }
        child_module.set_lexical_parent_if_unset(parent);
        let full_name = if parent == self.object {
            Some(name.to_string())
        } else {
            self.module(parent)?
                .name()
                .map(|prefix| format!("{}::{}", prefix, name))
        };
        if let Some(full_name) = full_name {
            if child_module.set_name_if_anonymous(full_name) {
                for entry in child_module.constants().entries() {
                    if let Some(grandchild) = entry.value().and_then(|v| v.as_module()) {
                        self.adopt(grandchild, child, entry.name())?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}
