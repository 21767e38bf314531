use std::fmt;
use std::sync::Arc;

use crate::runner::ds::module::ModuleId;

/// The chain of module bodies enclosing a piece of code. The outermost scope is the root
/// (top-level code, whose live module is `Object`).
pub struct LexicalScope {
    module: ModuleId,
    outer: Option<Arc<LexicalScope>>,
}

impl LexicalScope {
    pub fn root(object: ModuleId) -> Arc<Self> {
        Arc::new(LexicalScope {
            module: object,
            outer: None,
        })
    }

    /// The scope of a `module`/`class` body opened inside this one.
    pub fn nest(self: &Arc<Self>, module: ModuleId) -> Arc<Self> {
        Arc::new(LexicalScope {
            module,
            outer: Some(self.clone()),
        })
    }

    pub fn live_module(&self) -> ModuleId {
        self.module
    }

    pub fn parent(&self) -> Option<&Arc<LexicalScope>> {
        self.outer.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.outer.is_none()
    }

    /// Modules of the enclosing bodies, innermost first, excluding the root.
    pub fn enclosing_modules(&self) -> Vec<ModuleId> {
        let mut modules = vec![];
        let mut scope = Some(self);
        while let Some(current) = scope {
            if current.is_root() {
                break;
            }
            modules.push(current.module);
            scope = current.outer.as_deref();
        }
        modules
    }

    pub fn encloses(&self, module: ModuleId) -> bool {
        self.enclosing_modules().contains(&module)
    }
}

impl fmt::Debug for LexicalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LexicalScope({:?})", self.enclosing_modules())
    }
}
