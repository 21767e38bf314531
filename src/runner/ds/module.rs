use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::runner::ds::constant_table::ConstantTable;

/// Identity of a module in a [`Namespace`](super::namespace::Namespace) arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(usize);

impl ModuleId {
    pub(crate) fn new(index: usize) -> Self {
        ModuleId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<Module:0x{:x}>", self.0)
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Module,
    Class,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Module => write!(f, "module"),
            ModuleKind::Class => write!(f, "class"),
        }
    }
}

pub struct Module {
    id: ModuleId,
    kind: ModuleKind,
    name: RwLock<Option<String>>,
    lexical_parent: RwLock<Option<ModuleId>>,
    superclass: Option<ModuleId>,
    includes: RwLock<Vec<ModuleId>>,
    constants: ConstantTable,
}

impl Module {
    pub(crate) fn new(id: ModuleId, kind: ModuleKind, superclass: Option<ModuleId>) -> Self {
        Module {
            id,
            kind,
            name: RwLock::new(None),
            lexical_parent: RwLock::new(None),
            superclass,
            includes: RwLock::new(Vec::new()),
            constants: ConstantTable::new(id),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn is_class(&self) -> bool {
        self.kind == ModuleKind::Class
    }

    pub fn name(&self) -> Option<String> {
        self.name.read().clone()
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.read().is_none()
    }

    /// The full name, or `#<Module:0x..>` while anonymous.
    pub fn display_name(&self) -> String {
        match &*self.name.read() {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }

    /// Sets the name unless one is already set. Returns whether it was set.
    pub(crate) fn set_name_if_anonymous(&self, name: String) -> bool {
        let mut slot = self.name.write();
        if slot.is_some() {
            return false;
        }
        *slot = Some(name);
        true
    }

    pub fn lexical_parent(&self) -> Option<ModuleId> {
        *self.lexical_parent.read()
    }

    pub(crate) fn set_lexical_parent_if_unset(&self, parent: ModuleId) {
        let mut slot = self.lexical_parent.write();
        if slot.is_none() {
            *slot = Some(parent);
        }
    }

    pub fn superclass(&self) -> Option<ModuleId> {
        self.superclass
    }

    /// Directly included modules, in inclusion order.
    pub fn includes(&self) -> Vec<ModuleId> {
        self.includes.read().clone()
    }

    pub(crate) fn push_include(&self, module: ModuleId) {
        self.includes.write().push(module);
    }

    pub fn constants(&self) -> &ConstantTable {
        &self.constants
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.display_name())
            .field("superclass", &self.superclass)
            .field("constants", &self.constants.len())
            .finish()
    }
}

pub type ModuleRef = Arc<Module>;
