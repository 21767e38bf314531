//! Core types for constant lookup.

use std::sync::Arc;

use crate::runner::ds::constant::ConstantEntry;
use crate::runner::ds::lex_env::LexicalScope;
use crate::runner::ds::module::ModuleId;
use crate::runner::ds::token::Guards;

/// How a lookup walks the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupOptions {
    /// Walk ancestors, not just the starting module's own table.
    pub inherit: bool,
    /// For a plain module start, also search `Object` and its ancestors.
    pub include_root: bool,
    /// Private constants are visible.
    pub ignore_visibility: bool,
}

impl LookupOptions {
    /// `M::X`: inherited, falls back to `Object`, respects visibility.
    pub const QUALIFIED: LookupOptions = LookupOptions {
        inherit: true,
        include_root: true,
        ignore_visibility: false,
    };

    /// `const_get`-style reflection.
    pub const REFLECTIVE: LookupOptions = LookupOptions {
        inherit: true,
        include_root: true,
        ignore_visibility: true,
    };

    /// The module's own table only.
    pub const LOCAL: LookupOptions = LookupOptions {
        inherit: false,
        include_root: false,
        ignore_visibility: true,
    };

    pub fn with_inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }
}

impl Default for LookupOptions {
    fn default() -> Self {
        LookupOptions::QUALIFIED
    }
}

/// Where a lookup starts. The missing hook is called with the start's module.
#[derive(Debug, Clone, Copy)]
pub enum LookupStart<'a> {
    Module {
        module: ModuleId,
        options: LookupOptions,
    },
    Lexical(&'a LexicalScope),
}

impl<'a> LookupStart<'a> {
    pub fn module(module: ModuleId, options: LookupOptions) -> Self {
        LookupStart::Module { module, options }
    }

    pub fn missing_module(&self) -> ModuleId {
        match self {
            LookupStart::Module { module, .. } => *module,
            LookupStart::Lexical(scope) => scope.live_module(),
        }
    }

    pub fn ignores_visibility(&self) -> bool {
        match self {
            LookupStart::Module { options, .. } => options.ignore_visibility,
            LookupStart::Lexical(_) => false,
        }
    }

    pub fn scope(&self) -> Option<&'a LexicalScope> {
        match self {
            LookupStart::Lexical(scope) => Some(*scope),
            LookupStart::Module { .. } => None,
        }
    }
}

/// Which part of the search produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOrigin {
    /// A lexically enclosing module body, `depth` 0 being the innermost.
    Lexical { depth: usize },
    /// The ancestry of the starting (or live) module.
    Ancestor { index: usize },
    /// The `Object` fallback for plain modules.
    Root { index: usize },
}

/// Outcome of a cold lookup: the entry found, if any, plus the tokens the answer depends on.
#[derive(Debug, Clone)]
pub struct ConstantLookupResult {
    entry: Option<Arc<ConstantEntry>>,
    origin: Option<LookupOrigin>,
    guards: Guards,
}

impl ConstantLookupResult {
    pub(crate) fn found(entry: Arc<ConstantEntry>, origin: LookupOrigin, guards: Guards) -> Self {
        ConstantLookupResult {
            entry: Some(entry),
            origin: Some(origin),
            guards,
        }
    }

    pub(crate) fn not_found(guards: Guards) -> Self {
        ConstantLookupResult {
            entry: None,
            origin: None,
            guards,
        }
    }

    pub fn is_found(&self) -> bool {
        self.entry.is_some()
    }

    pub fn entry(&self) -> Option<&Arc<ConstantEntry>> {
        self.entry.as_ref()
    }

    pub fn origin(&self) -> Option<LookupOrigin> {
        self.origin
    }

    pub fn declaring_module(&self) -> Option<ModuleId> {
        self.entry.as_ref().map(|e| e.declaring_module())
    }

    pub fn guards(&self) -> &Guards {
        &self.guards
    }

    /// Still valid as of now. An answer involving a loading entry never is.
    pub fn is_cacheable(&self) -> bool {
        self.guards.is_valid()
    }
}
