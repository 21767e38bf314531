//! Constant entries.
//!
//! An entry is immutable once installed in a [`ConstantTable`](super::constant_table::ConstantTable).
//! Every change to a binding builds a new entry and swaps it in, invalidating the old
//! entry's token. The only interior mutability is the unpublished-value slot of an
//! autoload that is being loaded, which only the loading thread writes.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::runner::ds::module::ModuleId;
use crate::runner::ds::token::Assumption;
use crate::runner::ds::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Source position of a definition, used when warning about redefinitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        SourceLocation {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

pub enum Binding {
    Value(Value),
    Autoload(Autoload),
    /// The name is known but has no value, e.g. an autoload whose feature never defined it.
    Undefined,
}

pub struct Autoload {
    path: String,
    phase: AutoloadPhase,
}

pub enum AutoloadPhase {
    Pending,
    Loading(Arc<LoadingState>),
}

/// A load in progress. Values written by the loading thread are parked here and only
/// published once the load completes.
pub struct LoadingState {
    thread: ThreadId,
    unpublished: Mutex<Option<Value>>,
}

impl LoadingState {
    fn for_current_thread() -> Self {
        LoadingState {
            thread: thread::current().id(),
            unpublished: Mutex::new(None),
        }
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    pub fn is_current_thread(&self) -> bool {
        self.thread == thread::current().id()
    }

    pub fn unpublished(&self) -> Option<Value> {
        self.unpublished.lock().clone()
    }

    pub(crate) fn set_unpublished(&self, value: Value) {
        *self.unpublished.lock() = Some(value);
    }

    pub(crate) fn take_unpublished(&self) -> Option<Value> {
        self.unpublished.lock().take()
    }
}

impl Autoload {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn phase(&self) -> &AutoloadPhase {
        &self.phase
    }

    pub fn loading_state(&self) -> Option<&Arc<LoadingState>> {
        match &self.phase {
            AutoloadPhase::Loading(state) => Some(state),
            AutoloadPhase::Pending => None,
        }
    }
}

pub struct ConstantEntry {
    name: Arc<str>,
    declaring_module: ModuleId,
    binding: Binding,
    visibility: Visibility,
    deprecated: bool,
    defined_at: Option<SourceLocation>,
    token: Arc<Assumption>,
}

impl ConstantEntry {
    fn build(name: &str, declaring_module: ModuleId, binding: Binding) -> Self {
        let token = match &binding {
            Binding::Autoload(Autoload {
                phase: AutoloadPhase::Loading(_),
                ..
            }) => Assumption::never_valid("constant loading"),
            _ => Assumption::new("constant unchanged"),
        };
        ConstantEntry {
            name: Arc::from(name),
            declaring_module,
            binding,
            visibility: Visibility::Public,
            deprecated: false,
            defined_at: None,
            token,
        }
    }

    pub fn with_value(
        name: &str,
        declaring_module: ModuleId,
        value: Value,
        defined_at: Option<SourceLocation>,
    ) -> Self {
        let mut entry = Self::build(name, declaring_module, Binding::Value(value));
        entry.defined_at = defined_at;
        entry
    }

    pub fn pending_autoload(name: &str, declaring_module: ModuleId, path: &str) -> Self {
        Self::build(
            name,
            declaring_module,
            Binding::Autoload(Autoload {
                path: path.to_string(),
                phase: AutoloadPhase::Pending,
            }),
        )
    }

    pub fn undefined(name: &str, declaring_module: ModuleId) -> Self {
        Self::build(name, declaring_module, Binding::Undefined)
    }

    /// A loading entry owned by the current thread, copying this entry's flags.
    pub(crate) fn loading(&self) -> Option<Self> {
        let path = self.autoload_path()?;
        Some(self.derive(Binding::Autoload(Autoload {
            path: path.to_string(),
            phase: AutoloadPhase::Loading(Arc::new(LoadingState::for_current_thread())),
        })))
    }

    /// A fresh pending stub for the same path, used when a load ends without a value.
    pub(crate) fn pending_again(&self) -> Option<Self> {
        let path = self.autoload_path()?;
        Some(self.derive(Binding::Autoload(Autoload {
            path: path.to_string(),
            phase: AutoloadPhase::Pending,
        })))
    }

    pub(crate) fn undefined_from(&self) -> Self {
        self.derive(Binding::Undefined)
    }

    /// A value entry replacing this one. Visibility and deprecation carry over.
    pub(crate) fn redefined(&self, value: Value, defined_at: Option<SourceLocation>) -> Self {
        let mut entry = self.derive(Binding::Value(value));
        entry.defined_at = defined_at;
        entry
    }

    pub(crate) fn with_visibility(&self, visibility: Visibility) -> Self {
        let mut entry = self.derive(self.binding_copy());
        entry.visibility = visibility;
        entry
    }

    pub(crate) fn with_deprecated(&self) -> Self {
        let mut entry = self.derive(self.binding_copy());
        entry.deprecated = true;
        entry
    }

    fn derive(&self, binding: Binding) -> Self {
        let mut entry = Self::build(&self.name, self.declaring_module, binding);
        entry.visibility = self.visibility;
        entry.deprecated = self.deprecated;
        entry.defined_at = self.defined_at.clone();
        entry
    }

    // Flag changes on a loading entry share the load state with the original.
    fn binding_copy(&self) -> Binding {
        match &self.binding {
            Binding::Value(v) => Binding::Value(v.clone()),
            Binding::Undefined => Binding::Undefined,
            Binding::Autoload(autoload) => Binding::Autoload(Autoload {
                path: autoload.path.clone(),
                phase: match &autoload.phase {
                    AutoloadPhase::Pending => AutoloadPhase::Pending,
                    AutoloadPhase::Loading(state) => AutoloadPhase::Loading(state.clone()),
                },
            }),
        }
    }

    /// Is this entry part of the load tracked by `state`?
    pub(crate) fn is_loading_with(&self, state: &Arc<LoadingState>) -> bool {
        self.loading_state()
            .map_or(false, |current| Arc::ptr_eq(current, state))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_module(&self) -> ModuleId {
        self.declaring_module
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn defined_at(&self) -> Option<&SourceLocation> {
        self.defined_at.as_ref()
    }

    pub fn token(&self) -> &Arc<Assumption> {
        &self.token
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.binding {
            Binding::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn has_value(&self) -> bool {
        self.value().is_some()
    }

    pub fn autoload(&self) -> Option<&Autoload> {
        match &self.binding {
            Binding::Autoload(autoload) => Some(autoload),
            _ => None,
        }
    }

    pub fn is_autoload(&self) -> bool {
        self.autoload().is_some()
    }

    pub fn is_pending_autoload(&self) -> bool {
        matches!(
            self.autoload().map(|a| a.phase()),
            Some(AutoloadPhase::Pending)
        )
    }

    pub fn autoload_path(&self) -> Option<&str> {
        self.autoload().map(|a| a.path())
    }

    pub fn loading_state(&self) -> Option<&Arc<LoadingState>> {
        self.autoload().and_then(|a| a.loading_state())
    }

    /// Whether `defined?` would report this binding. A constant being loaded by the
    /// current thread is only defined once the load has produced a value.
    pub fn is_defined(&self) -> bool {
        match &self.binding {
            Binding::Value(_) => true,
            Binding::Undefined => false,
            Binding::Autoload(autoload) => match &autoload.phase {
                AutoloadPhase::Pending => true,
                AutoloadPhase::Loading(state) => {
                    !state.is_current_thread() || state.unpublished.lock().is_some()
                }
            },
        }
    }
}

impl fmt::Debug for ConstantEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = match &self.binding {
            Binding::Value(v) => format!("{:?}", v),
            Binding::Undefined => "undefined".to_string(),
            Binding::Autoload(a) => match &a.phase {
                AutoloadPhase::Pending => format!("autoload({})", a.path),
                AutoloadPhase::Loading(s) => format!("loading({}, {:?})", a.path, s.thread),
            },
        };
        f.debug_struct("ConstantEntry")
            .field("name", &self.name)
            .field("declaring_module", &self.declaring_module)
            .field("binding", &binding)
            .field("visibility", &self.visibility)
            .field("deprecated", &self.deprecated)
            .finish()
    }
}
