//! The constant engine: one namespace plus the host hooks that lookups call out to.
//!
//! All operations take `&self` and may be called from any number of threads. Reads never
//! block; writes serialize per constant table; autoloads serialize in the feature loader.

use std::sync::Arc;

use uuid::Uuid;

use crate::parser::is_valid_constant_name;
use crate::runner::ds::constant::ConstantEntry;
use crate::runner::ds::error::{ConstantError, Result};
use crate::runner::ds::lex_env::LexicalScope;
use crate::runner::ds::module::{ModuleId, ModuleKind};
use crate::runner::ds::namespace::Namespace;
use crate::runner::ds::value::Value;
use crate::runner::eval::lookup;
use crate::runner::eval::types::{ConstantLookupResult, LookupOptions, LookupStart};
use crate::runner::plugin::config::EngineConfig;
use crate::runner::plugin::core_resolver::RaiseNameError;
use crate::runner::plugin::registry::FeatureRegistry;
use crate::runner::plugin::resolver::{ConstMissingHook, FeatureLoader};
use crate::runner::plugin::warning::{self, ConstantWarning, TracingWarningSink, WarningSink};

pub struct ConstantEngine {
    id: Uuid,
    config: EngineConfig,
    namespace: Namespace,
    root_scope: Arc<LexicalScope>,
    loader: Arc<dyn FeatureLoader>,
    const_missing: Arc<dyn ConstMissingHook>,
    warnings: Arc<dyn WarningSink>,
}

impl ConstantEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let namespace = Namespace::new();
        let root_scope = LexicalScope::root(namespace.object());
        ConstantEngine {
            id: Uuid::new_v4(),
            config,
            namespace,
            root_scope,
            loader: Arc::new(FeatureRegistry::new()),
            const_missing: Arc::new(RaiseNameError),
            warnings: Arc::new(TracingWarningSink),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn FeatureLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_const_missing(mut self, hook: Arc<dyn ConstMissingHook>) -> Self {
        self.const_missing = hook;
        self
    }

    pub fn with_warning_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.warnings = sink;
        self
    }

    /// Identity of this engine instance. Lookup sites cache only for the first engine
    /// they serve.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn loader(&self) -> &Arc<dyn FeatureLoader> {
        &self.loader
    }

    pub fn object_class(&self) -> ModuleId {
        self.namespace.object()
    }

    /// The scope of top-level code.
    pub fn root_scope(&self) -> &Arc<LexicalScope> {
        &self.root_scope
    }

    // ── Module model ────────────────────────────────────────────────────

    /// `module Name` inside `parent`: reopens an existing module, autoloading it if needed,
    /// or creates and names a new one.
    pub fn define_module(&self, parent: ModuleId, name: &str) -> Result<ModuleId> {
        self.open_module(parent, name, ModuleKind::Module, None)
    }

    /// `class Name < superclass` inside `parent`. `None` means `Object`.
    pub fn define_class(
        &self,
        parent: ModuleId,
        name: &str,
        superclass: Option<ModuleId>,
    ) -> Result<ModuleId> {
        self.open_module(parent, name, ModuleKind::Class, superclass)
    }

    fn open_module(
        &self,
        parent: ModuleId,
        name: &str,
        kind: ModuleKind,
        superclass: Option<ModuleId>,
    ) -> Result<ModuleId> {
        self.check_name(parent, name)?;
        let start = LookupStart::module(parent, LookupOptions::LOCAL);
        let (result, visible) = self.cold_lookup(&start, name)?;
        if let Some(value) = self.read_entry(&start, name, result.entry(), visible, false)? {
            return match value.as_module() {
                Some(id) if self.namespace.module(id)?.kind() == kind => Ok(id),
                _ => Err(ConstantError::raised(
                    "TypeError",
                    format!("{} is not a {}", self.constant_name(parent, name), kind),
                )),
            };
        }
        let id = self.namespace.new_module(kind, superclass)?;
        self.write(parent, name, Value::Module(id))?;
        Ok(id)
    }

    pub fn include_module(&self, target: ModuleId, included: ModuleId) -> Result<bool> {
        self.namespace.include_module(target, included)
    }

    pub fn ancestors(&self, module: ModuleId) -> Result<Vec<ModuleId>> {
        self.namespace.ancestors(module)
    }

    pub fn module_name(&self, module: ModuleId) -> String {
        self.namespace.display_name(module)
    }

    /// `NAME` for top-level constants, `Mod::NAME` otherwise.
    pub fn constant_name(&self, module: ModuleId, name: &str) -> String {
        if module == self.namespace.object() {
            name.to_string()
        } else {
            format!("{}::{}", self.module_name(module), name)
        }
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Uncached `module::name`. With `trigger_missing_hook` unset a missing constant is
    /// `Ok(None)`; otherwise the missing hook decides.
    pub fn resolve(
        &self,
        module: ModuleId,
        name: &str,
        check_name: bool,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        self.resolve_with(module, name, check_name, LookupOptions::QUALIFIED, trigger_missing_hook)
    }

    pub fn resolve_with(
        &self,
        module: ModuleId,
        name: &str,
        check_name: bool,
        options: LookupOptions,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        if check_name {
            self.check_name(module, name)?;
        }
        let start = LookupStart::module(module, options);
        let (result, visible) = self.cold_lookup(&start, name)?;
        self.read_entry(&start, name, result.entry(), visible, trigger_missing_hook)
    }

    /// Uncached bare-name lookup from `scope`.
    pub fn resolve_lexical(
        &self,
        scope: &LexicalScope,
        name: &str,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        let start = LookupStart::Lexical(scope);
        let (result, visible) = self.cold_lookup(&start, name)?;
        self.read_entry(&start, name, result.entry(), visible, trigger_missing_hook)
    }

    /// Bare-name lookup from a scope only known at run time. Same answer as
    /// [`resolve_lexical`](Self::resolve_lexical); the distinction matters for caching
    /// sites.
    pub fn resolve_dynamic(
        &self,
        scope: &Arc<LexicalScope>,
        name: &str,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        self.resolve_lexical(scope, name, trigger_missing_hook)
    }

    /// `defined?(module::name)`. A private constant is reported as not defined; every
    /// other error propagates.
    pub fn is_defined(&self, module: ModuleId, name: &str) -> Result<bool> {
        match self.is_defined_strict(module, name) {
            Err(err) if err.is_private_constant() => Ok(false),
            other => other,
        }
    }

    pub(crate) fn is_defined_strict(&self, module: ModuleId, name: &str) -> Result<bool> {
        self.check_name(module, name)?;
        let start = LookupStart::module(module, LookupOptions::QUALIFIED);
        let (result, visible) = self.cold_lookup(&start, name)?;
        match result.entry() {
            None => Ok(false),
            Some(entry) if !visible => Err(self.private_constant_error(entry)),
            Some(entry) => Ok(entry.is_defined()),
        }
    }

    pub(crate) fn check_name(&self, module: ModuleId, name: &str) -> Result<()> {
        if is_valid_constant_name(name) {
            Ok(())
        } else {
            Err(ConstantError::InvalidName {
                module: self.module_name(module),
                name: name.to_string(),
            })
        }
    }

    /// The cold lookup plus its visibility verdict.
    pub(crate) fn cold_lookup(
        &self,
        start: &LookupStart<'_>,
        name: &str,
    ) -> Result<(ConstantLookupResult, bool)> {
        let result = lookup::lookup(&self.namespace, start, name)?;
        let visible = match result.entry() {
            Some(entry) => lookup::is_visible(&self.namespace, entry, start)?,
            None => true,
        };
        Ok((result, visible))
    }

    /// Turns a lookup answer, cached or fresh, into a value.
    pub(crate) fn read_entry(
        &self,
        start: &LookupStart<'_>,
        name: &str,
        entry: Option<&Arc<ConstantEntry>>,
        visible: bool,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        let entry = match entry {
            Some(entry) => entry,
            None => return self.constant_missing(start.missing_module(), name, trigger_missing_hook),
        };
        if !visible {
            return Err(self.private_constant_error(entry));
        }
        if entry.is_deprecated() {
            self.report(ConstantWarning::deprecated(
                &self.constant_name(entry.declaring_module(), name),
            ));
        }
        self.resolve_entry(start, name, entry, trigger_missing_hook)
    }

    pub(crate) fn constant_missing(
        &self,
        module: ModuleId,
        name: &str,
        trigger_missing_hook: bool,
    ) -> Result<Option<Value>> {
        if trigger_missing_hook {
            self.const_missing.const_missing(self, module, name).map(Some)
        } else {
            Ok(None)
        }
    }

    pub(crate) fn private_constant_error(&self, entry: &ConstantEntry) -> ConstantError {
        let module = entry.declaring_module();
        ConstantError::PrivateConstant {
            module: self.module_name(module),
            name: entry.name().to_string(),
            qualified: self.constant_name(module, entry.name()),
        }
    }

    pub(crate) fn report(&self, warning: ConstantWarning) {
        warning::report(self.warnings.as_ref(), warning);
    }
}

impl Default for ConstantEngine {
    fn default() -> Self {
        Self::new()
    }
}
