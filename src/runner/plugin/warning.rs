//! Constant warnings: deprecated reads and redefinitions.
//!
//! Whether a category is reported is a process-wide switch, like the host's `Warning[]`
//! table. Reported warnings go to the engine's [`WarningSink`].

use std::fmt;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;

use crate::runner::ds::constant::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCategory {
    Deprecated,
    Redefinition,
}

lazy_static! {
    static ref ENABLED_CATEGORIES: RwLock<FxHashSet<WarningCategory>> = {
        let mut enabled = FxHashSet::default();
        enabled.insert(WarningCategory::Deprecated);
        enabled.insert(WarningCategory::Redefinition);
        RwLock::new(enabled)
    };
}

pub fn is_warning_enabled(category: WarningCategory) -> bool {
    ENABLED_CATEGORIES.read().contains(&category)
}

pub fn set_warning_enabled(category: WarningCategory, enabled: bool) {
    let mut categories = ENABLED_CATEGORIES.write();
    if enabled {
        categories.insert(category);
    } else {
        categories.remove(&category);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantWarning {
    pub category: WarningCategory,
    pub message: String,
    pub location: Option<SourceLocation>,
    /// For redefinitions: the constant's name and where it was previously defined.
    pub previous: Option<(String, SourceLocation)>,
}

impl ConstantWarning {
    pub fn deprecated(qualified: &str) -> Self {
        ConstantWarning {
            category: WarningCategory::Deprecated,
            message: format!("constant {} is deprecated", qualified),
            location: None,
            previous: None,
        }
    }

    pub fn already_initialized(
        qualified: &str,
        name: &str,
        location: Option<SourceLocation>,
        previous: Option<SourceLocation>,
    ) -> Self {
        ConstantWarning {
            category: WarningCategory::Redefinition,
            message: format!("already initialized constant {}", qualified),
            location,
            previous: previous.map(|at| (name.to_string(), at)),
        }
    }

    /// The lines as the host prints them, `file:line: warning: ...` when located.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![located(self.location.as_ref(), &self.message)];
        if let Some((name, at)) = &self.previous {
            lines.push(located(
                Some(at),
                &format!("previous definition of {} was here", name),
            ));
        }
        lines
    }
}

fn located(location: Option<&SourceLocation>, message: &str) -> String {
    match location {
        Some(at) => format!("{}: warning: {}", at, message),
        None => format!("warning: {}", message),
    }
}

impl fmt::Display for ConstantWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

/// Receives warnings that passed the category switch.
pub trait WarningSink: Send + Sync {
    fn emit(&self, warning: &ConstantWarning);
}

/// Logs each warning line with `tracing::warn!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWarningSink;

impl WarningSink for TracingWarningSink {
    fn emit(&self, warning: &ConstantWarning) {
        for line in warning.lines() {
            tracing::warn!(target: "autoconst::warning", category = ?warning.category, "{}", line);
        }
    }
}

/// Keeps every warning in memory.
#[derive(Debug, Default)]
pub struct RecordingWarningSink {
    warnings: Mutex<Vec<ConstantWarning>>,
}

impl RecordingWarningSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<ConstantWarning> {
        self.warnings.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.warnings
            .lock()
            .iter()
            .map(|w| w.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.lock().is_empty()
    }

    pub fn clear(&self) {
        self.warnings.lock().clear();
    }
}

impl WarningSink for RecordingWarningSink {
    fn emit(&self, warning: &ConstantWarning) {
        self.warnings.lock().push(warning.clone());
    }
}

/// Sends `warning` to `sink` if its category is enabled.
pub(crate) fn report(sink: &dyn WarningSink, warning: ConstantWarning) {
    if is_warning_enabled(warning.category) {
        sink.emit(&warning);
    }
}
