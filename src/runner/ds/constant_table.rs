//! Per-module constant table.
//!
//! Readers load an immutable snapshot of the name map and never block. Writers serialize
//! on a per-table lock, build the next map and publish it. Every published change:
//!
//! 1. invalidates the table-wide "constants unmodified" token,
//! 2. invalidates the token of the entry being replaced or removed,
//! 3. publishes the new map,
//! 4. renews the table-wide token.
//!
//! A reader that loads the table token *before* reading entries can therefore cache
//! its answer under that token: any later change is observable through it.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::runner::ds::constant::{ConstantEntry, LoadingState, SourceLocation, Visibility};
use crate::runner::ds::module::ModuleId;
use crate::runner::ds::token::{Assumption, CyclicAssumption};
use crate::runner::ds::value::Value;

type EntryMap = FxHashMap<Arc<str>, Arc<ConstantEntry>>;

/// How a load ends.
#[derive(Debug, Clone, PartialEq)]
pub enum AutoloadOutcome {
    /// The feature defined the constant.
    Published(Value),
    /// The feature ran without defining the constant.
    Undefined,
    /// The load failed or unwound; the stub can be loaded again.
    Restore,
}

pub(crate) enum Change {
    Keep,
    Replace(Arc<ConstantEntry>),
    Remove,
}

/// Result of [`ConstantTable::declare`].
#[derive(Debug)]
pub struct Declared {
    /// The entry that was replaced, if any.
    pub previous: Option<Arc<ConstantEntry>>,
    /// The value was parked in the unpublished slot of a load run by this thread.
    pub deferred: bool,
}

pub struct ConstantTable {
    owner: ModuleId,
    entries: ArcSwap<EntryMap>,
    write_lock: Mutex<()>,
    unmodified: CyclicAssumption,
}

impl ConstantTable {
    pub fn new(owner: ModuleId) -> Self {
        ConstantTable {
            owner,
            entries: ArcSwap::from_pointee(EntryMap::default()),
            write_lock: Mutex::new(()),
            unmodified: CyclicAssumption::new("constants unmodified"),
        }
    }

    pub fn owner(&self) -> ModuleId {
        self.owner
    }

    pub fn unmodified_token(&self) -> Arc<Assumption> {
        self.unmodified.current()
    }

    pub fn lookup_local(&self, name: &str) -> Option<Arc<ConstantEntry>> {
        self.entries.load().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.load().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Entries sorted by name.
    pub fn entries(&self) -> Vec<Arc<ConstantEntry>> {
        let mut entries: Vec<_> = self.entries.load().values().cloned().collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        entries
    }

    pub fn names(&self) -> Vec<String> {
        self.entries()
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Runs `decide` on the current entry for `name` under the write lock and publishes
    /// the change it asks for.
    pub(crate) fn modify<R, F>(&self, name: &str, decide: F) -> R
    where
        F: FnOnce(Option<&Arc<ConstantEntry>>) -> (Change, R),
    {
        let _guard = self.write_lock.lock();
        let current = self.entries.load_full();
        let existing = current.get(name).cloned();
        let (change, result) = decide(existing.as_ref());
        if let Change::Keep = change {
            return result;
        }
        self.unmodified.invalidate_current();
        if let Some(old) = &existing {
            old.token().invalidate();
        }
        let mut next = EntryMap::clone(&current);
        match change {
            Change::Replace(entry) => {
                next.insert(Arc::from(name), entry);
            }
            Change::Remove => {
                next.remove(name);
            }
            Change::Keep => {}
        }
        self.entries.store(Arc::new(next));
        self.unmodified.renew();
        result
    }

    /// Binds `name` to `value`, keeping the visibility and deprecation of an existing entry.
    /// If the current thread is autoloading this very name, the value is parked in the load
    /// instead and published when the load completes.
    pub fn declare(&self, name: &str, value: Value, location: Option<SourceLocation>) -> Declared {
        let owner = self.owner;
        self.modify(name, move |existing| match existing {
            Some(current) => match current.loading_state() {
                Some(state) if state.is_current_thread() => {
                    state.set_unpublished(value);
                    (
                        Change::Keep,
                        Declared {
                            previous: None,
                            deferred: true,
                        },
                    )
                }
                _ => (
                    Change::Replace(Arc::new(current.redefined(value, location))),
                    Declared {
                        previous: Some(current.clone()),
                        deferred: false,
                    },
                ),
            },
            None => (
                Change::Replace(Arc::new(ConstantEntry::with_value(
                    name, owner, value, location,
                ))),
                Declared {
                    previous: None,
                    deferred: false,
                },
            ),
        })
    }

    /// Registers a pending autoload. Returns false, changing nothing, if `name` already has
    /// an entry of any kind.
    pub fn declare_autoload(&self, name: &str, path: &str) -> bool {
        let owner = self.owner;
        self.modify(name, |existing| match existing {
            Some(_) => (Change::Keep, false),
            None => (
                Change::Replace(Arc::new(ConstantEntry::pending_autoload(name, owner, path))),
                true,
            ),
        })
    }

    /// Swaps the pending stub `expected` for a loading entry owned by the current thread.
    /// Returns `None` if the binding is no longer that stub.
    pub fn start_autoload(
        &self,
        name: &str,
        expected: &Arc<ConstantEntry>,
    ) -> Option<Arc<LoadingState>> {
        self.modify(name, |existing| match existing {
            Some(current) if Arc::ptr_eq(current, expected) && current.is_pending_autoload() => {
                match current.loading() {
                    Some(loading) => {
                        let state = loading.loading_state().cloned();
                        (Change::Replace(Arc::new(loading)), state)
                    }
                    None => (Change::Keep, None),
                }
            }
            _ => (Change::Keep, None),
        })
    }

    /// Ends the load tracked by `state` in a single swap. Returns the installed entry, or
    /// `None` when the binding was replaced by someone else in the meantime.
    pub fn finish_autoload(
        &self,
        name: &str,
        state: &Arc<LoadingState>,
        outcome: AutoloadOutcome,
    ) -> Option<Arc<ConstantEntry>> {
        self.modify(name, |existing| match existing {
            Some(current) if current.is_loading_with(state) => {
                let next = match outcome {
                    AutoloadOutcome::Published(value) => {
                        Some(current.redefined(value, current.defined_at().cloned()))
                    }
                    AutoloadOutcome::Undefined => Some(current.undefined_from()),
                    AutoloadOutcome::Restore => current.pending_again(),
                };
                match next {
                    Some(next) => {
                        let next = Arc::new(next);
                        (Change::Replace(next.clone()), Some(next))
                    }
                    None => (Change::Keep, None),
                }
            }
            _ => (Change::Keep, None),
        })
    }

    /// Replaces `stub` with an undefined entry, but only if it is still the binding.
    pub fn undefine_if_still_autoload(&self, name: &str, stub: &Arc<ConstantEntry>) -> bool {
        self.modify(name, |existing| match existing {
            Some(current) if Arc::ptr_eq(current, stub) && current.is_pending_autoload() => (
                Change::Replace(Arc::new(current.undefined_from())),
                true,
            ),
            _ => (Change::Keep, false),
        })
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ConstantEntry>> {
        self.modify(name, |existing| match existing {
            Some(current) => (Change::Remove, Some(current.clone())),
            None => (Change::Keep, None),
        })
    }

    /// Returns false if `name` has no entry.
    pub fn set_visibility(&self, name: &str, visibility: Visibility) -> bool {
        self.modify(name, |existing| match existing {
            Some(current) => (
                Change::Replace(Arc::new(current.with_visibility(visibility))),
                true,
            ),
            None => (Change::Keep, false),
        })
    }

    /// Returns false if `name` has no entry.
    pub fn deprecate(&self, name: &str) -> bool {
        self.modify(name, |existing| match existing {
            Some(current) => (Change::Replace(Arc::new(current.with_deprecated())), true),
            None => (Change::Keep, false),
        })
    }

    /// Invalidates cached lookups through this table without changing any entry. Used when
    /// the module's ancestry changes.
    pub fn bump_version(&self) {
        let _guard = self.write_lock.lock();
        self.unmodified.invalidate();
    }
}
