//! Validity tokens for cached lookups.
//!
//! A cached lookup result records the tokens it depends on. Mutations flip those tokens
//! from valid to invalid, which is the only signal a cache needs.
//!
//! ## Kinds
//!
//! - [`Assumption`]: a flip-once flag. Once invalid it stays invalid.
//! - [`CyclicAssumption`]: a slot holding the *current* assumption. Invalidating it flips
//!   the current one; renewing installs a fresh valid one. Modules use this for their
//!   "constants unmodified" token.
//! - [`Guards`]: the set of assumptions a cached answer depends on.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

pub struct Assumption {
    name: &'static str,
    valid: AtomicBool,
}

impl Assumption {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Assumption {
            name,
            valid: AtomicBool::new(true),
        })
    }

    /// An assumption that was never valid. Entries in transient states carry one so that
    /// nothing caches them.
    pub fn never_valid(name: &'static str) -> Arc<Self> {
        Arc::new(Assumption {
            name,
            valid: AtomicBool::new(false),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for Assumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Assumption({}, {})",
            self.name,
            if self.is_valid() { "valid" } else { "invalid" }
        )
    }
}

pub struct CyclicAssumption {
    name: &'static str,
    current: ArcSwap<Assumption>,
}

impl CyclicAssumption {
    pub fn new(name: &'static str) -> Self {
        CyclicAssumption {
            name,
            current: ArcSwap::new(Assumption::new(name)),
        }
    }

    pub fn current(&self) -> Arc<Assumption> {
        self.current.load_full()
    }

    pub fn invalidate_current(&self) {
        self.current.load().invalidate();
    }

    /// Installs a fresh valid assumption. The previous one should already be invalid.
    pub fn renew(&self) {
        self.current.store(Assumption::new(self.name));
    }

    /// Invalidate then renew in one step, for changes with no intermediate state.
    pub fn invalidate(&self) {
        self.invalidate_current();
        self.renew();
    }
}

impl fmt::Debug for CyclicAssumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CyclicAssumption({:?})", self.current.load())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Guards(Vec<Arc<Assumption>>);

impl Guards {
    pub fn new() -> Self {
        Guards(Vec::new())
    }

    pub fn push(&mut self, assumption: Arc<Assumption>) {
        self.0.push(assumption);
    }

    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|a| a.is_valid())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
