//! Constant lookup, caching, autoload and assignment.
//!
//! The cold path lives in [`lookup`]; [`site`] layers per-reference caches on top of it;
//! [`autoload`] turns a found entry into a value, running autoloads as needed. The
//! remaining modules extend [`ConstantEngine`](crate::runner::engine::ConstantEngine) with
//! writes and reflection.

pub mod assign;
pub mod autoload;
pub mod cache;
pub mod lookup;
pub mod reflection;
pub mod site;
pub mod types;

pub use cache::CacheStats;
pub use site::{DynamicScopeSite, ExplicitModuleSite, LexicalSite};
pub use types::{ConstantLookupResult, LookupOptions, LookupOrigin, LookupStart};
