//! # autoconst - Constant Resolution Engine in Rust
//!
//! A thread-safe engine for resolving named constants in a module namespace, featuring:
//! - Qualified (`M::X`), lexical and dynamic-scope lookups over module ancestry
//! - Per-site polymorphic caches invalidated by validity tokens
//! - Lazy autoload of constants through a pluggable feature loader
//! - Private and deprecated constants, redefinition warnings
//!
//! ## Quick Start
//!
//! ### Defining and reading constants
//!
//! ```
//! use autoconst::runner::engine::ConstantEngine;
//! use autoconst::runner::ds::value::Value;
//!
//! let engine = ConstantEngine::new();
//! let object = engine.object_class();
//!
//! engine.write(object, "VERSION", Value::from("1.0")).unwrap();
//! let version = engine.resolve(object, "VERSION", true, false).unwrap();
//! assert_eq!(version, Some(Value::from("1.0")));
//! ```
//!
//! ### Caching call sites
//!
//! ```
//! use autoconst::runner::engine::ConstantEngine;
//! use autoconst::runner::eval::ExplicitModuleSite;
//! use autoconst::runner::ds::value::Value;
//!
//! let engine = ConstantEngine::new();
//! let config = engine.define_module(engine.object_class(), "Config").unwrap();
//! engine.write(config, "LIMIT", Value::Integer(10)).unwrap();
//!
//! // One site per `Config::LIMIT` reference in host code.
//! let site = ExplicitModuleSite::new("LIMIT");
//! for _ in 0..3 {
//!     assert_eq!(site.resolve(&engine, config, true).unwrap(), Some(Value::Integer(10)));
//! }
//! assert_eq!(site.stats().hits, 2);
//! ```
//!
//! ## Validity Tokens
//!
//! Cached answers are never checked against the namespace itself. Instead every
//! lookup records the tokens it depended on:
//!
//! 1. **Entry tokens**: flipped when the binding that was found is replaced.
//! 2. **Table tokens**: flipped when a table that was searched without success gains
//!    or loses any binding, or when the ancestry below it changes.
//!
//! A cache line is used only while all its tokens are valid. Tokens never become valid
//! again; tables install a fresh one after each change.
//!
//! ## Architecture
//!
//! - **[`parser`]** - Constant name and path grammar
//! - **[`runner`]** - The engine
//!   - **[`runner::ds`]** - Data structures (values, entries, tables, modules)
//!   - **[`runner::eval`]** - Lookup, caching sites, autoload, assignment, reflection
//!   - **[`runner::plugin`]** - Feature loaders, missing hooks, warnings, configuration

#[macro_use]
extern crate lazy_static;

pub mod parser;
pub mod runner;
