//! Host-facing seams of the constant engine.
//!
//! The engine resolves constants on its own but leans on the host for three things:
//! loading code when an autoload fires, deciding what a missing constant means, and
//! reporting warnings.
//!
//! ### Key Components
//!
//! - **[`FeatureLoader`]**: loads a feature path on behalf of autoload
//! - **[`FeatureRegistry`]**: in-memory loader of named feature bodies
//! - **[`ConstMissingHook`]**: invoked when a lookup finds nothing
//! - **[`RaiseNameError`]**: default hook, raises `uninitialized constant`
//! - **[`WarningSink`]**: receives deprecation and redefinition warnings
//! - **[`EngineConfig`]**: cache size, autoload logging, context mode
//!
//! ## Example: Autoloading From A Registry
//!
//! ```
//! use std::sync::Arc;
//! use autoconst::runner::engine::ConstantEngine;
//! use autoconst::runner::plugin::FeatureRegistry;
//! use autoconst::runner::ds::value::Value;
//!
//! let features = Arc::new(FeatureRegistry::new());
//! features.register("helper_feature", |engine| {
//!     engine.write(engine.object_class(), "Helper", Value::from("X"))?;
//!     Ok(())
//! });
//!
//! let engine = ConstantEngine::new().with_loader(features.clone());
//! let object = engine.object_class();
//! engine.declare_autoload(object, "Helper", "helper_feature").unwrap();
//!
//! let value = engine.resolve(object, "Helper", true, false).unwrap();
//! assert_eq!(value, Some(Value::from("X")));
//! assert_eq!(features.execution_count("helper_feature"), 1);
//! ```

pub mod config;
pub mod core_resolver;
pub mod registry;
pub mod resolver;
pub mod warning;

pub use config::{ConfigError, EngineConfig};
pub use core_resolver::{FnConstMissing, RaiseNameError};
pub use registry::FeatureRegistry;
pub use resolver::{ConstMissingHook, FeatureLoader};
pub use warning::{
    ConstantWarning, RecordingWarningSink, TracingWarningSink, WarningCategory, WarningSink,
};
