pub mod ds;
pub mod engine;
pub mod eval;
pub mod plugin;
