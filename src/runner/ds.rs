pub mod constant;
pub mod constant_table;
pub mod error;
pub mod lex_env;
pub mod module;
pub mod namespace;
pub mod token;
pub mod value;
