mod api;

pub use api::{is_valid_constant_name, ConstNameParser, ConstantPath, Rule};
