use thiserror::Error;

use crate::runner::ds::module::ModuleId;

pub type Result<T> = std::result::Result<T, ConstantError>;

/// Errors surfaced by constant lookup, assignment and autoload.
///
/// Module names are display names (`Foo::Bar`, `#<Module:0x2>` for anonymous modules)
/// captured when the error is raised.
#[derive(Debug, Clone, Error)]
pub enum ConstantError {
    #[error("wrong constant name {name}")]
    InvalidName { module: String, name: String },

    #[error("autoload must be constant name: {name}")]
    InvalidAutoloadName { module: String, name: String },

    #[error("private constant {qualified} referenced")]
    PrivateConstant {
        module: String,
        name: String,
        qualified: String,
    },

    #[error("uninitialized constant {qualified}")]
    Missing {
        module: String,
        name: String,
        qualified: String,
    },

    #[error("constant {qualified} not defined")]
    NotDefined {
        module: String,
        name: String,
        qualified: String,
    },

    #[error("{path} does not refer to class/module")]
    NotAModule { path: String },

    #[error("empty file name")]
    EmptyAutoloadPath,

    #[error("cannot load such file -- {path}")]
    LoadError { path: String },

    #[error("autoload of {qualified} from {path} failed: {source}")]
    AutoloadFailure {
        qualified: String,
        path: String,
        #[source]
        source: Box<ConstantError>,
    },

    #[error("{class}: {message}")]
    Raised { class: String, message: String },

    #[error("unknown module {0}")]
    UnknownModule(ModuleId),
}

impl ConstantError {
    pub fn raised(class: &str, message: impl Into<String>) -> Self {
        ConstantError::Raised {
            class: class.to_string(),
            message: message.into(),
        }
    }

    /// Errors a host would surface as `NameError`.
    pub fn is_name_error(&self) -> bool {
        matches!(
            self,
            ConstantError::InvalidName { .. }
                | ConstantError::InvalidAutoloadName { .. }
                | ConstantError::PrivateConstant { .. }
                | ConstantError::Missing { .. }
                | ConstantError::NotDefined { .. }
        )
    }

    pub fn is_private_constant(&self) -> bool {
        matches!(self, ConstantError::PrivateConstant { .. })
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ConstantError::Missing { .. })
    }
}
