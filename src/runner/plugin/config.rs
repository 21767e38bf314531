//! Engine configuration.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

pub const ENV_LOG_AUTOLOAD: &str = "AUTOCONST_LOG_AUTOLOAD";
pub const ENV_CONSTANT_CACHE: &str = "AUTOCONST_CONSTANT_CACHE";
pub const ENV_SINGLE_CONTEXT: &str = "AUTOCONST_SINGLE_CONTEXT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Tuning knobs for a [`ConstantEngine`](crate::runner::engine::ConstantEngine).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cache lines per lookup site before it goes megamorphic. 0 disables caching.
    pub constant_cache: usize,
    /// Log autoload activity at info level on the `autoconst::autoload` target.
    pub log_autoload: bool,
    /// Lookup sites may cache. Turn off when sites are shared between engines.
    pub single_context: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    constants: EngineConfig,
}

impl EngineConfig {
    pub fn new() -> Self {
        EngineConfig {
            constant_cache: 4,
            log_autoload: false,
            single_context: true,
        }
    }

    pub fn with_constant_cache(mut self, lines: usize) -> Self {
        self.constant_cache = lines;
        self
    }

    pub fn with_log_autoload(mut self, enabled: bool) -> Self {
        self.log_autoload = enabled;
        self
    }

    pub fn with_single_context(mut self, enabled: bool) -> Self {
        self.single_context = enabled;
        self
    }

    pub fn caching_enabled(&self) -> bool {
        self.single_context && self.constant_cache > 0
    }

    /// Load configuration from a TOML file.
    ///
    /// Expected format:
    /// ```toml
    /// [constants]
    /// constant_cache = 4
    /// log_autoload = false
    /// single_context = true
    /// ```
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string. Missing keys keep their defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.constants)
    }

    /// Defaults overridden by `AUTOCONST_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new().apply_env(|key| env::var(key).ok())
    }

    fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_CONSTANT_CACHE) {
            self.constant_cache = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_CONSTANT_CACHE,
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup(ENV_LOG_AUTOLOAD) {
            self.log_autoload = parse_flag(ENV_LOG_AUTOLOAD, &value)?;
        }
        if let Some(value) = lookup(ENV_SINGLE_CONTEXT) {
            self.single_context = parse_flag(ENV_SINGLE_CONTEXT, &value)?;
        }
        Ok(self)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
