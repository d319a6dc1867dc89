//! # Engine Configuration
//!
//! Settings are resolved in three layers, later ones winning:
//!
//! 1. built-in defaults,
//! 2. an optional TOML file,
//! 3. `CRUDL_*` environment variables.
//!
//! ```toml
//! page_size = 20
//! actor_buffer = 32
//! log_filter = "info"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const ENV_PAGE_SIZE: &str = "CRUDL_PAGE_SIZE";
pub const ENV_ACTOR_BUFFER: &str = "CRUDL_ACTOR_BUFFER";
pub const ENV_LOG: &str = "CRUDL_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Records per page of collection reads.
    pub page_size: usize,
    /// Mailbox capacity of each resource actor.
    pub actor_buffer: usize,
    /// Default log filter when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            actor_buffer: 32,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validated()
    }

    /// Reads `path` if it exists, then applies the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = match fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(ConfigError::Io(format!("{}: {e}", path.display()))),
        };
        config.apply_env()
    }

    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup; `apply_env` uses the process
    /// environment.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_PAGE_SIZE) {
            self.page_size = parse_count(ENV_PAGE_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ACTOR_BUFFER) {
            self.actor_buffer = parse_count(ENV_ACTOR_BUFFER, &raw)?;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }
        self.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.page_size == 0 {
            return Err(invalid("page_size", "0"));
        }
        if self.actor_buffer == 0 {
            return Err(invalid("actor_buffer", "0"));
        }
        Ok(self)
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
