//! Config loading: JSON5 file, then environment overrides, then validation.

mod env;
mod schema;


use crate::{ConfigError, JaroConfig};
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Default config filename looked up by the server binary.
pub const DEFAULT_CONFIG_FILE: &str = "jaro.json5";

const VALID_LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error"];
const MIN_SIZE_BYTES: u64 = 1024;

impl JaroConfig {
    /// Load a config from a JSON5 file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    /// Load a config from JSON5 contents.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load an optional file, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from environment variables resolved by `lookup`.
    ///
    /// Empty values are ignored. Call `validate` afterwards.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let applied = env::apply(self, &lookup)?;
        if applied > 0 {
            info!("applied environment overrides (count={applied})");
        }
        Ok(())
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = &self.server;
        if server.port == 0 {
            return Err(invalid("server.port", "must be 1-65535"));
        }
        if server.host.trim().is_empty() {
            return Err(invalid("server.host", "cannot be empty"));
        }
        if server.request_timeout_secs < 1 {
            return Err(invalid("server.request_timeout_secs", "minimum 1s"));
        }
        if server.idle_timeout_secs < 1 {
            return Err(invalid("server.idle_timeout_secs", "minimum 1s"));
        }
        if server.max_body_size < MIN_SIZE_BYTES {
            return Err(invalid("server.max_body_size", "minimum 1KB"));
        }
        if server.max_file_upload_size < MIN_SIZE_BYTES {
            return Err(invalid("server.max_file_upload_size", "minimum 1KB"));
        }
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "logging.level",
                &format!(
                    "invalid log level: {} (must be: debug, info, warn, error)",
                    self.logging.level
                ),
            ));
        }
        if self.llm.timeout_secs < 1 {
            return Err(invalid("llm.timeout_secs", "minimum 1s"));
        }
        if self.engine.behavior_version.trim().is_empty() {
            return Err(invalid("engine.behavior_version", "cannot be empty"));
        }
        Ok(())
    }
}

fn config_from_value(value: Value, label: &str) -> Result<JaroConfig, ConfigError> {
    schema::validate_schema(&value, label)?;
    let config: JaroConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}

fn invalid(path: &str, message: &str) -> ConfigError {
    ConfigError::InvalidField {
        path: path.to_string(),
        message: message.to_string(),
    }
}
