//! Runtime configuration for engines and coordinators
//!
//! Loaded from TOML, then overridden by `PERSONA_*` environment variables
//! (`PERSONA_ENGINE_INSTANCE_ID`, `PERSONA_ENGINE_STRICT_REMOVE_UNTIL`,
//! `PERSONA_COORDINATOR_DEFAULT_LOCK_TIMEOUT_MS`).

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const ENV_PREFIX: &str = "PERSONA_";

/// Composition engine settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pin the engine instance id; allocated from the process sequence when unset
    pub instance_id: Option<u64>,
    /// Disable the single-contract shortcut in `remove_until`
    pub strict_remove_until: bool,
}

/// Proxy coordinator settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Timeout for blocking locks taken with the default timeout; 0 waits forever
    pub default_lock_timeout_ms: u64,
}

impl CoordinatorConfig {
    /// Default lock timeout, `None` meaning wait indefinitely
    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.default_lock_timeout_ms > 0)
            .then(|| Duration::from_millis(self.default_lock_timeout_ms))
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub engine: EngineConfig,
    pub coordinator: CoordinatorConfig,
}

impl PersonaConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "loaded persona config");
        Ok(config)
    }

    /// Apply `PERSONA_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `PERSONA_*` overrides from an explicit variable list
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(setting) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match setting {
                "ENGINE_INSTANCE_ID" => {
                    self.engine.instance_id = Some(parse_setting("engine.instance_id", value)?);
                }
                "ENGINE_STRICT_REMOVE_UNTIL" => {
                    self.engine.strict_remove_until =
                        parse_setting("engine.strict_remove_until", value)?;
                }
                "COORDINATOR_DEFAULT_LOCK_TIMEOUT_MS" => {
                    self.coordinator.default_lock_timeout_ms =
                        parse_setting("coordinator.default_lock_timeout_ms", value)?;
                }
                _ => continue,
            }
            debug!(setting, "applied environment override");
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.instance_id == Some(0) {
            return Err(ConfigError::invalid(
                "engine.instance_id",
                "engine ids start at 1",
            ));
        }
        Ok(())
    }
}

fn parse_setting<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, e.to_string()))
}
