//! Configuration system
//!
//! Layered configuration with environment variable overrides: built-in
//! defaults, then an optional global TOML file, then `GROVE_*` environment
//! variables. Carries the authoring identity stamped into new file headers
//! and the logging configuration.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroveConfig {
    /// Identity recorded in the header of every newly created container
    #[serde(default)]
    pub authoring: AuthoringConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Authoring identity for file headers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthoringConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_user")]
    pub user: String,
}

fn default_program() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn default_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}

impl Default for AuthoringConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            user: default_user(),
        }
    }
}

/// Path of the global configuration file, if a home directory is resolvable.
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "grove")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl GroveConfig {
    /// Load configuration in priority order (highest to lowest):
    /// 1. `GROVE_*` environment variables (e.g. `GROVE_AUTHORING__USER`)
    /// 2. The global configuration file
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = global_config_path() {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("GROVE").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
