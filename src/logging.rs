//! Logging system
//!
//! Structured logging via the `tracing` crate with configurable level,
//! format, and destination. Environment variables win over configuration:
//! `GROVE_LOG` supplies a full filter directive set, `GROVE_LOG_FORMAT`
//! forces `json` or `text`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path (if output is "file")
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Enable colored output (text format, stdout only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stdout".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("grove.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Initialize the logging system
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ConfigError> {
    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let base = Registry::default().with(filter);
    let use_color = config.map(|c| c.color).unwrap_or(true);

    let to_file = config.map(|c| c.output == "file").unwrap_or(false);
    if to_file {
        let log_file = config
            .map(|c| c.file.clone())
            .unwrap_or_else(default_log_file);
        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Load(format!("Failed to create log directory: {}", e)))?;
        }
        let writer = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| {
                ConfigError::Load(format!("Failed to open log file {:?}: {}", log_file, e))
            })?;
        if format == "json" {
            base.with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .init();
        } else {
            base.with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .init();
        }
    } else if format == "json" {
        base.with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(std::io::stdout),
        )
        .init();
    } else {
        base.with(
            fmt::layer()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(use_color)
                .with_writer(std::io::stdout),
        )
        .init();
    }

    Ok(())
}

/// Build the filter from `GROVE_LOG` or the configured levels
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_env("GROVE_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);
    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            let directive = format!("{}={}", module, module_level);
            filter = filter.add_directive(
                directive
                    .parse()
                    .map_err(|e| ConfigError::Logging(format!("{}", e)))?,
            );
        }
    }
    Ok(filter)
}

fn determine_format(config: Option<&LoggingConfig>) -> Result<String, ConfigError> {
    if let Ok(format) = std::env::var("GROVE_LOG_FORMAT") {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }

    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    if format != "json" && format != "text" {
        return Err(ConfigError::Load(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }
    Ok(format.to_string())
}
