//! Error types for the grove tree persistence system.

use std::path::PathBuf;
use thiserror::Error;

/// Container adapter errors
///
/// Distinguishes "not found" from backend I/O failure from name collisions so
/// callers can decide remediation without string matching.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("group not found: {0}")]
    NotFound(String),

    #[error("name collision: {0}")]
    Collision(String),

    #[error("container already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("no container at {0}")]
    NoContainer(PathBuf),

    #[error("corrupt container record: {0}")]
    Corrupt(String),

    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("record encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("container I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runtime tree errors
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("a sibling named '{0}' already exists")]
    NameCollision(String),

    #[error("node '{0}' is already attached to a tree")]
    AlreadyRooted(String),

    #[error("node '{0}' is still attached; detach it first")]
    StillAttached(String),

    #[error("cannot remove node '{0}' while it has children")]
    HasChildren(String),
}

/// Write engine errors
///
/// All variants are fatal to the current call; nothing is retried internally.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("unrecognized or invalid mode: {0}")]
    Mode(String),

    #[error("a file already exists at {0}; use append or overwrite mode, or choose a new path")]
    Exists(PathBuf),

    #[error("{0} is not a grove container (missing format header)")]
    NotGrove(PathBuf),

    #[error("no node found at '{path}' in tree '{root}'")]
    Path { root: String, path: String },

    #[error("runtime tree does not match the target path: {0}")]
    PathMismatch(String),

    #[error("a group named '{0}' already exists at this location")]
    NodeConflict(String),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration and logging setup errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(String),

    #[error("invalid log directive: {0}")]
    Logging(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
