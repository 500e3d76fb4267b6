//! Grove: Hierarchical Data Tree Persistence
//!
//! Persists runtime trees of named, typed nodes into a single container file
//! and incrementally updates that file by diffing the runtime tree against
//! what is already on disk, node by node.

pub mod api;
pub mod config;
pub mod container;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod payload;
pub mod read;
pub mod tree;
pub mod types;

mod write;

pub use api::{compact, save, SaveData, SaveOptions};
pub use error::{ConfigError, ContainerError, TreeError, WriteError};
pub use metadata::Metadata;
pub use payload::{ArrayData, DimVector, Payload, RecordList};
pub use tree::{NodeId, Tree};
pub use types::{NodeKind, TreeScope, WriteMode};
