//! Core shared types: group identifiers, node kinds, write modes.

use crate::error::WriteError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an on-disk container group record.
pub type GroupId = u64;

/// The closed set of node kinds the engine recognizes on disk.
///
/// Every engine-managed group is tagged with one of these; untagged groups
/// (e.g. the reserved metadata bundle container) are structural only and are
/// ignored by the diff-merge walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Root,
    Node,
    Array,
    Records,
    Metadata,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Node => "node",
            NodeKind::Array => "array",
            NodeKind::Records => "records",
            NodeKind::Metadata => "metadata",
        }
    }

    /// Parse a tag value; returns `None` for unrecognized markers.
    pub fn parse(s: &str) -> Option<NodeKind> {
        match s {
            "root" => Some(NodeKind::Root),
            "node" => Some(NodeKind::Node),
            "array" => Some(NodeKind::Array),
            "records" => Some(NodeKind::Records),
            "metadata" => Some(NodeKind::Metadata),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write mode, parsed once at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Write a new file; fail if the destination exists.
    #[default]
    Write,
    /// Delete any existing file first, then write.
    Overwrite,
    /// Add new nodes; leave nodes already present untouched.
    Append,
    /// Add new nodes; replace nodes already present.
    AppendOver,
}

impl FromStr for WriteMode {
    type Err = WriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "w" | "write" => Ok(WriteMode::Write),
            "o" | "overwrite" => Ok(WriteMode::Overwrite),
            "a" | "+" | "append" => Ok(WriteMode::Append),
            "ao" | "oa" | "o+" | "+o" | "appendover" => Ok(WriteMode::AppendOver),
            other => Err(WriteError::Mode(other.to_string())),
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriteMode::Write => "write",
            WriteMode::Overwrite => "overwrite",
            WriteMode::Append => "append",
            WriteMode::AppendOver => "appendover",
        };
        f.write_str(s)
    }
}

/// Controls how much of the runtime tree a write includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeScope {
    /// The node and its entire subtree.
    #[default]
    Full,
    /// The node only, no subtree.
    NodeOnly,
    /// The subtree only, excluding the node itself.
    SubtreeOnly,
}
