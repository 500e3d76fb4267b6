//! Runtime node storage

use crate::metadata::Metadata;
use crate::payload::Payload;
use std::collections::BTreeMap;

/// Handle to a node held in a [`Tree`](super::Tree) arena.
///
/// Handles are plain indices: cheap to copy, no ownership, and invalidated
/// only by an explicit [`Tree::remove`](super::Tree::remove).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A single named vertex of the runtime data tree.
#[derive(Debug, Clone)]
pub(crate) struct NodeEntry {
    /// NFC-normalized node name; unique among siblings.
    pub(crate) name: String,
    pub(crate) payload: Payload,
    pub(crate) parent: Option<NodeId>,
    /// Non-owning back-pointer to the owning root; cleared on detach.
    pub(crate) root: Option<NodeId>,
    /// Child name to child handle; insertion order irrelevant.
    pub(crate) children: BTreeMap<String, NodeId>,
    /// Metadata bundles keyed by bundle name.
    pub(crate) metadata: BTreeMap<String, Metadata>,
}

impl NodeEntry {
    pub(crate) fn new(name: String, payload: Payload) -> Self {
        Self {
            name,
            payload,
            parent: None,
            root: None,
            children: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }
}
