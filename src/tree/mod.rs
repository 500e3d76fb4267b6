//! Runtime data tree
//!
//! An arena of named, typed nodes addressed by [`NodeId`] handles. Nodes carry
//! a non-owning back-pointer to their root, set when a node is attached to a
//! rooted tree and cleared on detach, so rootedness is always derivable
//! without reference cycles.

pub mod node;
pub mod path;

pub use node::NodeId;

use crate::error::TreeError;
use crate::metadata::Metadata;
use crate::payload::Payload;
use node::NodeEntry;
use std::collections::BTreeMap;

/// Arena holding every node of one or more runtime trees.
///
/// A `Tree` may hold several independent roots plus any number of rootless
/// nodes under construction; membership is tracked per node through its root
/// back-pointer, not by the arena itself.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Option<NodeEntry>>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: NodeId) -> &NodeEntry {
        match self.nodes.get(id.0).and_then(|slot| slot.as_ref()) {
            Some(entry) => entry,
            None => panic!("stale NodeId {:?}", id),
        }
    }

    fn entry_mut(&mut self, id: NodeId) -> &mut NodeEntry {
        match self.nodes.get_mut(id.0).and_then(|slot| slot.as_mut()) {
            Some(entry) => entry,
            None => panic!("stale NodeId {:?}", id),
        }
    }

    fn push(&mut self, entry: NodeEntry) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(entry));
        id
    }

    /// Create a new root node. Its root back-pointer refers to itself.
    pub fn add_root(&mut self, name: &str) -> NodeId {
        let id = self.push(NodeEntry::new(path::normalize_name(name), Payload::Root));
        self.entry_mut(id).root = Some(id);
        id
    }

    /// Create a rootless node with the given payload.
    pub fn add_node(&mut self, name: &str, payload: Payload) -> NodeId {
        self.push(NodeEntry::new(path::normalize_name(name), payload))
    }

    /// Attach `child` under `parent`.
    ///
    /// The child must be parentless and rootless; its name must not collide
    /// with an existing sibling. If the parent belongs to a rooted tree, the
    /// root back-pointer is propagated through the child's entire subtree.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let child_entry = self.entry(child);
        if child_entry.parent.is_some() || child_entry.root.is_some() {
            return Err(TreeError::AlreadyRooted(child_entry.name.clone()));
        }
        let name = child_entry.name.clone();
        if self.entry(parent).children.contains_key(&name) {
            return Err(TreeError::NameCollision(name));
        }
        self.entry_mut(parent).children.insert(name, child);
        self.entry_mut(child).parent = Some(parent);
        if let Some(root) = self.entry(parent).root {
            self.propagate_root(child, Some(root));
        }
        Ok(())
    }

    /// Detach a node from its parent, clearing the parent link and the root
    /// back-pointers of the node and its entire subtree.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.entry(id).parent {
            let name = self.entry(id).name.clone();
            self.entry_mut(parent).children.remove(&name);
        }
        self.entry_mut(id).parent = None;
        self.propagate_root(id, None);
    }

    fn propagate_root(&mut self, id: NodeId, root: Option<NodeId>) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            self.entry_mut(cur).root = root;
            stack.extend(self.entry(cur).children.values().copied());
        }
    }

    /// Remove a detached, childless node from the arena, invalidating its
    /// handle.
    pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        let entry = self.entry(id);
        if entry.parent.is_some() {
            return Err(TreeError::StillAttached(entry.name.clone()));
        }
        if !entry.children.is_empty() {
            return Err(TreeError::HasChildren(entry.name.clone()));
        }
        self.nodes[id.0] = None;
        Ok(())
    }

    /// Remove a detached node and its entire subtree from the arena.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<(), TreeError> {
        let entry = self.entry(id);
        if entry.parent.is_some() {
            return Err(TreeError::StillAttached(entry.name.clone()));
        }
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            stack.extend(self.entry(cur).children.values().copied());
            self.nodes[cur.0] = None;
        }
        Ok(())
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.entry(id).name
    }

    /// Rename a node, keeping its parent's child map consistent.
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> Result<(), TreeError> {
        let new_name = path::normalize_name(new_name);
        if let Some(parent) = self.entry(id).parent {
            if self.entry(parent).children.contains_key(&new_name) {
                return Err(TreeError::NameCollision(new_name));
            }
            let old = self.entry(id).name.clone();
            let parent_entry = self.entry_mut(parent);
            parent_entry.children.remove(&old);
            parent_entry.children.insert(new_name.clone(), id);
        }
        self.entry_mut(id).name = new_name;
        Ok(())
    }

    pub fn payload(&self, id: NodeId) -> &Payload {
        &self.entry(id).payload
    }

    pub fn payload_mut(&mut self, id: NodeId) -> &mut Payload {
        &mut self.entry_mut(id).payload
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).parent
    }

    /// The root this node currently belongs to, or `None` if rootless.
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).root
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.entry(id).root == Some(id)
    }

    pub fn is_rootless(&self, id: NodeId) -> bool {
        self.entry(id).root.is_none()
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.entry(id)
            .children
            .iter()
            .map(|(name, child)| (name.as_str(), *child))
    }

    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.entry(id)
            .children
            .get(&path::normalize_name(name))
            .copied()
    }

    pub fn metadata(&self, id: NodeId) -> &BTreeMap<String, Metadata> {
        &self.entry(id).metadata
    }

    /// Attach a metadata bundle, keyed by its own name. Replaces any bundle
    /// already stored under that name.
    pub fn put_metadata(&mut self, id: NodeId, bundle: Metadata) {
        self.entry_mut(id)
            .metadata
            .insert(bundle.name.clone(), bundle);
    }

    /// Root-relative slash-delimited path, derived by walking parent links.
    ///
    /// The root's own name is excluded; the root's treepath is the empty
    /// string. For a rootless chain the path runs up to the topmost ancestor.
    pub fn treepath(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut cur = id;
        while !self.is_root(cur) {
            segments.push(self.entry(cur).name.clone());
            match self.entry(cur).parent {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        segments.reverse();
        path::join_segments(&segments)
    }

    /// Walk a relative slash-delimited path downward from `base`.
    pub fn node_at(&self, base: NodeId, relpath: &str) -> Option<NodeId> {
        let mut cur = base;
        for segment in path::split_treepath(relpath) {
            cur = *self.entry(cur).children.get(&segment)?;
        }
        Some(cur)
    }
}
