//! Read-side counterpart
//!
//! Reconstructs runtime subtrees from a container: resolves a target path
//! through the same resolver the write engine uses, then rebuilds nodes from
//! their tagged groups via the payload deserialize contract.

use crate::container::{resolve, ContainerFile, Group, Resolution, METADATA_BUNDLE_GROUP};
use crate::error::{ContainerError, WriteError};
use crate::metadata::Metadata;
use crate::payload::Payload;
use crate::tree::{path, NodeId, Tree};
use crate::types::NodeKind;
use std::path::Path;
use tracing::debug;

/// A reconstructed runtime tree plus the handle of the requested node.
pub struct ReadResult {
    pub tree: Tree,
    pub node: NodeId,
}

/// True when the path holds a container with a recognized format header.
pub fn is_grove_file<P: AsRef<Path>>(dest: P) -> bool {
    match ContainerFile::open(dest) {
        Ok(file) => file.has_header().unwrap_or(false),
        Err(_) => false,
    }
}

/// Names of the top-level root groups in the container.
pub fn root_names<P: AsRef<Path>>(dest: P) -> Result<Vec<String>, WriteError> {
    let file = open_checked(dest.as_ref())?;
    roots_in(&file)
}

fn roots_in(file: &ContainerFile) -> Result<Vec<String>, WriteError> {
    Ok(file
        .tagged_children(file.top())?
        .into_iter()
        .filter(|(_, _, kind)| *kind == NodeKind::Root)
        .map(|(name, _, _)| name)
        .collect())
}

/// Reconstruct the subtree at `target` (or the sole root, when `None`).
///
/// The target's leading segment names a root; the rest is a treepath inside
/// it. Every group along the path is rebuilt so the returned node's treepath
/// matches its on-disk position; the subtree below the target is rebuilt in
/// full.
pub fn read<P: AsRef<Path>>(dest: P, target: Option<&str>) -> Result<ReadResult, WriteError> {
    let dest = dest.as_ref();
    let file = open_checked(dest)?;
    let roots = roots_in(&file)?;

    let (root_name, rel) = match target {
        Some(target) => {
            let segments = path::split_treepath(target);
            match segments.split_first() {
                Some((root, rest)) => (root.clone(), rest.join("/")),
                None => {
                    return Err(WriteError::Path {
                        root: String::new(),
                        path: target.to_string(),
                    })
                }
            }
        }
        None => match roots.as_slice() {
            [only] => (only.clone(), String::new()),
            _ => {
                return Err(WriteError::Path {
                    root: roots.join(", "),
                    path: "a target path is required when the file holds multiple roots"
                        .to_string(),
                })
            }
        },
    };

    let rootgroup = file
        .tagged_children(file.top())?
        .into_iter()
        .find(|(name, _, kind)| *kind == NodeKind::Root && *name == root_name)
        .map(|(_, group, _)| group)
        .ok_or_else(|| WriteError::Path {
            root: root_name.clone(),
            path: rel.clone(),
        })?;

    let mut tree = Tree::new();
    let root = tree.add_root(&root_name);
    load_metadata(&file, rootgroup, &mut tree, root)?;

    // rebuild each group along the path, then the full subtree at the end
    let segments = path::split_treepath(&rel);
    let mut group = rootgroup;
    let mut node = root;
    for (i, segment) in segments.iter().enumerate() {
        let child = match resolve(&file, group, segment)? {
            Resolution::Exact { group, .. } => group,
            _ => {
                return Err(WriteError::Path {
                    root: root_name,
                    path: rel,
                })
            }
        };
        let last = i == segments.len() - 1;
        node = build_node(&file, child, segment, &mut tree, node, last)?;
        group = child;
    }
    if segments.is_empty() {
        build_children(&file, rootgroup, &mut tree, root)?;
    }
    debug!(root = %root_name, path = %rel, "Reconstructed subtree");
    Ok(ReadResult { tree, node })
}

fn open_checked(dest: &Path) -> Result<ContainerFile, WriteError> {
    let file = match ContainerFile::open(dest) {
        Ok(file) => file,
        Err(ContainerError::Backend(_)) => return Err(WriteError::NotGrove(dest.to_path_buf())),
        Err(err) => return Err(err.into()),
    };
    if !file.has_header()? {
        return Err(WriteError::NotGrove(dest.to_path_buf()));
    }
    Ok(file)
}

/// Rebuild one node from its group; recurse into children when `deep`.
fn build_node(
    file: &ContainerFile,
    group: Group,
    name: &str,
    tree: &mut Tree,
    parent: NodeId,
    deep: bool,
) -> Result<NodeId, WriteError> {
    let kind = file.group_kind(group)?.ok_or_else(|| {
        ContainerError::Corrupt(format!("group '{}' carries no node-kind marker", name))
    })?;
    let payload = Payload::deserialize(file, group, kind)?;
    let node = tree.add_node(name, payload);
    tree.attach(parent, node)?;
    load_metadata(file, group, tree, node)?;
    if deep {
        build_children(file, group, tree, node)?;
    }
    Ok(node)
}

fn build_children(
    file: &ContainerFile,
    group: Group,
    tree: &mut Tree,
    parent: NodeId,
) -> Result<(), WriteError> {
    for (name, child, kind) in file.tagged_children(group)? {
        if kind == NodeKind::Metadata {
            continue;
        }
        build_node(file, child, &name, tree, parent, true)?;
    }
    Ok(())
}

fn load_metadata(
    file: &ContainerFile,
    group: Group,
    tree: &mut Tree,
    node: NodeId,
) -> Result<(), WriteError> {
    if let Some(bundle_group) = file.child(group, METADATA_BUNDLE_GROUP)? {
        for (name, child, kind) in file.tagged_children(bundle_group)? {
            if kind == NodeKind::Metadata {
                tree.put_metadata(node, Metadata::from_group(file, child, &name)?);
            }
        }
    }
    Ok(())
}
