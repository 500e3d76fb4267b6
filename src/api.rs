//! Public write surface
//!
//! Accepts a node handle or bare data (arrays, record lists, mappings, lists
//! of such), wraps bare data in a throwaway root for the duration of the
//! call, and hands off to the diff-merge engine. The caller's tree is
//! restored afterwards: wrapped user nodes are detached again and synthesized
//! wrapper nodes are removed.

use crate::container::{AttrValue, ContainerFile};
use crate::error::{ContainerError, WriteError};
use crate::metadata::Metadata;
use crate::payload::{ArrayData, Payload, RecordList};
use crate::tree::{NodeId, Tree};
use crate::types::{TreeScope, WriteMode};
use crate::write::merge::save_node;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Data accepted by [`save`].
pub enum SaveData {
    /// A node held in the tree, rooted or rootless.
    Node(NodeId),
    /// A bare array, wrapped in a throwaway root named "root".
    Array(ArrayData),
    /// A bare record list, wrapped likewise.
    Records(RecordList),
    /// A bare mapping, saved as a root-level metadata bundle.
    Dict(BTreeMap<String, AttrValue>),
    /// Several of the above stored in one root. A list containing a root
    /// node must contain only root nodes; those are saved as successive
    /// trees of the same file.
    List(Vec<SaveData>),
}

/// Options for [`save`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub mode: WriteMode,
    pub scope: TreeScope,
    /// Explicit target path (`root/some/node`) inside an existing file.
    pub target: Option<String>,
}

/// Save data to the container at `dest`.
pub fn save<P: AsRef<Path>>(
    dest: P,
    tree: &mut Tree,
    data: SaveData,
    options: &SaveOptions,
) -> Result<(), WriteError> {
    let dest = dest.as_ref();
    match data {
        SaveData::Node(node) => save_node(
            dest,
            tree,
            node,
            options.mode,
            options.scope,
            options.target.as_deref(),
        ),
        SaveData::List(items) => {
            let holds_root = items
                .iter()
                .any(|item| matches!(item, SaveData::Node(id) if tree.is_root(*id)));
            if holds_root {
                save_root_list(dest, tree, items, options)
            } else {
                save_wrapped(dest, tree, SaveData::List(items), options)
            }
        }
        bare => save_wrapped(dest, tree, bare, options),
    }
}

/// Save a list of roots as successive trees: the first with the requested
/// mode, the rest appended.
fn save_root_list(
    dest: &Path,
    tree: &mut Tree,
    items: Vec<SaveData>,
    options: &SaveOptions,
) -> Result<(), WriteError> {
    let mut roots = Vec::with_capacity(items.len());
    for item in items {
        match item {
            SaveData::Node(id) if tree.is_root(id) => roots.push(id),
            _ => {
                return Err(WriteError::Mode(
                    "a list containing a root must contain only roots".to_string(),
                ))
            }
        }
    }
    let mut mode = options.mode;
    for root in roots {
        save_node(
            dest,
            tree,
            root,
            mode,
            options.scope,
            options.target.as_deref(),
        )?;
        mode = match mode {
            WriteMode::Write => WriteMode::Append,
            WriteMode::Overwrite => WriteMode::AppendOver,
            other => other,
        };
    }
    Ok(())
}

/// Wrap bare data in a throwaway root, save it, then restore the tree.
fn save_wrapped(
    dest: &Path,
    tree: &mut Tree,
    data: SaveData,
    options: &SaveOptions,
) -> Result<(), WriteError> {
    let root = tree.add_root("root");
    let mut attached = Vec::new();
    let result = populate_wrapper(tree, root, data, &mut attached).and_then(|()| {
        save_node(
            dest,
            tree,
            root,
            options.mode,
            options.scope,
            options.target.as_deref(),
        )
    });
    // user nodes go back to being rootless; synthesized nodes are dropped
    for node in attached {
        tree.detach(node);
    }
    let _ = tree.remove_subtree(root);
    result
}

fn populate_wrapper(
    tree: &mut Tree,
    root: NodeId,
    data: SaveData,
    attached: &mut Vec<NodeId>,
) -> Result<(), WriteError> {
    match data {
        SaveData::Node(node) => {
            tree.attach(root, node)?;
            attached.push(node);
        }
        SaveData::Array(array) => {
            let node = tree.add_node("array", Payload::Array(array));
            tree.attach(root, node)?;
        }
        SaveData::Records(records) => {
            let node = tree.add_node("records", Payload::Records(records));
            tree.attach(root, node)?;
        }
        SaveData::Dict(items) => {
            tree.put_metadata(root, Metadata::from_items("dictionary", items));
        }
        SaveData::List(items) => {
            let (mut arrays, mut records, mut dicts) = (0usize, 0usize, 0usize);
            for item in items {
                match item {
                    SaveData::Node(node) => {
                        tree.attach(root, node)?;
                        attached.push(node);
                    }
                    SaveData::Array(array) => {
                        let node =
                            tree.add_node(&format!("array_{}", arrays), Payload::Array(array));
                        tree.attach(root, node)?;
                        arrays += 1;
                    }
                    SaveData::Records(list) => {
                        let node =
                            tree.add_node(&format!("records_{}", records), Payload::Records(list));
                        tree.attach(root, node)?;
                        records += 1;
                    }
                    SaveData::Dict(items) => {
                        tree.put_metadata(
                            root,
                            Metadata::from_items(&format!("dictionary_{}", dicts), items),
                        );
                        dicts += 1;
                    }
                    SaveData::List(_) => {
                        return Err(WriteError::Mode("nested lists cannot be saved".to_string()))
                    }
                }
            }
        }
    }
    Ok(())
}

/// Rewrite the container at `dest`, reclaiming storage left unreachable by
/// unlinks and replacements. Normal writes never shrink the file; this is
/// the explicit, user-triggered reclamation step.
pub fn compact<P: AsRef<Path>>(dest: P) -> Result<(), WriteError> {
    let dest = dest.as_ref();
    let file = match ContainerFile::open(dest) {
        Ok(file) => file,
        Err(ContainerError::Backend(_)) => return Err(WriteError::NotGrove(dest.to_path_buf())),
        Err(err) => return Err(err.into()),
    };
    if !file.has_header()? {
        return Err(WriteError::NotGrove(dest.to_path_buf()));
    }

    let staging = staging_path(dest);
    remove_path(&staging)?;
    file.compact_into(&staging)?;
    drop(file);

    remove_path(dest)?;
    fs::rename(&staging, dest).map_err(ContainerError::from)?;
    info!(path = %dest.display(), "Compacted container");
    Ok(())
}

fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".compact");
    dest.with_file_name(name)
}

fn remove_path(path: &Path) -> Result<(), WriteError> {
    if path.is_dir() {
        fs::remove_dir_all(path).map_err(ContainerError::from)?;
    } else if path.exists() {
        fs::remove_file(path).map_err(ContainerError::from)?;
    }
    Ok(())
}
