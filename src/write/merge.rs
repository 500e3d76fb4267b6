//! Diff-merge write engine
//!
//! Mode-aware top-level orchestration over the writers: decides, node by
//! node, whether to create, skip, or atomically replace persisted groups.
//! Only structural presence is compared (a node's name and tree position),
//! never field-level content.

use crate::config::GroveConfig;
use crate::container::{resolve, ContainerFile, Group, Resolution, METADATA_BUNDLE_GROUP};
use crate::error::{ContainerError, WriteError};
use crate::tree::{path, NodeId, Tree};
use crate::types::{NodeKind, TreeScope, WriteMode};
use crate::write::node::{overwrite_node, write_branch, write_node};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Write `data` (and per `scope`, its subtree) to the container at `dest`.
///
/// A rootless `data` is wrapped in a synthetic root sharing its name for the
/// duration of the call and detached again on every exit path, so the call is
/// observably non-mutating on a rootless input's rootedness.
#[instrument(skip(tree, data, target), fields(dest = %dest.display(), mode = %mode))]
pub(crate) fn save_node(
    dest: &Path,
    tree: &mut Tree,
    data: NodeId,
    mode: WriteMode,
    scope: TreeScope,
    target: Option<&str>,
) -> Result<(), WriteError> {
    // an explicit target path implies append unless appendover was requested
    let mode = match (target, mode) {
        (Some(_), m) if m != WriteMode::AppendOver => WriteMode::Append,
        (_, m) => m,
    };
    if mode == WriteMode::Write && dest.exists() {
        return Err(WriteError::Exists(dest.to_path_buf()));
    }

    let synthetic = match tree.root_of(data) {
        Some(_) => None,
        None => {
            let name = tree.name(data).to_string();
            let root = tree.add_root(&name);
            if let Err(err) = tree.attach(root, data) {
                let _ = tree.remove(root);
                return Err(err.into());
            }
            Some(root)
        }
    };
    let root = match tree.root_of(data) {
        Some(root) => root,
        None => return Err(WriteError::PathMismatch("node lost its root".to_string())),
    };

    let result = save_rooted(dest, tree, root, data, mode, scope, target);

    if let Some(root) = synthetic {
        tree.detach(data);
        // the synthetic root is parentless and childless after the detach
        let _ = tree.remove(root);
    }
    result
}

fn save_rooted(
    dest: &Path,
    tree: &Tree,
    root: NodeId,
    data: NodeId,
    mode: WriteMode,
    scope: TreeScope,
    target: Option<&str>,
) -> Result<(), WriteError> {
    let mode = if mode == WriteMode::Overwrite {
        remove_existing(dest)?;
        WriteMode::Write
    } else {
        mode
    };

    // a brand-new file: write header, root, and the requested scope
    if mode == WriteMode::Write || !dest.exists() {
        info!(root = tree.name(root), "Writing new container");
        let config = GroveConfig::load().unwrap_or_else(|err| {
            warn!(%err, "Falling back to default configuration");
            GroveConfig::default()
        });
        let file = ContainerFile::create(dest)?;
        file.write_header(&config.authoring.program, &config.authoring.user)?;
        write_from_root(&file, file.top(), tree, root, data, scope)?;
        file.flush()?;
        return Ok(());
    }

    // appending into an existing file
    let file = match ContainerFile::open(dest) {
        Ok(file) => file,
        Err(ContainerError::Backend(_)) => return Err(WriteError::NotGrove(dest.to_path_buf())),
        Err(err) => return Err(err.into()),
    };
    if !file.has_header()? {
        return Err(WriteError::NotGrove(dest.to_path_buf()));
    }
    let top = file.top();
    let appendover = mode == WriteMode::AppendOver;
    let existing_root = find_root_group(&file, tree.name(root))?;

    match (existing_root, target) {
        // the root is new to this file: plain nested write
        (None, None) => {
            info!(root = tree.name(root), "Adding new root to container");
            write_from_root(&file, top, tree, root, data, scope)?;
        }
        (None, Some(target)) => append_at_target(&file, tree, data, scope, target)?,
        (Some(rootgroup), None) => {
            debug!(root = tree.name(root), "Reconciling against existing root");
            diffmerge_a(&file, rootgroup, tree, root, data, scope, appendover)?;
        }
        (Some(rootgroup), Some(target)) => {
            debug!(root = tree.name(root), path = target, "Reconciling at explicit target");
            diffmerge_b(
                &file, top, rootgroup, tree, root, data, scope, appendover, target,
            )?;
        }
    }
    file.flush()?;
    Ok(())
}

fn remove_existing(dest: &Path) -> Result<(), WriteError> {
    if dest.is_dir() {
        fs::remove_dir_all(dest).map_err(ContainerError::from)?;
    } else if dest.exists() {
        fs::remove_file(dest).map_err(ContainerError::from)?;
    }
    Ok(())
}

/// Locate a top-level group tagged as a root with the given name.
fn find_root_group(file: &ContainerFile, name: &str) -> Result<Option<Group>, WriteError> {
    let wanted = path::normalize_name(name);
    for (child_name, group, kind) in file.tagged_children(file.top())? {
        if kind == NodeKind::Root && child_name == wanted {
            return Ok(Some(group));
        }
    }
    Ok(None)
}

/// Write the root group and the node/subtree per `scope` under `parent`.
///
/// Used both for brand-new files and for adding a not-yet-present root to an
/// existing file.
fn write_from_root(
    file: &ContainerFile,
    parent: Group,
    tree: &Tree,
    root: NodeId,
    data: NodeId,
    scope: TreeScope,
) -> Result<(), WriteError> {
    let rootgroup = write_node(file, parent, tree, root)?;
    if data == root {
        if scope != TreeScope::NodeOnly {
            write_branch(file, rootgroup, tree, root)?;
        }
        return Ok(());
    }
    match scope {
        TreeScope::Full => {
            let group = write_node(file, rootgroup, tree, data)?;
            write_branch(file, group, tree, data)?;
        }
        TreeScope::NodeOnly => {
            write_node(file, rootgroup, tree, data)?;
        }
        TreeScope::SubtreeOnly => {
            write_branch(file, rootgroup, tree, data)?;
        }
    }
    Ok(())
}

fn split_target(target: &str) -> (String, String) {
    let segments = path::split_treepath(target);
    match segments.split_first() {
        Some((root, rest)) => (root.clone(), rest.join("/")),
        None => (String::new(), String::new()),
    }
}

/// Append into an existing file whose top does not yet hold this root: the
/// data lands under an explicitly targeted node of some other root.
fn append_at_target(
    file: &ContainerFile,
    tree: &Tree,
    data: NodeId,
    scope: TreeScope,
    target: &str,
) -> Result<(), WriteError> {
    let (root_name, rel) = split_target(target);
    let rootgroup = find_root_group(file, &root_name)?.ok_or_else(|| WriteError::Path {
        root: root_name.clone(),
        path: target.to_string(),
    })?;
    let target_grp = match resolve(file, rootgroup, &rel)? {
        Resolution::Exact { group, .. } => group,
        _ => {
            return Err(WriteError::Path {
                root: root_name,
                path: target.to_string(),
            })
        }
    };

    if tree.is_root(data) {
        if scope == TreeScope::NodeOnly {
            return Err(WriteError::Mode(
                "appending a root to an existing tree requires its subtree".to_string(),
            ));
        }
        return write_branch(file, target_grp, tree, data);
    }
    match scope {
        TreeScope::Full => {
            let group = write_node(file, target_grp, tree, data)?;
            write_branch(file, group, tree, data)?;
        }
        TreeScope::NodeOnly => {
            write_node(file, target_grp, tree, data)?;
        }
        TreeScope::SubtreeOnly => {
            write_branch(file, target_grp, tree, data)?;
        }
    }
    Ok(())
}

/// Diffmerge A: the root already exists on disk and no explicit target was
/// given. Reconcile root metadata, then merge at `data`'s own treepath.
fn diffmerge_a(
    file: &ContainerFile,
    rootgroup: Group,
    tree: &Tree,
    root: NodeId,
    data: NodeId,
    scope: TreeScope,
    appendover: bool,
) -> Result<(), WriteError> {
    append_root_metadata(file, rootgroup, tree, root, appendover)?;

    if data == root {
        if scope != TreeScope::NodeOnly {
            append_branch(file, rootgroup, tree, data, appendover)?;
        }
        return Ok(());
    }

    let treepath = tree.treepath(data);
    match resolve(file, rootgroup, &treepath)? {
        Resolution::Invalid => Err(WriteError::Path {
            root: tree.name(root).to_string(),
            path: treepath,
        }),
        Resolution::Exact { group, parent } => {
            merge_at(file, group, parent, tree, data, scope, appendover)
        }
        Resolution::OneBeyond(parent_grp) => {
            match scope {
                TreeScope::Full => {
                    let group = write_node(file, parent_grp, tree, data)?;
                    write_branch(file, group, tree, data)?;
                }
                TreeScope::NodeOnly => {
                    write_node(file, parent_grp, tree, data)?;
                }
                TreeScope::SubtreeOnly => {
                    write_branch(file, parent_grp, tree, data)?;
                }
            }
            Ok(())
        }
    }
}

/// Diffmerge B: the root exists and an explicit target path was given.
/// Reconcile root metadata, then merge anchored at the resolved target,
/// aligning the runtime source node with the on-disk target first.
#[allow(clippy::too_many_arguments)]
fn diffmerge_b(
    file: &ContainerFile,
    top: Group,
    rootgroup: Group,
    tree: &Tree,
    root: NodeId,
    data: NodeId,
    scope: TreeScope,
    appendover: bool,
    target: &str,
) -> Result<(), WriteError> {
    let (target_root, target_rel) = split_target(target);
    if target_root != tree.name(root) {
        return Err(WriteError::Path {
            root: target_root,
            path: target.to_string(),
        });
    }
    let (target_grp, target_parent) = match resolve(file, rootgroup, &target_rel)? {
        Resolution::Exact { group, parent } => (group, parent.or(Some(top))),
        _ => {
            return Err(WriteError::Path {
                root: target_root,
                path: target.to_string(),
            })
        }
    };

    append_root_metadata(file, rootgroup, tree, root, appendover)?;

    if data == root {
        // move down the runtime tree to the node matching the target
        let node = tree.node_at(root, &target_rel).ok_or_else(|| {
            WriteError::PathMismatch(format!(
                "'{}' exists on disk but has no counterpart in the runtime tree",
                target
            ))
        })?;
        return merge_at(file, target_grp, target_parent, tree, node, scope, appendover);
    }

    let source_path = tree.treepath(data);
    let source_segs = path::split_treepath(&source_path);
    let target_segs = path::split_treepath(&target_rel);

    match resolve(file, rootgroup, &source_path)? {
        Resolution::Invalid => Err(WriteError::Path {
            root: tree.name(root).to_string(),
            path: source_path,
        }),
        Resolution::OneBeyond(parent_grp) => {
            // the source node is not on disk; it must sit exactly one step
            // past the targeted node
            if parent_grp != target_grp {
                return Err(WriteError::PathMismatch(format!(
                    "'{}' is not on disk and does not extend the target '{}'",
                    source_path, target
                )));
            }
            match scope {
                TreeScope::Full => {
                    let group = write_node(file, target_grp, tree, data)?;
                    write_branch(file, group, tree, data)?;
                }
                TreeScope::NodeOnly => {
                    write_node(file, target_grp, tree, data)?;
                }
                TreeScope::SubtreeOnly => {
                    write_branch(file, target_grp, tree, data)?;
                }
            }
            Ok(())
        }
        Resolution::Exact {
            group: source_grp,
            parent: source_parent,
        } => {
            if source_grp == target_grp {
                merge_at(file, target_grp, target_parent, tree, data, scope, appendover)
            } else if source_parent == Some(target_grp) {
                // the source sits one step below the target: merge at the source
                merge_at(file, source_grp, source_parent, tree, data, scope, appendover)
            } else if target_segs.len() > source_segs.len()
                && target_segs[..source_segs.len()] == source_segs[..]
            {
                // the target is a strict descendant of the source: walk the
                // runtime tree down the same relative path
                let rel = target_segs[source_segs.len()..].join("/");
                let node = tree.node_at(data, &rel).ok_or_else(|| {
                    WriteError::PathMismatch(format!(
                        "target '{}' exists on disk but has no counterpart under '{}' in the runtime tree",
                        target, source_path
                    ))
                })?;
                merge_at(file, target_grp, target_parent, tree, node, scope, appendover)
            } else {
                Err(WriteError::PathMismatch(format!(
                    "target '{}' is not downstream of source '{}'",
                    target, source_path
                )))
            }
        }
    }
}

/// Merge one aligned node: replace its payload under appendover (unless the
/// scope excludes the node itself), then reconcile its subtree (unless the
/// scope excludes it).
fn merge_at(
    file: &ContainerFile,
    group: Group,
    parent: Option<Group>,
    tree: &Tree,
    node: NodeId,
    scope: TreeScope,
    appendover: bool,
) -> Result<(), WriteError> {
    let mut anchor = group;
    if appendover && scope != TreeScope::SubtreeOnly {
        let parent = match parent {
            Some(parent) => parent,
            None => file.top(),
        };
        anchor = overwrite_node(file, parent, group, tree, node)?;
    }
    if scope != TreeScope::NodeOnly {
        append_branch(file, anchor, tree, node, appendover)?;
    }
    Ok(())
}

/// Reconcile the root's metadata bundles: absent names are added; present
/// names are replaced under appendover and left alone under append.
fn append_root_metadata(
    file: &ContainerFile,
    rootgroup: Group,
    tree: &Tree,
    root: NodeId,
    appendover: bool,
) -> Result<(), WriteError> {
    let bundles = tree.metadata(root);
    if bundles.is_empty() {
        return Ok(());
    }
    let md_group = match file.child(rootgroup, METADATA_BUNDLE_GROUP)? {
        Some(group) => group,
        None => file.create_group(rootgroup, METADATA_BUNDLE_GROUP)?,
    };
    let existing: Vec<String> = file
        .tagged_children(md_group)?
        .into_iter()
        .filter(|(_, _, kind)| *kind == NodeKind::Metadata)
        .map(|(name, _, _)| name)
        .collect();
    for (name, bundle) in bundles {
        if existing.contains(name) {
            if appendover {
                file.unlink_child(md_group, name)?;
                bundle.to_group(file, md_group)?;
                debug!(bundle = %name, "Replaced root metadata bundle");
            }
        } else {
            bundle.to_group(file, md_group)?;
        }
    }
    Ok(())
}

/// Recursive branch reconciliation: new descendants are written fresh;
/// conflicting descendants are replaced under appendover or recursed into
/// untouched under plain append.
fn append_branch(
    file: &ContainerFile,
    group: Group,
    tree: &Tree,
    node: NodeId,
    appendover: bool,
) -> Result<(), WriteError> {
    let existing: BTreeMap<String, Group> = file
        .tagged_children(group)?
        .into_iter()
        .map(|(name, group, _)| (name, group))
        .collect();
    for (name, child) in tree.children(node) {
        match existing.get(name) {
            None => {
                let fresh = write_node(file, group, tree, child)?;
                write_branch(file, fresh, tree, child)?;
            }
            Some(&present) => {
                let next = if appendover {
                    overwrite_node(file, group, present, tree, child)?
                } else {
                    present
                };
                append_branch(file, next, tree, child, appendover)?;
            }
        }
    }
    Ok(())
}
