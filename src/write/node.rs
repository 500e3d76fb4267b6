//! Single-node and branch writers
//!
//! `write_node` serializes exactly one runtime node into a newly created
//! group; `overwrite_node` replaces one node's own payload in place while
//! preserving persisted descendants through structural links. The
//! rename -> recreate -> relink -> unlink ordering in `overwrite_node` is the
//! crash-safety mechanism: at any interruption point the parent holds either
//! the old group or the new group with all prior children, never a torn node.

use crate::container::{ContainerFile, Group, METADATA_BUNDLE_GROUP, OVERWRITE_TMP_PREFIX};
use crate::error::WriteError;
use crate::metadata::Metadata;
use crate::tree::{NodeId, Tree};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Serialize one runtime node into a fresh child group of `parent`.
///
/// Callers must have established that no child of this name exists; a
/// conflicting name fails with `NodeConflict` before anything is written.
pub(crate) fn write_node(
    file: &ContainerFile,
    parent: Group,
    tree: &Tree,
    node: NodeId,
) -> Result<Group, WriteError> {
    let name = tree.name(node);
    if file.has_child(parent, name)? {
        return Err(WriteError::NodeConflict(name.to_string()));
    }
    let group = file.create_group(parent, name)?;
    file.set_kind(group, tree.payload(node).kind())?;
    tree.payload(node).serialize(file, group)?;
    write_metadata_bundles(file, group, tree.metadata(node))?;
    trace!(name, "Wrote node group");
    Ok(group)
}

/// Persist a node's metadata bundles under the reserved bundle container.
pub(crate) fn write_metadata_bundles(
    file: &ContainerFile,
    group: Group,
    bundles: &BTreeMap<String, Metadata>,
) -> Result<(), WriteError> {
    if bundles.is_empty() {
        return Ok(());
    }
    let container = file.create_group(group, METADATA_BUNDLE_GROUP)?;
    for bundle in bundles.values() {
        bundle.to_group(file, container)?;
    }
    Ok(())
}

/// Recursively serialize the subtree under `node` into `parent`.
///
/// Only valid under a freshly created parent group; there is nothing on disk
/// to reconcile against.
pub(crate) fn write_branch(
    file: &ContainerFile,
    parent: Group,
    tree: &Tree,
    node: NodeId,
) -> Result<(), WriteError> {
    for (_, child) in tree.children(node) {
        let group = write_node(file, parent, tree, child)?;
        write_branch(file, group, tree, child)?;
    }
    Ok(())
}

/// Replace one node's own payload while preserving persisted descendants.
///
/// (1) rename the existing group to a reserved temporary name, (2) write the
/// node fresh, (3) link every tagged child of the renamed group into the
/// fresh one, (4) unlink the temporary name. The unlinked record's storage is
/// reclaimed only by an explicit compaction.
pub(crate) fn overwrite_node(
    file: &ContainerFile,
    parent: Group,
    existing: Group,
    tree: &Tree,
    node: NodeId,
) -> Result<Group, WriteError> {
    let name = tree.name(node).to_string();
    let tmp = format!("{}{}", OVERWRITE_TMP_PREFIX, name);
    file.rename_child(parent, &name, &tmp)?;
    let fresh = write_node(file, parent, tree, node)?;
    for (child_name, child_group, _) in file.tagged_children(existing)? {
        file.link_child(fresh, &child_name, child_group)?;
    }
    file.unlink_child(parent, &tmp)?;
    debug!(name, "Replaced node group");
    Ok(fresh)
}
