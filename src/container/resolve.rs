//! On-disk path resolution
//!
//! Classifies a root-relative treepath against the persisted hierarchy. The
//! three-way outcome is the single source of truth every merge operation
//! consults before deciding whether to create, append, or reject.

use crate::container::{ContainerFile, Group};
use crate::error::ContainerError;
use crate::tree::path;
use tracing::trace;

/// Outcome of resolving a treepath against an on-disk group hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Every segment matched. `parent` is the group one step above the match;
    /// it is `None` when the path was empty and the match is the base group
    /// itself.
    Exact {
        group: Group,
        parent: Option<Group>,
    },
    /// All segments but the last matched; the held group is the existing
    /// parent the missing leaf would be created under.
    OneBeyond(Group),
    /// A gap before the final segment, or a segment naming a dataset rather
    /// than a group.
    Invalid,
}

/// Walk `treepath` one segment at a time starting from `root_group`.
pub fn resolve(
    file: &ContainerFile,
    root_group: Group,
    treepath: &str,
) -> Result<Resolution, ContainerError> {
    let segments = path::split_treepath(treepath);
    let mut group = root_group;
    let mut parent = None;
    for (i, segment) in segments.iter().enumerate() {
        match file.child(group, segment)? {
            Some(child) => {
                parent = Some(group);
                group = child;
            }
            None => {
                // a dataset of this name exists but is not a structural group
                if file.has_dataset(group, segment)? {
                    trace!(segment, "Treepath segment names a dataset");
                    return Ok(Resolution::Invalid);
                }
                if i == segments.len() - 1 {
                    return Ok(Resolution::OneBeyond(group));
                }
                return Ok(Resolution::Invalid);
            }
        }
    }
    Ok(Resolution::Exact { group, parent })
}
