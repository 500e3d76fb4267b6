//! Sled-backed container store
//!
//! One sled database per container file. Group records are keyed by id;
//! the header and the top-group pointer live under reserved metadata keys.
//! Unlinking a child removes only the edge; the record stays on disk until
//! an explicit [`ContainerFile::compact_into`] pass, mirroring a container
//! format that does not reclaim freed space in place.

use crate::container::{AttrValue, Dataset, FileHeader, KIND_ATTR};
use crate::error::ContainerError;
use crate::tree::path;
use crate::types::{GroupId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

const HEADER_KEY: &[u8] = b"meta:header";
const TOP_KEY: &[u8] = b"meta:top";
const GROUP_KEY_PREFIX: &[u8] = b"grp:";

/// Handle to an on-disk group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Group(pub(crate) GroupId);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GroupRecord {
    attrs: BTreeMap<String, AttrValue>,
    children: BTreeMap<String, GroupId>,
    datasets: BTreeMap<String, Dataset>,
}

/// An open container file.
#[derive(Debug)]
pub struct ContainerFile {
    db: sled::Db,
    path: PathBuf,
    top: Group,
}

impl ContainerFile {
    /// Create a new container at `path`, failing if the path already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, ContainerError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(ContainerError::AlreadyExists(path));
        }
        let db = sled::open(&path)?;
        let top = Group(db.generate_id()?);
        let file = Self { db, path, top };
        file.store(top, &GroupRecord::default())?;
        file.db.insert(TOP_KEY, top.0.to_be_bytes().to_vec())?;
        debug!(path = %file.path.display(), "Created container");
        Ok(file)
    }

    /// Open an existing container, failing if the path is missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ContainerError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ContainerError::NoContainer(path));
        }
        let db = sled::open(&path)?;
        let top_bytes = db
            .get(TOP_KEY)?
            .ok_or_else(|| ContainerError::Corrupt("missing top-group pointer".to_string()))?;
        let raw: [u8; 8] = top_bytes
            .as_ref()
            .try_into()
            .map_err(|_| ContainerError::Corrupt("malformed top-group pointer".to_string()))?;
        let top = Group(u64::from_be_bytes(raw));
        Ok(Self { db, path, top })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file's top-level group.
    pub fn top(&self) -> Group {
        self.top
    }

    fn group_key(id: GroupId) -> Vec<u8> {
        let mut key = Vec::with_capacity(GROUP_KEY_PREFIX.len() + 8);
        key.extend_from_slice(GROUP_KEY_PREFIX);
        key.extend_from_slice(&id.to_be_bytes());
        key
    }

    fn load(&self, group: Group) -> Result<GroupRecord, ContainerError> {
        let bytes = self.db.get(Self::group_key(group.0))?.ok_or_else(|| {
            ContainerError::Corrupt(format!("missing record for group {}", group.0))
        })?;
        Ok(bincode::deserialize(&bytes)?)
    }

    fn store(&self, group: Group, record: &GroupRecord) -> Result<(), ContainerError> {
        let bytes = bincode::serialize(record)?;
        self.db.insert(Self::group_key(group.0), bytes)?;
        Ok(())
    }

    fn alloc(&self) -> Result<Group, ContainerError> {
        let group = Group(self.db.generate_id()?);
        self.store(group, &GroupRecord::default())?;
        Ok(group)
    }

    // --- header ---

    /// Stamp the format header. Called exactly once, right after creating a
    /// brand-new file.
    pub fn write_header(&self, program: &str, user: &str) -> Result<FileHeader, ContainerError> {
        if self.db.contains_key(HEADER_KEY)? {
            return Err(ContainerError::Collision("file header".to_string()));
        }
        let header = FileHeader::new(program, user);
        self.put_header(&header)?;
        Ok(header)
    }

    pub(crate) fn put_header(&self, header: &FileHeader) -> Result<(), ContainerError> {
        let bytes = bincode::serialize(header)?;
        self.db.insert(HEADER_KEY, bytes)?;
        Ok(())
    }

    pub fn header(&self) -> Result<Option<FileHeader>, ContainerError> {
        match self.db.get(HEADER_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// True when the file carries a recognized format header.
    pub fn has_header(&self) -> Result<bool, ContainerError> {
        Ok(self
            .header()?
            .map(|h| h.is_current_format())
            .unwrap_or(false))
    }

    // --- group structure ---

    /// Create a fresh child group under `parent`.
    pub fn create_group(&self, parent: Group, name: &str) -> Result<Group, ContainerError> {
        let name = path::normalize_name(name);
        let mut record = self.load(parent)?;
        if record.children.contains_key(&name) || record.datasets.contains_key(&name) {
            return Err(ContainerError::Collision(name));
        }
        let child = self.alloc()?;
        record.children.insert(name, child.0);
        self.store(parent, &record)?;
        Ok(child)
    }

    pub fn has_child(&self, parent: Group, name: &str) -> Result<bool, ContainerError> {
        let record = self.load(parent)?;
        Ok(record.children.contains_key(&path::normalize_name(name)))
    }

    pub fn child(&self, parent: Group, name: &str) -> Result<Option<Group>, ContainerError> {
        let record = self.load(parent)?;
        Ok(record
            .children
            .get(&path::normalize_name(name))
            .map(|id| Group(*id)))
    }

    /// All child groups, tagged or not, in name order.
    pub fn children(&self, parent: Group) -> Result<Vec<(String, Group)>, ContainerError> {
        let record = self.load(parent)?;
        Ok(record
            .children
            .iter()
            .map(|(name, id)| (name.clone(), Group(*id)))
            .collect())
    }

    /// Child groups whose node-kind marker is set to a recognized kind.
    pub fn tagged_children(
        &self,
        parent: Group,
    ) -> Result<Vec<(String, Group, NodeKind)>, ContainerError> {
        let record = self.load(parent)?;
        let mut tagged = Vec::new();
        for (name, id) in &record.children {
            if let Some(kind) = self.group_kind(Group(*id))? {
                tagged.push((name.clone(), Group(*id), kind));
            }
        }
        Ok(tagged)
    }

    /// Rename the edge from `parent` to one of its children.
    pub fn rename_child(
        &self,
        parent: Group,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), ContainerError> {
        let old_name = path::normalize_name(old_name);
        let new_name = path::normalize_name(new_name);
        let mut record = self.load(parent)?;
        if record.children.contains_key(&new_name) || record.datasets.contains_key(&new_name) {
            return Err(ContainerError::Collision(new_name));
        }
        let id = record
            .children
            .remove(&old_name)
            .ok_or(ContainerError::NotFound(old_name))?;
        record.children.insert(new_name, id);
        self.store(parent, &record)?;
        Ok(())
    }

    /// Remove the edge from `parent` to a child. The child's record (and any
    /// records below it) stay on disk until a compaction pass.
    pub fn unlink_child(&self, parent: Group, name: &str) -> Result<(), ContainerError> {
        let name = path::normalize_name(name);
        let mut record = self.load(parent)?;
        record
            .children
            .remove(&name)
            .ok_or(ContainerError::NotFound(name))?;
        self.store(parent, &record)?;
        Ok(())
    }

    /// Attach an existing group under `parent` as a pure structural link.
    pub fn link_child(
        &self,
        parent: Group,
        name: &str,
        existing: Group,
    ) -> Result<(), ContainerError> {
        let name = path::normalize_name(name);
        // the target record must be live
        self.load(existing)?;
        let mut record = self.load(parent)?;
        if record.children.contains_key(&name) || record.datasets.contains_key(&name) {
            return Err(ContainerError::Collision(name));
        }
        record.children.insert(name, existing.0);
        self.store(parent, &record)?;
        Ok(())
    }

    // --- attributes ---

    pub fn set_attr(
        &self,
        group: Group,
        key: &str,
        value: AttrValue,
    ) -> Result<(), ContainerError> {
        let mut record = self.load(group)?;
        record.attrs.insert(key.to_string(), value);
        self.store(group, &record)?;
        Ok(())
    }

    pub fn attr(&self, group: Group, key: &str) -> Result<Option<AttrValue>, ContainerError> {
        let record = self.load(group)?;
        Ok(record.attrs.get(key).cloned())
    }

    pub fn attrs(&self, group: Group) -> Result<BTreeMap<String, AttrValue>, ContainerError> {
        Ok(self.load(group)?.attrs)
    }

    pub fn set_kind(&self, group: Group, kind: NodeKind) -> Result<(), ContainerError> {
        self.set_attr(group, KIND_ATTR, AttrValue::Str(kind.as_str().to_string()))
    }

    /// The group's node-kind marker, or `None` when absent or unrecognized.
    pub fn group_kind(&self, group: Group) -> Result<Option<NodeKind>, ContainerError> {
        Ok(self
            .attr(group, KIND_ATTR)?
            .and_then(|v| v.as_str().and_then(NodeKind::parse)))
    }

    // --- datasets ---

    pub fn write_dataset(
        &self,
        group: Group,
        name: &str,
        dataset: Dataset,
    ) -> Result<(), ContainerError> {
        let name = path::normalize_name(name);
        let mut record = self.load(group)?;
        if record.children.contains_key(&name) {
            return Err(ContainerError::Collision(name));
        }
        record.datasets.insert(name, dataset);
        self.store(group, &record)?;
        Ok(())
    }

    pub fn dataset(&self, group: Group, name: &str) -> Result<Option<Dataset>, ContainerError> {
        let record = self.load(group)?;
        Ok(record.datasets.get(&path::normalize_name(name)).cloned())
    }

    pub fn has_dataset(&self, group: Group, name: &str) -> Result<bool, ContainerError> {
        let record = self.load(group)?;
        Ok(record.datasets.contains_key(&path::normalize_name(name)))
    }

    pub fn dataset_names(&self, group: Group) -> Result<Vec<String>, ContainerError> {
        Ok(self.load(group)?.datasets.keys().cloned().collect())
    }

    // --- maintenance ---

    pub fn flush(&self) -> Result<(), ContainerError> {
        self.db.flush()?;
        Ok(())
    }

    /// Copy the live group graph into a fresh container at `dest`, preserving
    /// shared structural links and dropping unreferenced records.
    pub fn compact_into(&self, dest: &Path) -> Result<(), ContainerError> {
        let out = ContainerFile::create(dest)?;
        if let Some(header) = self.header()? {
            out.put_header(&header)?;
        }
        let mut mapped: HashMap<GroupId, GroupId> = HashMap::new();
        mapped.insert(self.top.0, out.top.0);
        self.copy_group(&out, self.top, out.top, &mut mapped)?;
        out.flush()?;
        debug!(
            src = %self.path.display(),
            dest = %dest.display(),
            live_groups = mapped.len(),
            "Compacted container"
        );
        Ok(())
    }

    fn copy_group(
        &self,
        out: &ContainerFile,
        src: Group,
        dst: Group,
        mapped: &mut HashMap<GroupId, GroupId>,
    ) -> Result<(), ContainerError> {
        let record = self.load(src)?;
        let mut copied = GroupRecord {
            attrs: record.attrs.clone(),
            children: BTreeMap::new(),
            datasets: record.datasets.clone(),
        };
        for (name, old_id) in &record.children {
            match mapped.get(old_id) {
                // already copied elsewhere: keep the shared link
                Some(new_id) => {
                    copied.children.insert(name.clone(), *new_id);
                }
                None => {
                    let child = out.alloc()?;
                    mapped.insert(*old_id, child.0);
                    copied.children.insert(name.clone(), child.0);
                    self.copy_group(out, Group(*old_id), child, mapped)?;
                }
            }
        }
        out.store(dst, &copied)?;
        Ok(())
    }
}
