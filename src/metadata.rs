//! Metadata bundles
//!
//! A bundle is a named, opaque mapping of scalar/list values. The engine
//! treats a bundle as an atomic unit for diff purposes: it exists on disk or
//! it doesn't, and is only ever replaced wholesale, never partially merged.

use crate::container::{AttrValue, ContainerFile, Group, KIND_ATTR};
use crate::error::ContainerError;
use crate::types::NodeKind;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub name: String,
    items: BTreeMap<String, AttrValue>,
}

impl Metadata {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: BTreeMap::new(),
        }
    }

    pub fn from_items(name: &str, items: BTreeMap<String, AttrValue>) -> Self {
        Self {
            name: name.to_string(),
            items,
        }
    }

    pub fn insert(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.items.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.items.get(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.items.iter()
    }

    /// Persist this bundle as a tagged child group of `parent`.
    pub(crate) fn to_group(
        &self,
        file: &ContainerFile,
        parent: Group,
    ) -> Result<Group, ContainerError> {
        let group = file.create_group(parent, &self.name)?;
        file.set_kind(group, NodeKind::Metadata)?;
        for (key, value) in &self.items {
            if key == KIND_ATTR {
                return Err(ContainerError::Collision(key.clone()));
            }
            file.set_attr(group, key, value.clone())?;
        }
        Ok(group)
    }

    /// Reconstruct a bundle from a tagged group, using the group's basename
    /// as the bundle name.
    pub(crate) fn from_group(
        file: &ContainerFile,
        group: Group,
        name: &str,
    ) -> Result<Self, ContainerError> {
        let mut items = file.attrs(group)?;
        items.remove(KIND_ATTR);
        Ok(Self {
            name: name.to_string(),
            items,
        })
    }
}
