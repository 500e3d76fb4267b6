//! Container adapter
//!
//! Maps the engine's group/attribute/dataset model onto a sled-backed
//! container file. Groups are records addressed by id; parent-to-child edges
//! are name-keyed entries inside the parent record, so renaming, unlinking,
//! and structural linking are pure edge operations that never copy data.

pub mod resolve;
pub mod store;

pub use resolve::{resolve, Resolution};
pub use store::{ContainerFile, Group};

use crate::error::ContainerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Format marker stamped into every container header.
pub const FORMAT_NAME: &str = "grove";
pub const VERSION_MAJOR: u32 = 1;
pub const VERSION_MINOR: u32 = 0;

/// Attribute key carrying the node-kind marker on tagged groups.
pub const KIND_ATTR: &str = "grove_type";

/// Reserved child group name holding a node's metadata bundles.
pub const METADATA_BUNDLE_GROUP: &str = "metadatabundle";

/// Reserved prefix for the temporary name used during atomic overwrite.
pub const OVERWRITE_TMP_PREFIX: &str = "_tmp_";

/// File-level header, written exactly once right after creating a new
/// container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    pub format: String,
    pub version_major: u32,
    pub version_minor: u32,
    /// Fresh unique identifier minted per file.
    pub file_id: Uuid,
    pub authoring_program: String,
    pub authoring_user: String,
    pub created_at: DateTime<Utc>,
}

impl FileHeader {
    pub(crate) fn new(program: &str, user: &str) -> Self {
        Self {
            format: FORMAT_NAME.to_string(),
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            file_id: Uuid::new_v4(),
            authoring_program: program.to_string(),
            authoring_user: user.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn is_current_format(&self) -> bool {
        self.format == FORMAT_NAME
    }
}

/// Scalar or list attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    StrList(Vec<String>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

/// Typed flat value storage for datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Values {
    F64(Vec<f64>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::F64(v) => v.len(),
            Values::I64(v) => v.len(),
            Values::Bool(v) => v.len(),
            Values::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A shaped dataset plus a checksum over its encoded values.
///
/// The checksum lets callers verify byte-identity of a persisted payload
/// without any field-level diffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    shape: Vec<usize>,
    values: Values,
    checksum: [u8; 32],
}

impl Dataset {
    /// Build a dataset; the element count of `values` must match the shape
    /// product (an empty shape means a scalar of one element).
    pub fn new(shape: Vec<usize>, values: Values) -> Result<Self, ContainerError> {
        let expected: usize = if shape.is_empty() {
            1
        } else {
            shape.iter().product()
        };
        if values.len() != expected {
            return Err(ContainerError::Corrupt(format!(
                "dataset shape {:?} expects {} values, got {}",
                shape,
                expected,
                values.len()
            )));
        }
        let encoded = bincode::serialize(&values)?;
        let checksum = *blake3::hash(&encoded).as_bytes();
        Ok(Self {
            shape,
            values,
            checksum,
        })
    }

    /// Convenience constructor for a rank-1 dataset.
    pub fn vector(values: Values) -> Result<Self, ContainerError> {
        let len = values.len();
        Self::new(vec![len], values)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn checksum(&self) -> [u8; 32] {
        self.checksum
    }
}
