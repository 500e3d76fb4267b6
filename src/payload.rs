//! Node payload kinds
//!
//! The closed set of payload variants a node can carry, behind a single
//! serialize/deserialize capability. The write engine depends only on that
//! capability; it never inspects payload contents, so structural diffing
//! stays payload-agnostic.

use crate::container::{AttrValue, ContainerFile, Dataset, Group, Values};
use crate::error::ContainerError;
use crate::types::NodeKind;

/// Per-axis calibration vector for an [`ArrayData`] payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DimVector {
    pub name: String,
    pub units: String,
    pub samples: Vec<f64>,
}

impl DimVector {
    /// Default calibration: sample indices in units of pixels.
    pub fn pixels(axis: usize, len: usize) -> Self {
        Self {
            name: format!("dim{}", axis),
            units: "pixels".to_string(),
            samples: (0..len).map(|v| v as f64).collect(),
        }
    }
}

/// N-dimensional array payload with per-axis calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayData {
    pub units: String,
    data: Dataset,
    dims: Vec<DimVector>,
}

impl ArrayData {
    /// Build an array payload; axis calibrations default to pixel indices.
    pub fn new(shape: Vec<usize>, values: Values) -> Result<Self, ContainerError> {
        let dims = shape
            .iter()
            .enumerate()
            .map(|(axis, &len)| DimVector::pixels(axis, len))
            .collect();
        Ok(Self {
            units: String::new(),
            data: Dataset::new(shape, values)?,
            dims,
        })
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = units.to_string();
        self
    }

    /// Replace one axis calibration. The sample count must match the axis
    /// length.
    pub fn set_dim(&mut self, axis: usize, dim: DimVector) -> Result<(), ContainerError> {
        let shape = self.data.shape();
        if axis >= shape.len() {
            return Err(ContainerError::Corrupt(format!(
                "axis {} out of range for rank-{} array",
                axis,
                shape.len()
            )));
        }
        if dim.samples.len() != shape[axis] {
            return Err(ContainerError::Corrupt(format!(
                "axis {} expects {} samples, got {}",
                axis,
                shape[axis],
                dim.samples.len()
            )));
        }
        self.dims[axis] = dim;
        Ok(())
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn values(&self) -> &Values {
        self.data.values()
    }

    pub fn dims(&self) -> &[DimVector] {
        &self.dims
    }

    /// Checksum of the encoded values, for byte-identity checks.
    pub fn checksum(&self) -> [u8; 32] {
        self.data.checksum()
    }
}

/// Columnar record list payload: named, equal-length typed columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordList {
    columns: Vec<(String, Values)>,
}

impl RecordList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; its length must match existing columns.
    pub fn push_column(&mut self, name: &str, values: Values) -> Result<(), ContainerError> {
        if self.columns.iter().any(|(n, _)| n == name) {
            return Err(ContainerError::Collision(name.to_string()));
        }
        if let Some((_, first)) = self.columns.first() {
            if first.len() != values.len() {
                return Err(ContainerError::Corrupt(format!(
                    "column '{}' has {} values, expected {}",
                    name,
                    values.len(),
                    first.len()
                )));
            }
        }
        self.columns.push((name.to_string(), values));
        Ok(())
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.columns.first().map(|(_, v)| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fields(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Values> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Payload of a runtime node.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Distinguished tree top; owns file-level metadata through its node.
    Root,
    /// Bare structural node with no own data.
    Node,
    Array(ArrayData),
    Records(RecordList),
}

impl Payload {
    pub fn kind(&self) -> NodeKind {
        match self {
            Payload::Root => NodeKind::Root,
            Payload::Node => NodeKind::Node,
            Payload::Array(_) => NodeKind::Array,
            Payload::Records(_) => NodeKind::Records,
        }
    }

    /// Populate an already-created, already-tagged group with this payload's
    /// own data. Children and metadata bundles are the writer's concern.
    pub(crate) fn serialize(
        &self,
        file: &ContainerFile,
        group: Group,
    ) -> Result<(), ContainerError> {
        match self {
            Payload::Root | Payload::Node => Ok(()),
            Payload::Array(array) => {
                file.write_dataset(group, "data", array.data.clone())?;
                file.set_attr(group, "units", AttrValue::Str(array.units.clone()))?;
                for (axis, dim) in array.dims.iter().enumerate() {
                    file.write_dataset(
                        group,
                        &format!("dim{}", axis),
                        Dataset::vector(Values::F64(dim.samples.clone()))?,
                    )?;
                    file.set_attr(
                        group,
                        &format!("dim{}_name", axis),
                        AttrValue::Str(dim.name.clone()),
                    )?;
                    file.set_attr(
                        group,
                        &format!("dim{}_units", axis),
                        AttrValue::Str(dim.units.clone()),
                    )?;
                }
                Ok(())
            }
            Payload::Records(records) => {
                for (name, values) in &records.columns {
                    file.write_dataset(group, name, Dataset::vector(values.clone())?)?;
                }
                let fields = records.columns.iter().map(|(n, _)| n.clone()).collect();
                file.set_attr(group, "fields", AttrValue::StrList(fields))?;
                Ok(())
            }
        }
    }

    /// Reconstruct a payload from a persisted group and its declared kind.
    pub(crate) fn deserialize(
        file: &ContainerFile,
        group: Group,
        kind: NodeKind,
    ) -> Result<Payload, ContainerError> {
        match kind {
            NodeKind::Root => Ok(Payload::Root),
            NodeKind::Node => Ok(Payload::Node),
            NodeKind::Array => {
                let data = file
                    .dataset(group, "data")?
                    .ok_or_else(|| ContainerError::Corrupt("array group lacks data".into()))?;
                let units = file
                    .attr(group, "units")?
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                let rank = data.shape().len();
                let mut dims = Vec::with_capacity(rank);
                for axis in 0..rank {
                    let dim = match file.dataset(group, &format!("dim{}", axis))? {
                        Some(ds) => {
                            let samples = match ds.values() {
                                Values::F64(v) => v.clone(),
                                other => {
                                    return Err(ContainerError::Corrupt(format!(
                                        "dim{} holds non-float samples: {:?}",
                                        axis, other
                                    )))
                                }
                            };
                            let name = file
                                .attr(group, &format!("dim{}_name", axis))?
                                .and_then(|v| v.as_str().map(str::to_string))
                                .unwrap_or_else(|| format!("dim{}", axis));
                            let units = file
                                .attr(group, &format!("dim{}_units", axis))?
                                .and_then(|v| v.as_str().map(str::to_string))
                                .unwrap_or_default();
                            DimVector {
                                name,
                                units,
                                samples,
                            }
                        }
                        None => DimVector::pixels(axis, data.shape()[axis]),
                    };
                    dims.push(dim);
                }
                Ok(Payload::Array(ArrayData { units, data, dims }))
            }
            NodeKind::Records => {
                let fields = match file.attr(group, "fields")? {
                    Some(AttrValue::StrList(fields)) => fields,
                    _ => {
                        return Err(ContainerError::Corrupt(
                            "records group lacks field list".into(),
                        ))
                    }
                };
                let mut records = RecordList::new();
                for field in &fields {
                    let ds = file.dataset(group, field)?.ok_or_else(|| {
                        ContainerError::Corrupt(format!("records group lacks column '{}'", field))
                    })?;
                    records.push_column(field, ds.values().clone())?;
                }
                Ok(Payload::Records(records))
            }
            NodeKind::Metadata => Err(ContainerError::Corrupt(
                "metadata bundle group where a data node was expected".into(),
            )),
        }
    }
}
