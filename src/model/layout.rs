//! Field-to-column layout
//!
//! A `Layout` is the column tree of one field. It drives both directions of
//! the mapping: `append` decomposes a value into column elements at fill
//! time, `read` reassembles a value from column elements at load time.

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};
use crate::page::ColumnType;

use super::schema::ColumnDescriptor;
use super::value::{FieldType, Value};
use super::{ColumnId, FieldId};

/// Column tree of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layout {
    /// One element per item in a single column
    Scalar { column: ColumnId },

    /// Offset column plus a byte column
    String { offsets: ColumnId, bytes: ColumnId },

    /// Offset column plus the item's own layout
    Sequence { offsets: ColumnId, item: Box<Layout> },

    /// Member layouts, in declaration order
    Record { members: Vec<(String, Layout)> },
}

/// Receives decomposed column elements during fill
pub trait ColumnAppender {
    fn append_value(&mut self, column: ColumnId, value: &Value) -> Result<()>;

    /// Advance the running total of an offset column by `count` items
    fn append_offset(&mut self, column: ColumnId, count: u64) -> Result<()>;

    fn append_bytes(&mut self, column: ColumnId, bytes: &[u8]) -> Result<()>;
}

/// Provides column elements by global element index during load
pub trait ElementSource {
    fn value(&mut self, column: ColumnId, index: u64) -> Result<Value>;

    fn offset(&mut self, column: ColumnId, index: u64) -> Result<u64>;

    /// Running total preceding element `index` of an offset column
    ///
    /// The default reads element `index - 1`, which may sit in the previous
    /// cluster.
    fn offset_before(&mut self, column: ColumnId, index: u64) -> Result<u64> {
        match index {
            0 => Ok(0),
            _ => self.offset(column, index - 1),
        }
    }

    fn bytes(&mut self, column: ColumnId, start: u64, len: u64) -> Result<Vec<u8>>;
}

impl Layout {
    /// Allocate columns for `ty`, appending their descriptors to `columns`
    ///
    /// `depth` is the sequence nesting level: depth-0 columns carry exactly
    /// one element per entry.
    pub(crate) fn allocate(
        ty: &FieldType,
        field: FieldId,
        depth: u32,
        columns: &mut Vec<ColumnDescriptor>,
    ) -> Layout {
        let scalar = |columns: &mut Vec<ColumnDescriptor>, element: ColumnType| Layout::Scalar {
            column: push_column(columns, element, field, depth),
        };

        match ty {
            FieldType::Bool => scalar(columns, ColumnType::Bool),
            FieldType::I32 => scalar(columns, ColumnType::I32),
            FieldType::I64 => scalar(columns, ColumnType::I64),
            FieldType::U32 => scalar(columns, ColumnType::U32),
            FieldType::U64 => scalar(columns, ColumnType::U64),
            FieldType::F32 => scalar(columns, ColumnType::F32),
            FieldType::F64 => scalar(columns, ColumnType::F64),
            FieldType::String => {
                let offsets = push_column(columns, ColumnType::Offset, field, depth);
                let bytes = push_column(columns, ColumnType::Byte, field, depth + 1);
                Layout::String { offsets, bytes }
            }
            FieldType::Sequence(inner) => {
                let offsets = push_column(columns, ColumnType::Offset, field, depth);
                let item = Layout::allocate(inner, field, depth + 1, columns);
                Layout::Sequence {
                    offsets,
                    item: Box::new(item),
                }
            }
            FieldType::Record(members) => Layout::Record {
                members: members
                    .iter()
                    .map(|(name, t)| (name.clone(), Layout::allocate(t, field, depth, columns)))
                    .collect(),
            },
        }
    }

    /// All columns of this layout, in allocation order
    pub fn columns(&self) -> Vec<ColumnId> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<ColumnId>) {
        match self {
            Layout::Scalar { column } => out.push(*column),
            Layout::String { offsets, bytes } => {
                out.push(*offsets);
                out.push(*bytes);
            }
            Layout::Sequence { offsets, item } => {
                out.push(*offsets);
                item.collect_columns(out);
            }
            Layout::Record { members } => {
                for (_, layout) in members {
                    layout.collect_columns(out);
                }
            }
        }
    }

    /// Member layout by name (records only)
    pub fn member(&self, name: &str) -> Option<(usize, &Layout)> {
        match self {
            Layout::Record { members } => members
                .iter()
                .enumerate()
                .find(|(_, (n, _))| n == name)
                .map(|(i, (_, l))| (i, l)),
            _ => None,
        }
    }

    // =========================================================================
    // Fill: value → column elements
    // =========================================================================

    /// Decompose `value` into column elements
    ///
    /// The value must already conform to the field type; entries enforce
    /// that when values are set.
    pub fn append(&self, value: &Value, target: &mut dyn ColumnAppender) -> Result<()> {
        match (self, value) {
            (Layout::Scalar { column }, v) => target.append_value(*column, v),
            (Layout::String { offsets, bytes }, Value::String(s)) => {
                target.append_offset(*offsets, s.len() as u64)?;
                target.append_bytes(*bytes, s.as_bytes())
            }
            (Layout::Sequence { offsets, item }, Value::Sequence(items)) => {
                target.append_offset(*offsets, items.len() as u64)?;
                for v in items {
                    item.append(v, target)?;
                }
                Ok(())
            }
            (Layout::Record { members }, Value::Record(values)) if members.len() == values.len() => {
                for ((_, layout), v) in members.iter().zip(values) {
                    layout.append(v, target)?;
                }
                Ok(())
            }
            (layout, v) => Err(AtlasError::Schema(format!(
                "value {:?} does not match layout {:?}",
                v, layout
            ))),
        }
    }

    // =========================================================================
    // Load: column elements → value
    // =========================================================================

    /// Reassemble the value at `index` of this layout's depth
    pub fn read(&self, index: u64, source: &mut dyn ElementSource) -> Result<Value> {
        match self {
            Layout::Scalar { column } => source.value(*column, index),
            Layout::String { offsets, bytes } => {
                let (start, end) = item_range(*offsets, index, source)?;
                let raw = source.bytes(*bytes, start, end - start)?;
                String::from_utf8(raw).map(Value::String).map_err(|e| {
                    AtlasError::Serialization(format!("invalid UTF-8 in column {}: {}", bytes, e))
                })
            }
            Layout::Sequence { offsets, item } => {
                let (start, end) = item_range(*offsets, index, source)?;
                let mut items = Vec::with_capacity((end - start) as usize);
                for j in start..end {
                    items.push(item.read(j, source)?);
                }
                Ok(Value::Sequence(items))
            }
            Layout::Record { members } => {
                let mut values = Vec::with_capacity(members.len());
                for (_, layout) in members {
                    values.push(layout.read(index, source)?);
                }
                Ok(Value::Record(values))
            }
        }
    }
}

fn push_column(
    columns: &mut Vec<ColumnDescriptor>,
    element: ColumnType,
    field: FieldId,
    depth: u32,
) -> ColumnId {
    let id = columns.len() as ColumnId;
    columns.push(ColumnDescriptor {
        id,
        element,
        field,
        depth,
    });
    id
}

/// Item range `[start, end)` owned by `index` in an offset column
fn item_range(offsets: ColumnId, index: u64, source: &mut dyn ElementSource) -> Result<(u64, u64)> {
    let end = source.offset(offsets, index)?;
    let start = source.offset_before(offsets, index)?;
    if start > end {
        return Err(AtlasError::CorruptPage {
            column: offsets,
            cluster: 0,
            reason: format!("offsets decrease at element {}: {} > {}", index, start, end),
        });
    }
    Ok((start, end))
}
