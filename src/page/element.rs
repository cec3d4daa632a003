//! Column element types
//!
//! Fixed-width, little-endian on-storage element encodings.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};
use crate::model::Value;

/// Element type of a physical column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,

    /// Raw byte (string payload)
    Byte,

    /// Running item total of a variable-length field
    Offset,
}

impl ColumnType {
    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            ColumnType::Bool | ColumnType::Byte => 1,
            ColumnType::I32 | ColumnType::U32 | ColumnType::F32 => 4,
            ColumnType::I64 | ColumnType::U64 | ColumnType::F64 | ColumnType::Offset => 8,
        }
    }

    /// Append one scalar value
    pub fn encode(self, value: &Value, buf: &mut BytesMut) -> Result<()> {
        match (self, value) {
            (ColumnType::Bool, Value::Bool(v)) => buf.put_u8(u8::from(*v)),
            (ColumnType::I32, Value::I32(v)) => buf.put_i32_le(*v),
            (ColumnType::I64, Value::I64(v)) => buf.put_i64_le(*v),
            (ColumnType::U32, Value::U32(v)) => buf.put_u32_le(*v),
            (ColumnType::U64, Value::U64(v)) => buf.put_u64_le(*v),
            (ColumnType::F32, Value::F32(v)) => buf.put_f32_le(*v),
            (ColumnType::F64, Value::F64(v)) => buf.put_f64_le(*v),
            (ty, v) => {
                return Err(AtlasError::Schema(format!(
                    "cannot store {:?} in a {:?} column",
                    v, ty
                )))
            }
        }
        Ok(())
    }

    /// Decode the scalar element at `index` of an unpacked page buffer
    pub fn decode(self, data: &[u8], index: usize) -> Result<Value> {
        let mut b = self.element_slice(data, index)?;
        let value = match self {
            ColumnType::Bool => Value::Bool(b.get_u8() != 0),
            ColumnType::I32 => Value::I32(b.get_i32_le()),
            ColumnType::I64 => Value::I64(b.get_i64_le()),
            ColumnType::U32 => Value::U32(b.get_u32_le()),
            ColumnType::U64 => Value::U64(b.get_u64_le()),
            ColumnType::F32 => Value::F32(b.get_f32_le()),
            ColumnType::F64 => Value::F64(b.get_f64_le()),
            ColumnType::Byte | ColumnType::Offset => {
                return Err(AtlasError::Schema(format!(
                    "{:?} column elements are not field values",
                    self
                )))
            }
        };
        Ok(value)
    }

    /// Decode the offset element at `index` of an unpacked page buffer
    pub fn decode_offset(data: &[u8], index: usize) -> Result<u64> {
        let mut b = ColumnType::Offset.element_slice(data, index)?;
        Ok(b.get_u64_le())
    }

    fn element_slice(self, data: &[u8], index: usize) -> Result<&[u8]> {
        let size = self.size();
        let start = index * size;
        data.get(start..start + size).ok_or_else(|| {
            AtlasError::Serialization(format!(
                "element {} out of bounds for {:?} page of {} bytes",
                index,
                self,
                data.len()
            ))
        })
    }
}
