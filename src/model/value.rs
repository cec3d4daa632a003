//! Field types and values
//!
//! `FieldType` is the closed set of field kinds the engine stores. Richer
//! user types are described as `Record`s through [`FieldValue`], which is the
//! explicit schema-description step for a Rust type.

use serde::{Deserialize, Serialize};

/// Semantic type of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Bool,
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,

    /// UTF-8 string, stored as a sequence of bytes
    String,

    /// Variable-length sequence of the inner type
    Sequence(Box<FieldType>),

    /// Ordered named members; owns no column itself
    Record(Vec<(String, FieldType)>),
}

impl FieldType {
    /// Shorthand for `Sequence(Box::new(inner))`
    pub fn sequence(inner: FieldType) -> Self {
        FieldType::Sequence(Box::new(inner))
    }

    /// Shorthand for a record from `(name, type)` pairs
    pub fn record<S: Into<String>>(members: impl IntoIterator<Item = (S, FieldType)>) -> Self {
        FieldType::Record(members.into_iter().map(|(n, t)| (n.into(), t)).collect())
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            FieldType::String | FieldType::Sequence(_) | FieldType::Record(_)
        )
    }

    /// Human-readable type name, e.g. `sequence<f32>`
    pub fn type_name(&self) -> String {
        match self {
            FieldType::Bool => "bool".to_string(),
            FieldType::I32 => "i32".to_string(),
            FieldType::I64 => "i64".to_string(),
            FieldType::U32 => "u32".to_string(),
            FieldType::U64 => "u64".to_string(),
            FieldType::F32 => "f32".to_string(),
            FieldType::F64 => "f64".to_string(),
            FieldType::String => "string".to_string(),
            FieldType::Sequence(inner) => format!("sequence<{}>", inner.type_name()),
            FieldType::Record(members) => {
                let inner: Vec<String> = members
                    .iter()
                    .map(|(n, t)| format!("{}: {}", n, t.type_name()))
                    .collect();
                format!("record{{{}}}", inner.join(", "))
            }
        }
    }
}

/// A materialized field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Sequence(Vec<Value>),
    Record(Vec<Value>),
}

impl Value {
    /// Zero value of a field type
    pub fn default_for(ty: &FieldType) -> Value {
        match ty {
            FieldType::Bool => Value::Bool(false),
            FieldType::I32 => Value::I32(0),
            FieldType::I64 => Value::I64(0),
            FieldType::U32 => Value::U32(0),
            FieldType::U64 => Value::U64(0),
            FieldType::F32 => Value::F32(0.0),
            FieldType::F64 => Value::F64(0.0),
            FieldType::String => Value::String(String::new()),
            FieldType::Sequence(_) => Value::Sequence(Vec::new()),
            FieldType::Record(members) => {
                Value::Record(members.iter().map(|(_, t)| Value::default_for(t)).collect())
            }
        }
    }

    /// Deep check that this value has the shape of `ty`
    pub fn conforms(&self, ty: &FieldType) -> bool {
        match (self, ty) {
            (Value::Bool(_), FieldType::Bool)
            | (Value::I32(_), FieldType::I32)
            | (Value::I64(_), FieldType::I64)
            | (Value::U32(_), FieldType::U32)
            | (Value::U64(_), FieldType::U64)
            | (Value::F32(_), FieldType::F32)
            | (Value::F64(_), FieldType::F64)
            | (Value::String(_), FieldType::String) => true,
            (Value::Sequence(items), FieldType::Sequence(inner)) => {
                items.iter().all(|v| v.conforms(inner))
            }
            (Value::Record(values), FieldType::Record(members)) => {
                values.len() == members.len()
                    && values.iter().zip(members).all(|(v, (_, t))| v.conforms(t))
            }
            _ => false,
        }
    }
}

// =============================================================================
// Typed Access
// =============================================================================

/// Conversion between a Rust type and a field value
///
/// Implement this for a struct to describe it as a `Record` field:
///
/// ```
/// use atlascol::model::{FieldType, FieldValue, Value};
///
/// #[derive(Debug, PartialEq)]
/// struct Hit { energy: f32, tags: Vec<u32> }
///
/// impl FieldValue for Hit {
///     fn field_type() -> FieldType {
///         FieldType::record([
///             ("energy", FieldType::F32),
///             ("tags", FieldType::sequence(FieldType::U32)),
///         ])
///     }
///     fn into_value(self) -> Value {
///         Value::Record(vec![self.energy.into_value(), self.tags.into_value()])
///     }
///     fn from_value(value: Value) -> Option<Self> {
///         let Value::Record(members) = value else { return None };
///         let mut it = members.into_iter();
///         Some(Hit {
///             energy: f32::from_value(it.next()?)?,
///             tags: Vec::<u32>::from_value(it.next()?)?,
///         })
///     }
/// }
/// ```
pub trait FieldValue: Sized {
    fn field_type() -> FieldType;
    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! scalar_field_value {
    ($ty:ty, $variant:ident) => {
        impl FieldValue for $ty {
            fn field_type() -> FieldType {
                FieldType::$variant
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

scalar_field_value!(bool, Bool);
scalar_field_value!(i32, I32);
scalar_field_value!(i64, I64);
scalar_field_value!(u32, U32);
scalar_field_value!(u64, U64);
scalar_field_value!(f32, F32);
scalar_field_value!(f64, F64);
scalar_field_value!(String, String);

impl<T: FieldValue> FieldValue for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::sequence(T::field_type())
    }

    fn into_value(self) -> Value {
        Value::Sequence(self.into_iter().map(FieldValue::into_value).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Sequence(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}
