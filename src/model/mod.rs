//! Model Module
//!
//! Schema definition: named, typed fields and their mapping onto physical
//! columns.
//!
//! ## Responsibilities
//! - Describe the fixed set of field kinds (scalars, strings, sequences,
//!   records of those)
//! - Allocate one or more columns per field (see [`Layout`])
//! - Provide the canonical [`Entry`] shape for writing and reading
//!
//! ## Column Mapping
//! ```text
//! pt: f32                 → [c0 f32]
//! name: string            → [c1 offsets] [c2 bytes]
//! hits: sequence<f64>     → [c3 offsets] [c4 f64]
//! klass: record { a: f32,
//!                 v: sequence<f32> }
//!                         → [c5 f32] [c6 offsets] [c7 f32]
//! ```
//! Offset columns hold running totals: entry `i` owns the items
//! `[offsets[i-1], offsets[i])` of its child columns (`offsets[-1] = 0`).

mod entry;
mod layout;
mod schema;
mod value;

pub use entry::Entry;
pub use layout::{ColumnAppender, ElementSource, Layout};
pub use schema::{ColumnDescriptor, FieldDescriptor, Model, ModelBuilder};
pub use value::{FieldType, FieldValue, Value};

/// Physical column id, dense from 0 in allocation order
pub type ColumnId = u32;

/// Top-level field ordinal within a model
pub type FieldId = u32;

/// Cluster id, dense from 0 in commit order
pub type ClusterId = u64;

/// Global entry index
pub type EntryIndex = u64;
