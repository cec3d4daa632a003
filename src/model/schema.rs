//! Model builder and frozen model
//!
//! A `ModelBuilder` registers fields and allocates their columns;
//! `create()` freezes it into a `Model` that writers and readers share.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};
use crate::page::ColumnType;

use super::layout::Layout;
use super::value::{FieldType, FieldValue, Value};
use super::{ColumnId, FieldId};

/// Persisted description of one top-level field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub name: String,
    pub field_type: FieldType,
    pub layout: Layout,
}

/// Persisted description of one physical column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub id: ColumnId,
    pub element: ColumnType,
    /// Owning top-level field
    pub field: FieldId,
    /// Sequence nesting level; depth-0 columns hold one element per entry
    pub depth: u32,
}

// =============================================================================
// Builder
// =============================================================================

/// Mutable schema under construction
#[derive(Debug, Default)]
pub struct ModelBuilder {
    fields: Vec<FieldDescriptor>,
    columns: Vec<ColumnDescriptor>,
    defaults: Vec<Value>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field with the zero value of its type as default
    pub fn make_field(&mut self, name: &str, field_type: FieldType) -> Result<FieldId> {
        let default = Value::default_for(&field_type);
        self.make_field_with_default(name, field_type, default)
    }

    /// Register a typed field with an initial value for the default entry
    pub fn make_typed_field<T: FieldValue>(&mut self, name: &str, default: T) -> Result<FieldId> {
        self.make_field_with_default(name, T::field_type(), default.into_value())
    }

    /// Register a field and allocate its backing columns
    ///
    /// Fails with `Schema` if the name is empty, contains `.`, collides with
    /// an existing field, or if `default` does not conform to the type.
    pub fn make_field_with_default(
        &mut self,
        name: &str,
        field_type: FieldType,
        default: Value,
    ) -> Result<FieldId> {
        validate_name(name)?;
        if self.fields.iter().any(|f| f.name == name) {
            return Err(AtlasError::Schema(format!("duplicate field name '{}'", name)));
        }
        validate_type(name, &field_type)?;
        if !default.conforms(&field_type) {
            return Err(AtlasError::Schema(format!(
                "default value for '{}' does not match type {}",
                name,
                field_type.type_name()
            )));
        }

        let id = self.fields.len() as FieldId;
        let layout = Layout::allocate(&field_type, id, 0, &mut self.columns);
        self.fields.push(FieldDescriptor {
            id,
            name: name.to_string(),
            field_type,
            layout,
        });
        self.defaults.push(default);
        Ok(id)
    }

    /// Freeze the model for binding to a writer
    pub fn create(self) -> Model {
        Model::assemble(self.fields, self.columns, self.defaults)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AtlasError::Schema("field name must not be empty".to_string()));
    }
    if name.contains('.') {
        return Err(AtlasError::Schema(format!(
            "field name '{}' must not contain '.'",
            name
        )));
    }
    Ok(())
}

fn validate_type(name: &str, ty: &FieldType) -> Result<()> {
    match ty {
        FieldType::Sequence(inner) => validate_type(name, inner),
        FieldType::Record(members) => {
            if members.is_empty() {
                return Err(AtlasError::Schema(format!(
                    "record field '{}' has no members",
                    name
                )));
            }
            for (i, (member, t)) in members.iter().enumerate() {
                validate_name(member)?;
                if members[..i].iter().any(|(m, _)| m == member) {
                    return Err(AtlasError::Schema(format!(
                        "duplicate member '{}' in record field '{}'",
                        member, name
                    )));
                }
                validate_type(name, t)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

// =============================================================================
// Frozen Model
// =============================================================================

/// Immutable schema shared by a writer or reader and its entries
#[derive(Debug)]
pub struct Model {
    fields: Vec<FieldDescriptor>,
    columns: Vec<ColumnDescriptor>,
    defaults: Vec<Value>,
    by_name: HashMap<String, FieldId>,
}

impl Model {
    fn assemble(
        fields: Vec<FieldDescriptor>,
        columns: Vec<ColumnDescriptor>,
        defaults: Vec<Value>,
    ) -> Model {
        let by_name = fields.iter().map(|f| (f.name.clone(), f.id)).collect();
        Model {
            fields,
            columns,
            defaults,
            by_name,
        }
    }

    /// Rebuild a model from stored field and column descriptors
    ///
    /// Checks that every layout re-derives from its field type and that the
    /// column list matches the allocation exactly.
    pub fn from_descriptors(
        fields: Vec<FieldDescriptor>,
        columns: Vec<ColumnDescriptor>,
    ) -> Result<Model> {
        let mut expected = Vec::new();
        for (i, field) in fields.iter().enumerate() {
            if field.id as usize != i {
                return Err(AtlasError::CorruptDescriptor(format!(
                    "field '{}' has id {}, expected {}",
                    field.name, field.id, i
                )));
            }
            validate_name(&field.name)
                .and_then(|_| validate_type(&field.name, &field.field_type))
                .map_err(|e| AtlasError::CorruptDescriptor(e.to_string()))?;
            let layout = Layout::allocate(&field.field_type, field.id, 0, &mut expected);
            if layout != field.layout {
                return Err(AtlasError::CorruptDescriptor(format!(
                    "layout of field '{}' does not match its type",
                    field.name
                )));
            }
        }
        if expected != columns {
            return Err(AtlasError::CorruptDescriptor(format!(
                "column table mismatch: {} stored, {} derived from fields",
                columns.len(),
                expected.len()
            )));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = fields.iter().find(|f| !seen.insert(f.name.as_str())) {
            return Err(AtlasError::CorruptDescriptor(format!(
                "duplicate field name '{}'",
                dup.name
            )));
        }

        let defaults = fields.iter().map(|f| Value::default_for(&f.field_type)).collect();
        Ok(Model::assemble(fields, columns, defaults))
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Field by name
    pub fn field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.by_name
            .get(name)
            .map(|&id| &self.fields[id as usize])
            .ok_or_else(|| AtlasError::Schema(format!("unknown field '{}'", name)))
    }

    /// Field by ordinal
    pub fn field_at(&self, id: FieldId) -> Result<&FieldDescriptor> {
        self.fields
            .get(id as usize)
            .ok_or_else(|| AtlasError::Schema(format!("unknown field id {}", id)))
    }

    pub(crate) fn default_values(&self) -> &[Value] {
        &self.defaults
    }

    /// Resolve a dotted path (`"klass.a"`) to its type and layout
    ///
    /// Only record members are addressable; a path cannot step into a
    /// sequence because sequence items are not indexed by entry.
    pub fn resolve(&self, path: &str) -> Result<(FieldType, Layout)> {
        let mut parts = path.split('.');
        let head = parts.next().unwrap_or_default();
        let field = self.field(head)?;
        let mut ty = &field.field_type;
        let mut layout = &field.layout;

        for part in parts {
            let FieldType::Record(members) = ty else {
                return Err(AtlasError::Schema(format!(
                    "'{}' in path '{}' is not a record member",
                    part, path
                )));
            };
            let (index, member_layout) = layout.member(part).ok_or_else(|| {
                AtlasError::Schema(format!("unknown member '{}' in path '{}'", part, path))
            })?;
            ty = &members[index].1;
            layout = member_layout;
        }

        Ok((ty.clone(), layout.clone()))
    }
}
