//! Entry: one record's materialized values
//!
//! An entry holds one value slot per top-level field of its model. Values
//! are type-checked when set, so a fill can never fail on shape.

use std::sync::Arc;

use crate::error::{AtlasError, Result};

use super::schema::Model;
use super::value::{FieldValue, Value};
use super::FieldId;

/// Value slots bound to one model
#[derive(Debug, Clone)]
pub struct Entry {
    model: Arc<Model>,
    values: Vec<Value>,
}

impl Entry {
    /// Create an entry holding the model's default values
    pub fn new(model: Arc<Model>) -> Self {
        let values = model.default_values().to_vec();
        Self { model, values }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// True if both entries are bound to the same model instance
    pub fn shares_model(&self, model: &Arc<Model>) -> bool {
        Arc::ptr_eq(&self.model, model)
    }

    // -------------------------------------------------------------------------
    // Write access
    // -------------------------------------------------------------------------

    /// Set a field by name from a typed value
    pub fn set<T: FieldValue>(&mut self, name: &str, value: T) -> Result<()> {
        self.set_value(name, value.into_value())
    }

    /// Set a field by name
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<()> {
        let id = self.model.field(name)?.id;
        self.set_at(id, value)
    }

    /// Set a field by ordinal
    pub fn set_at(&mut self, id: FieldId, value: Value) -> Result<()> {
        let field = self.model.field_at(id)?;
        if !value.conforms(&field.field_type) {
            return Err(AtlasError::Schema(format!(
                "value for '{}' does not match type {}",
                field.name,
                field.field_type.type_name()
            )));
        }
        self.values[id as usize] = value;
        Ok(())
    }

    /// Mutable access to a raw slot
    ///
    /// The closure's result is re-checked against the field type; on a
    /// mismatch the previous value is restored.
    pub fn update<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Value),
    {
        let field = self.model.field(name)?;
        let (id, ty) = (field.id as usize, field.field_type.clone());
        let previous = self.values[id].clone();
        f(&mut self.values[id]);
        if !self.values[id].conforms(&ty) {
            self.values[id] = previous;
            return Err(AtlasError::Schema(format!(
                "updated value for '{}' does not match type {}",
                name,
                ty.type_name()
            )));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    /// Get a field by name as a typed value
    pub fn get<T: FieldValue>(&self, name: &str) -> Result<T> {
        let value = self.value(name)?.clone();
        T::from_value(value).ok_or_else(|| {
            AtlasError::Schema(format!(
                "field '{}' is not of type {}",
                name,
                T::field_type().type_name()
            ))
        })
    }

    /// Get a field's raw value by name
    pub fn value(&self, name: &str) -> Result<&Value> {
        let id = self.model.field(name)?.id;
        Ok(&self.values[id as usize])
    }

    /// Get a field's raw value by ordinal
    pub fn value_at(&self, id: FieldId) -> Option<&Value> {
        self.values.get(id as usize)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [Value] {
        &mut self.values
    }
}
