//! Tests for the schema model
//!
//! These tests verify:
//! - Field registration and column allocation
//! - Schema errors (duplicates, bad names, bad defaults)
//! - Typed entry access and type checking
//! - Dotted path resolution into records

use std::sync::Arc;

use atlascol::model::{Entry, FieldType, FieldValue, Layout, Model, ModelBuilder, Value};
use atlascol::page::ColumnType;
use atlascol::AtlasError;

// =============================================================================
// Helper Functions
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Klass {
    a: f32,
    v: Vec<f32>,
}

impl FieldValue for Klass {
    fn field_type() -> FieldType {
        FieldType::record([("a", FieldType::F32), ("v", FieldType::sequence(FieldType::F32))])
    }

    fn into_value(self) -> Value {
        Value::Record(vec![self.a.into_value(), self.v.into_value()])
    }

    fn from_value(value: Value) -> Option<Self> {
        let Value::Record(members) = value else {
            return None;
        };
        let mut it = members.into_iter();
        Some(Klass {
            a: f32::from_value(it.next()?)?,
            v: Vec::<f32>::from_value(it.next()?)?,
        })
    }
}

fn event_model() -> Model {
    let mut builder = ModelBuilder::new();
    builder.make_field("pt", FieldType::F32).unwrap();
    builder.make_field("name", FieldType::String).unwrap();
    builder
        .make_field("hits", FieldType::sequence(FieldType::F64))
        .unwrap();
    builder.make_typed_field("klass", Klass { a: 1.5, v: vec![] }).unwrap();
    builder.create()
}

// =============================================================================
// Column Allocation Tests
// =============================================================================

#[test]
fn test_column_allocation_order() {
    let model = event_model();

    assert_eq!(model.n_fields(), 4);
    let elements: Vec<ColumnType> = model.columns().iter().map(|c| c.element).collect();
    assert_eq!(
        elements,
        vec![
            ColumnType::F32,    // pt
            ColumnType::Offset, // name offsets
            ColumnType::Byte,   // name bytes
            ColumnType::Offset, // hits offsets
            ColumnType::F64,    // hits items
            ColumnType::F32,    // klass.a
            ColumnType::Offset, // klass.v offsets
            ColumnType::F32,    // klass.v items
        ]
    );

    let depths: Vec<u32> = model.columns().iter().map(|c| c.depth).collect();
    assert_eq!(depths, vec![0, 0, 1, 0, 1, 0, 0, 1]);
}

#[test]
fn test_field_columns_belong_to_field() {
    let model = event_model();
    for field in model.fields() {
        for column in field.layout.columns() {
            assert_eq!(model.columns()[column as usize].field, field.id);
        }
    }
}

#[test]
fn test_nested_sequence_layout() {
    let mut builder = ModelBuilder::new();
    builder
        .make_field("grid", FieldType::sequence(FieldType::sequence(FieldType::I32)))
        .unwrap();
    let model = builder.create();

    let layout = &model.field("grid").unwrap().layout;
    let Layout::Sequence { offsets, item } = layout else {
        panic!("expected a sequence layout, got {:?}", layout);
    };
    assert_eq!(*offsets, 0);
    assert!(matches!(**item, Layout::Sequence { offsets: 1, .. }));
    assert_eq!(model.columns()[2].depth, 2);
}

// =============================================================================
// Schema Error Tests
// =============================================================================

#[test]
fn test_duplicate_field_rejected() {
    let mut builder = ModelBuilder::new();
    builder.make_field("x", FieldType::I32).unwrap();
    let result = builder.make_field("x", FieldType::F64);
    assert!(matches!(result, Err(AtlasError::Schema(_))));
}

#[test]
fn test_bad_names_rejected() {
    let mut builder = ModelBuilder::new();
    assert!(builder.make_field("", FieldType::I32).is_err());
    assert!(builder.make_field("a.b", FieldType::I32).is_err());
    assert!(builder
        .make_field("r", FieldType::record(Vec::<(String, FieldType)>::new()))
        .is_err());
    assert!(builder
        .make_field("r", FieldType::record([("m", FieldType::I32), ("m", FieldType::I64)]))
        .is_err());
}

#[test]
fn test_non_conforming_default_rejected() {
    let mut builder = ModelBuilder::new();
    let result = builder.make_field_with_default("x", FieldType::I32, Value::F32(1.0));
    assert!(matches!(result, Err(AtlasError::Schema(_))));
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_defaults() {
    let model = Arc::new(event_model());
    let entry = Entry::new(model);

    assert_eq!(entry.get::<f32>("pt").unwrap(), 0.0);
    assert_eq!(entry.get::<String>("name").unwrap(), "");
    assert!(entry.get::<Vec<f64>>("hits").unwrap().is_empty());
    assert_eq!(entry.get::<Klass>("klass").unwrap().a, 1.5);
}

#[test]
fn test_entry_set_and_get() {
    let model = Arc::new(event_model());
    let mut entry = Entry::new(model);

    entry.set("pt", 42.0f32).unwrap();
    entry.set("name", "muon".to_string()).unwrap();
    entry.set("hits", vec![1.0f64, 2.0, 3.0]).unwrap();
    entry
        .set("klass", Klass { a: 2.0, v: vec![4.0, 5.0] })
        .unwrap();

    assert_eq!(entry.get::<f32>("pt").unwrap(), 42.0);
    assert_eq!(entry.get::<String>("name").unwrap(), "muon");
    assert_eq!(entry.get::<Vec<f64>>("hits").unwrap(), vec![1.0, 2.0, 3.0]);
    assert_eq!(
        entry.get::<Klass>("klass").unwrap(),
        Klass { a: 2.0, v: vec![4.0, 5.0] }
    );
}

#[test]
fn test_entry_type_mismatch() {
    let model = Arc::new(event_model());
    let mut entry = Entry::new(model);

    assert!(matches!(entry.set("pt", 1i32), Err(AtlasError::Schema(_))));
    assert!(matches!(entry.set("nope", 1.0f32), Err(AtlasError::Schema(_))));
    assert!(entry.get::<f64>("pt").is_err());
}

#[test]
fn test_entry_update_in_place() {
    let model = Arc::new(event_model());
    let mut entry = Entry::new(model);

    entry
        .update("hits", |v| {
            if let Value::Sequence(items) = v {
                items.push(Value::F64(7.0));
            }
        })
        .unwrap();
    assert_eq!(entry.get::<Vec<f64>>("hits").unwrap(), vec![7.0]);
}

#[test]
fn test_entries_share_model() {
    let model = Arc::new(event_model());
    let other = Arc::new(event_model());
    let entry = Entry::new(model.clone());

    assert!(entry.shares_model(&model));
    assert!(!entry.shares_model(&other));
}

// =============================================================================
// Path Resolution Tests
// =============================================================================

#[test]
fn test_resolve_paths() {
    let model = event_model();

    let (ty, _) = model.resolve("klass.a").unwrap();
    assert_eq!(ty, FieldType::F32);

    let (ty, layout) = model.resolve("klass.v").unwrap();
    assert_eq!(ty, FieldType::sequence(FieldType::F32));
    assert_eq!(layout.columns(), vec![6, 7]);

    assert!(model.resolve("klass.b").is_err());
    assert!(model.resolve("hits.x").is_err());
    assert!(model.resolve("missing").is_err());
}
