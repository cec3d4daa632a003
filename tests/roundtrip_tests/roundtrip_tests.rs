//! End-to-end write/read tests
//!
//! These tests verify:
//! - Entries read back exactly as filled, across cluster boundaries
//! - Every field kind: scalars, strings, sequences, nested records
//! - Both container formats and both sink variants
//! - Implicit close on drop and stores without entries

use std::path::PathBuf;

use atlascol::storage::MemoryContainer;
use atlascol::{
    Compression, ContainerFormat, FieldType, FieldValue, ModelBuilder, ReadOptions, Reader, Value,
    WriteOptions, Writer,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.atc");
    (temp_dir, path)
}

#[derive(Debug, Clone, PartialEq)]
struct Hit {
    energy: f32,
    cells: Vec<u32>,
}

impl FieldValue for Hit {
    fn field_type() -> FieldType {
        FieldType::record([
            ("energy", FieldType::F32),
            ("cells", FieldType::sequence(FieldType::U32)),
        ])
    }

    fn into_value(self) -> Value {
        Value::Record(vec![self.energy.into_value(), self.cells.into_value()])
    }

    fn from_value(value: Value) -> Option<Self> {
        let Value::Record(members) = value else {
            return None;
        };
        let mut it = members.into_iter();
        Some(Hit {
            energy: f32::from_value(it.next()?)?,
            cells: Vec::<u32>::from_value(it.next()?)?,
        })
    }
}

fn hit(i: u32) -> Hit {
    Hit {
        energy: i as f32 * 0.25,
        cells: (0..i % 4).map(|c| i * 10 + c).collect(),
    }
}

fn label(i: u32) -> String {
    match i % 3 {
        0 => String::new(),
        1 => format!("track-{}", i),
        _ => "µ→eνν".repeat(i as usize % 5),
    }
}

// =============================================================================
// Basic Tests
// =============================================================================

#[test]
fn test_scalar_entries_across_clusters() {
    let (_temp_dir, path) = setup_dir();

    let mut builder = ModelBuilder::new();
    builder.make_field("pt", FieldType::F32).unwrap();
    let mut writer = Writer::create(builder.create(), "basics", &path, WriteOptions::default()).unwrap();

    for (i, pt) in [42.0f32, 24.0, 12.0].into_iter().enumerate() {
        writer.entry_mut().set("pt", pt).unwrap();
        writer.fill().unwrap();
        if i == 0 {
            writer.commit_cluster().unwrap();
        }
    }
    writer.close().unwrap();

    let mut reader = Reader::open("basics", &path).unwrap();
    assert_eq!(reader.n_entries(), 3);
    assert_eq!(reader.descriptor().n_clusters(), 2);
    for (k, expected) in [42.0f32, 24.0, 12.0].into_iter().enumerate() {
        reader.load_entry(k as u64).unwrap();
        assert_eq!(reader.entry().get::<f32>("pt").unwrap(), expected);
    }
}

#[test]
fn test_random_length_sequences_sum() {
    let (_temp_dir, path) = setup_dir();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    let mut builder = ModelBuilder::new();
    builder
        .make_field("values", FieldType::sequence(FieldType::F64))
        .unwrap();
    let mut writer = Writer::create(builder.create(), "random", &path, WriteOptions::default()).unwrap();

    let mut written = 0.0f64;
    let mut n_written = 0u64;
    for i in 0..20_000u32 {
        let len = rng.random_range(1..=1000usize);
        let values: Vec<f64> = (0..len).map(|_| rng.random_range(0..1_000_000u32) as f64).collect();
        written += values.iter().sum::<f64>();
        n_written += len as u64;
        writer.entry_mut().set("values", values).unwrap();
        writer.fill().unwrap();
        if (i + 1) % 1000 == 0 {
            writer.commit_cluster().unwrap();
        }
    }
    writer.close().unwrap();

    let reader = Reader::open("random", &path).unwrap();
    assert_eq!(reader.n_entries(), 20_000);
    assert_eq!(reader.descriptor().n_clusters(), 20);

    let view = reader.view::<Vec<f64>>("values").unwrap();
    let mut read = 0.0f64;
    let mut n_read = 0u64;
    for values in view.iter() {
        let values = values.unwrap();
        assert!(!values.is_empty());
        read += values.iter().sum::<f64>();
        n_read += values.len() as u64;
    }
    assert_eq!(n_read, n_written);
    assert_eq!(read, written);
}

#[test]
fn test_all_field_kinds() {
    let (_temp_dir, path) = setup_dir();

    let mut builder = ModelBuilder::new();
    builder.make_field("flag", FieldType::Bool).unwrap();
    builder.make_field("run", FieldType::I64).unwrap();
    builder.make_field("label", FieldType::String).unwrap();
    builder
        .make_field("grid", FieldType::sequence(FieldType::sequence(FieldType::I32)))
        .unwrap();
    builder
        .make_typed_field("hit", Hit { energy: 0.0, cells: vec![] })
        .unwrap();
    let options = WriteOptions::builder().elements_per_page(7).build();
    let mut writer = Writer::create(builder.create(), "kinds", &path, options).unwrap();

    for i in 0..50u32 {
        let entry = writer.entry_mut();
        entry.set("flag", i % 2 == 0).unwrap();
        entry.set("run", -(i as i64)).unwrap();
        entry.set("label", label(i)).unwrap();
        entry
            .set("grid", vec![vec![i as i32; (i % 3) as usize], vec![], vec![1, 2]])
            .unwrap();
        entry.set("hit", hit(i)).unwrap();
        writer.fill().unwrap();
        if i % 17 == 16 {
            writer.commit_cluster().unwrap();
        }
    }
    writer.close().unwrap();

    let mut reader = Reader::open("kinds", &path).unwrap();
    assert_eq!(reader.n_entries(), 50);
    for i in reader.entry_range().rev() {
        reader.load_entry(i).unwrap();
        let entry = reader.entry();
        let i = i as u32;
        assert_eq!(entry.get::<bool>("flag").unwrap(), i % 2 == 0);
        assert_eq!(entry.get::<i64>("run").unwrap(), -(i as i64));
        assert_eq!(entry.get::<String>("label").unwrap(), label(i));
        assert_eq!(
            entry.get::<Vec<Vec<i32>>>("grid").unwrap(),
            vec![vec![i as i32; (i % 3) as usize], vec![], vec![1, 2]]
        );
        assert_eq!(entry.get::<Hit>("hit").unwrap(), hit(i));
    }
}

#[test]
fn test_record_member_views() {
    let container = MemoryContainer::new();

    let mut builder = ModelBuilder::new();
    builder
        .make_typed_field("hit", Hit { energy: 0.0, cells: vec![] })
        .unwrap();
    let mut writer = Writer::create_in(builder.create(), "hits", container.clone(), WriteOptions::default()).unwrap();
    for i in 0..30 {
        writer.entry_mut().set("hit", hit(i)).unwrap();
        writer.fill().unwrap();
    }
    writer.close().unwrap();

    let reader = Reader::from_container("hits", Box::new(container), ReadOptions::default()).unwrap();
    let energy = reader.view::<f32>("hit.energy").unwrap();
    let cells = reader.view::<Vec<u32>>("hit.cells").unwrap();
    let whole = reader.view::<Hit>("hit").unwrap();
    assert_eq!(energy.path(), "hit.energy");
    assert_eq!(energy.len(), 30);

    for i in 0..30u32 {
        assert_eq!(energy.get(i as u64).unwrap(), hit(i).energy);
        assert_eq!(cells.get(i as u64).unwrap(), hit(i).cells);
        assert_eq!(whole.get(i as u64).unwrap(), hit(i));
    }
}

#[test]
fn test_strings_spanning_pages() {
    let container = MemoryContainer::new();

    let mut builder = ModelBuilder::new();
    builder.make_field("text", FieldType::String).unwrap();
    let options = WriteOptions::builder().elements_per_page(5).build();
    let mut writer = Writer::create_in(builder.create(), "text", container.clone(), options).unwrap();

    let texts: Vec<String> = (0..40).map(|i| "abcdefgh".repeat(i % 4) + &i.to_string()).collect();
    for (i, text) in texts.iter().enumerate() {
        writer.entry_mut().set("text", text.clone()).unwrap();
        writer.fill().unwrap();
        if i % 9 == 8 {
            writer.commit_cluster().unwrap();
        }
    }
    writer.close().unwrap();

    let reader = Reader::from_container("text", Box::new(container), ReadOptions::default()).unwrap();
    let view = reader.view::<String>("text").unwrap();
    let read: Vec<String> = view.iter().collect::<atlascol::Result<_>>().unwrap();
    assert_eq!(read, texts);
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_embedded_format_in_file() {
    let (_temp_dir, path) = setup_dir();

    let mut builder = ModelBuilder::new();
    builder.make_field("n", FieldType::U64).unwrap();
    let options = WriteOptions::builder()
        .container_format(ContainerFormat::Embedded)
        .build();
    let mut writer = Writer::create(builder.create(), "embedded", &path, options).unwrap();
    for i in 0..100u64 {
        writer.entry_mut().set("n", i * i).unwrap();
        writer.fill().unwrap();
    }
    writer.close().unwrap();

    let reader = Reader::open("embedded", &path).unwrap();
    assert_eq!(reader.descriptor().container_format(), ContainerFormat::Embedded);
    let n = reader.view::<u64>("n").unwrap();
    assert_eq!(n.get(99).unwrap(), 99 * 99);
}

#[test]
fn test_sink_variants_read_identically() {
    let mut stores = Vec::new();
    for (buffered, parallel, compression) in [
        (false, false, Compression::Lz4),
        (true, false, Compression::Lz4),
        (true, true, Compression::Lz4),
        (true, true, Compression::None),
    ] {
        let container = MemoryContainer::new();
        let mut builder = ModelBuilder::new();
        builder.make_field("x", FieldType::F64).unwrap();
        builder
            .make_field("ys", FieldType::sequence(FieldType::I32))
            .unwrap();
        let options = WriteOptions::builder()
            .elements_per_page(16)
            .use_buffered_sink(buffered)
            .parallel_compression(parallel)
            .compression(compression)
            .build();
        let mut writer = Writer::create_in(builder.create(), "v", container.clone(), options).unwrap();
        for i in 0..200i32 {
            writer.entry_mut().set("x", i as f64 / 3.0).unwrap();
            writer.entry_mut().set("ys", vec![i; i as usize % 6]).unwrap();
            writer.fill().unwrap();
            if i % 64 == 63 {
                writer.commit_cluster().unwrap();
            }
        }
        writer.close().unwrap();

        let reader = Reader::from_container("v", Box::new(container), ReadOptions::default()).unwrap();
        assert_eq!(reader.descriptor().compression(), compression);
        let x: Vec<f64> = reader.view::<f64>("x").unwrap().iter().map(|v| v.unwrap()).collect();
        let ys: Vec<Vec<i32>> = reader
            .view::<Vec<i32>>("ys")
            .unwrap()
            .iter()
            .map(|v| v.unwrap())
            .collect();
        stores.push((x, ys));
    }

    for store in &stores[1..] {
        assert_eq!(store, &stores[0]);
    }
}

#[test]
fn test_uncompressed_store_is_larger() {
    let mut sizes = Vec::new();
    for compression in [Compression::None, Compression::Lz4] {
        let container = MemoryContainer::new();
        let mut builder = ModelBuilder::new();
        builder.make_field("zeros", FieldType::U64).unwrap();
        let options = WriteOptions::builder().compression(compression).build();
        let mut writer = Writer::create_in(builder.create(), "z", container.clone(), options).unwrap();
        for _ in 0..5000 {
            writer.fill().unwrap();
        }
        writer.close().unwrap();
        sizes.push(container.to_vec().len());
    }
    assert!(sizes[1] < sizes[0]);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_drop_closes_writer() {
    let (_temp_dir, path) = setup_dir();

    {
        let mut builder = ModelBuilder::new();
        builder.make_field("i", FieldType::I32).unwrap();
        let mut writer = Writer::create(builder.create(), "dropped", &path, WriteOptions::default()).unwrap();
        for i in 0..10i32 {
            writer.entry_mut().set("i", i).unwrap();
            writer.fill().unwrap();
        }
        assert_eq!(writer.n_pending(), 10);
    }

    let reader = Reader::open("dropped", &path).unwrap();
    assert_eq!(reader.n_entries(), 10);
    assert_eq!(reader.view::<i32>("i").unwrap().get(9).unwrap(), 9);
}

#[test]
fn test_store_without_entries() {
    let (_temp_dir, path) = setup_dir();

    let mut builder = ModelBuilder::new();
    builder.make_field("i", FieldType::I32).unwrap();
    let mut writer = Writer::create(builder.create(), "empty", &path, WriteOptions::default()).unwrap();
    // Committing nothing does not create a cluster
    writer.commit_cluster().unwrap();
    writer.close().unwrap();

    let reader = Reader::open("empty", &path).unwrap();
    assert_eq!(reader.n_entries(), 0);
    assert_eq!(reader.descriptor().n_clusters(), 0);
    assert_eq!(reader.entry_range().count(), 0);
    assert!(reader.view::<i32>("i").unwrap().is_empty());
    assert_eq!(reader.model().n_fields(), 1);
}

#[test]
fn test_writer_descriptor_tracks_commits() {
    let container = MemoryContainer::new();
    let mut builder = ModelBuilder::new();
    builder.make_field("i", FieldType::I32).unwrap();
    let mut writer = Writer::create_in(builder.create(), "live", container, WriteOptions::default()).unwrap();

    writer.fill().unwrap();
    writer.fill().unwrap();
    assert_eq!(writer.descriptor().unwrap().n_clusters(), 0);

    writer.commit_cluster().unwrap();
    let descriptor = writer.descriptor().unwrap();
    assert_eq!(descriptor.n_clusters(), 1);
    assert_eq!(descriptor.n_entries(), 2);
    assert_eq!(writer.n_pending(), 0);
    writer.close().unwrap();
}
