//! Tests for pages and page compression
//!
//! These tests verify:
//! - Element encoding into pages and decoding from unpacked buffers
//! - Sealing: compress only when smaller, checksum of the stored bytes
//! - Column writers sealing pages at capacity
//! - zip/unzip edge cases

use atlascol::model::{ColumnDescriptor, Value};
use atlascol::page::{unzip, zip, ColumnType, ColumnWriter, Page};
use atlascol::{AtlasError, Compression};

// =============================================================================
// Helper Functions
// =============================================================================

fn column(id: u32, element: ColumnType) -> ColumnDescriptor {
    ColumnDescriptor {
        id,
        element,
        field: 0,
        depth: 0,
    }
}

fn f64_page(n: usize) -> Page {
    let mut page = Page::new(0, ColumnType::F64, n);
    for i in 0..n {
        page.push_value(&Value::F64(i as f64 * 0.5)).unwrap();
    }
    page
}

// =============================================================================
// Page Tests
// =============================================================================

#[test]
fn test_sealed_page_unpacks_to_original() {
    let page = f64_page(2000);
    let sealed = page.seal(Compression::Lz4, 1 << 20).unwrap();

    let unpacked = unzip(sealed.codec, &sealed.bytes, sealed.uncompressed_size as usize).unwrap();
    assert_eq!(unpacked, page.as_bytes());
    assert_eq!(ColumnType::F64.decode(&unpacked, 3).unwrap(), Value::F64(1.5));
}

#[test]
fn test_page_from_bytes() {
    let page = f64_page(4);
    let copy = Page::from_bytes(0, ColumnType::F64, page.as_bytes()).unwrap();
    assert_eq!(copy.n_elements(), 4);

    let result = Page::from_bytes(0, ColumnType::F64, &page.as_bytes()[..7]);
    assert!(matches!(result, Err(AtlasError::Serialization(_))));
}

#[test]
fn test_tiny_page_stays_uncompressed() {
    let mut page = Page::new(0, ColumnType::I32, 1);
    page.push_value(&Value::I32(7)).unwrap();
    let sealed = page.seal(Compression::Lz4, 1 << 20).unwrap();

    assert!(!sealed.is_compressed());
    assert_eq!(sealed.codec, Compression::None);
    assert_eq!(sealed.bytes_on_storage(), 4);
}

#[test]
fn test_bool_and_unsigned_elements() {
    let mut page = Page::new(0, ColumnType::Bool, 2);
    page.push_value(&Value::Bool(true)).unwrap();
    page.push_value(&Value::Bool(false)).unwrap();
    assert_eq!(ColumnType::Bool.decode(page.as_bytes(), 0).unwrap(), Value::Bool(true));
    assert_eq!(ColumnType::Bool.decode(page.as_bytes(), 1).unwrap(), Value::Bool(false));

    let mut page = Page::new(1, ColumnType::U64, 1);
    page.push_value(&Value::U64(u64::MAX)).unwrap();
    assert_eq!(ColumnType::U64.decode(page.as_bytes(), 0).unwrap(), Value::U64(u64::MAX));
}

// =============================================================================
// Column Writer Tests
// =============================================================================

#[test]
fn test_column_writer_page_boundaries() {
    let mut writer = ColumnWriter::new(&column(2, ColumnType::F32), 100);
    let mut outbox = Vec::new();

    for i in 0..250 {
        writer.push_value(&Value::F32(i as f32), &mut outbox).unwrap();
    }
    assert_eq!(outbox.len(), 2);
    assert_eq!(writer.n_buffered(), 50);

    writer.flush(&mut outbox);
    assert_eq!(outbox.len(), 3);
    assert_eq!(writer.n_buffered(), 0);
    assert_eq!(writer.n_elements(), 250);

    let last = &outbox[2];
    assert_eq!(last.column(), 2);
    assert_eq!(ColumnType::F32.decode(last.as_bytes(), 49).unwrap(), Value::F32(249.0));
}

#[test]
fn test_offset_column_running_totals() {
    let mut writer = ColumnWriter::new(&column(0, ColumnType::Offset), 10);
    let mut outbox = Vec::new();
    for count in [3, 0, 4, 1] {
        writer.push_offset(count, &mut outbox).unwrap();
    }
    writer.flush(&mut outbox);

    let data = outbox[0].as_bytes();
    let totals: Vec<u64> = (0..4)
        .map(|i| ColumnType::decode_offset(data, i).unwrap())
        .collect();
    assert_eq!(totals, vec![3, 3, 7, 8]);
}

// =============================================================================
// Compression Tests
// =============================================================================

#[test]
fn test_zip_declines_incompressible_input() {
    let noise: Vec<u8> = (0..64u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
    assert!(zip(Compression::None, &noise).is_none());
    if let Some(compressed) = zip(Compression::Lz4, &noise) {
        assert!(compressed.len() < noise.len());
    }
}

#[test]
fn test_unzip_rejects_inconsistent_sizes() {
    let raw = vec![0u8; 1024];
    let compressed = zip(Compression::Lz4, &raw).unwrap();

    assert!(unzip(Compression::Lz4, &compressed, 1024).is_ok());
    assert!(unzip(Compression::Lz4, &compressed, 2048).is_err());
    assert!(unzip(Compression::None, &compressed, 1024).is_err());
    assert!(unzip(Compression::Lz4, &raw, 10).is_err());
}
