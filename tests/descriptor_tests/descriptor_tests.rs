//! Tests for the descriptor and its persisted form
//!
//! These tests verify:
//! - Cluster and page records built during writing
//! - Entry and element lookups
//! - Anchor/header/footer round trip through a container
//! - Corrupt or mismatched metadata rejected at open time

use atlascol::descriptor::{ByteRange, DescriptorBuilder, FooterRecord, HeaderRecord};
use atlascol::storage::{read_descriptor, ContainerReader, MemoryContainer, ANCHOR_SIZE};
use atlascol::{
    AtlasError, Compression, ContainerFormat, FieldType, ModelBuilder, WriteOptions, Writer,
};

// =============================================================================
// Helper Functions
// =============================================================================

/// Write `clusters` clusters of `per_cluster` entries into a memory container
fn write_store(format: ContainerFormat, clusters: u64, per_cluster: u64) -> MemoryContainer {
    let mut builder = ModelBuilder::new();
    builder.make_field("id", FieldType::U64).unwrap();
    builder
        .make_field("tracks", FieldType::sequence(FieldType::F32))
        .unwrap();

    let container = MemoryContainer::new();
    let options = WriteOptions::builder()
        .container_format(format)
        .elements_per_page(8)
        .build();
    let mut writer = Writer::create_in(builder.create(), "events", container.clone(), options).unwrap();

    let mut id = 0u64;
    for _ in 0..clusters {
        for _ in 0..per_cluster {
            writer.entry_mut().set("id", id).unwrap();
            writer
                .entry_mut()
                .set("tracks", vec![id as f32; (id % 3) as usize])
                .unwrap();
            writer.fill().unwrap();
            id += 1;
        }
        writer.commit_cluster().unwrap();
    }
    writer.close().unwrap();
    container
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_descriptor_round_trip() {
    let container = write_store(ContainerFormat::Bare, 3, 10);
    let mut reader = container.clone();
    let descriptor = read_descriptor(&mut reader, "events").unwrap();

    assert_eq!(descriptor.name(), "events");
    assert_eq!(descriptor.n_entries(), 30);
    assert_eq!(descriptor.n_clusters(), 3);
    assert_eq!(descriptor.compression(), Compression::Lz4);
    assert_eq!(descriptor.model().n_columns(), 3);

    for (i, cluster) in descriptor.clusters().iter().enumerate() {
        assert_eq!(cluster.id, i as u64);
        assert_eq!(cluster.first_entry, i as u64 * 10);
        assert_eq!(cluster.n_entries, 10);
        // 10 entries at 8 elements per page
        assert_eq!(cluster.page_range(0).unwrap().page_infos.len(), 2);
    }
}

#[test]
fn test_item_column_ranges_follow_offsets() {
    let container = write_store(ContainerFormat::Bare, 2, 6);
    let mut reader = container.clone();
    let descriptor = read_descriptor(&mut reader, "events").unwrap();

    // Entry i holds i % 3 tracks: 0+1+2+0+1+2 per six entries
    let first = descriptor.cluster(0).unwrap().column_range(2).unwrap();
    let second = descriptor.cluster(1).unwrap().column_range(2).unwrap();
    assert_eq!((first.first_element_index, first.n_elements), (0, 6));
    assert_eq!((second.first_element_index, second.n_elements), (6, 6));

    assert_eq!(descriptor.find_cluster_for_element(2, 5), Some(0));
    assert_eq!(descriptor.find_cluster_for_element(2, 6), Some(1));
    assert_eq!(descriptor.find_cluster_for_element(2, 12), None);
}

#[test]
fn test_find_cluster_for_entry() {
    let container = write_store(ContainerFormat::Bare, 4, 5);
    let mut reader = container.clone();
    let descriptor = read_descriptor(&mut reader, "events").unwrap();

    assert_eq!(descriptor.find_cluster_for_entry(0), Some(0));
    assert_eq!(descriptor.find_cluster_for_entry(4), Some(0));
    assert_eq!(descriptor.find_cluster_for_entry(5), Some(1));
    assert_eq!(descriptor.find_cluster_for_entry(19), Some(3));
    assert_eq!(descriptor.find_cluster_for_entry(20), None);
}

#[test]
fn test_cluster_locator_spans_its_pages() {
    let container = write_store(ContainerFormat::Bare, 2, 20);
    let mut reader = container.clone();
    let descriptor = read_descriptor(&mut reader, "events").unwrap();

    for cluster in descriptor.clusters() {
        let ByteRange { position, len } = cluster.locator;
        for range in &cluster.page_ranges {
            for info in &range.page_infos {
                assert!(info.locator.position >= position);
                assert!(
                    info.locator.position + info.locator.bytes_on_storage as u64 <= position + len
                );
            }
        }
    }
}

#[test]
fn test_summary_lists_fields_and_clusters() {
    let container = write_store(ContainerFormat::Bare, 2, 3);
    let mut reader = container.clone();
    let descriptor = read_descriptor(&mut reader, "events").unwrap();

    let summary = descriptor.summary();
    assert!(summary.contains("Store 'events'"));
    assert!(summary.contains("tracks: sequence<f32>"));
    assert!(summary.contains("#1 entries [3, 6)"));
    assert!(descriptor.page_listing(1).is_some());
    assert!(descriptor.page_listing(2).is_none());
}

#[test]
fn test_empty_store() {
    let container = write_store(ContainerFormat::Bare, 0, 0);
    let mut reader = container.clone();
    let descriptor = read_descriptor(&mut reader, "events").unwrap();
    assert_eq!(descriptor.n_entries(), 0);
    assert_eq!(descriptor.n_clusters(), 0);
    assert_eq!(descriptor.find_cluster_for_entry(0), None);
}

// =============================================================================
// Container Format Tests
// =============================================================================

#[test]
fn test_embedded_format_carries_name() {
    let container = write_store(ContainerFormat::Embedded, 1, 4);
    assert_eq!(&container.to_vec()[..4], b"ATAR");

    let mut reader = container.clone();
    let descriptor = read_descriptor(&mut reader, "events").unwrap();
    assert_eq!(descriptor.container_format(), ContainerFormat::Embedded);
    assert_eq!(descriptor.n_entries(), 4);
}

#[test]
fn test_wrong_name_is_not_found() {
    for format in [ContainerFormat::Bare, ContainerFormat::Embedded] {
        let mut reader = write_store(format, 1, 2);
        let result = read_descriptor(&mut reader, "other");
        assert!(matches!(result, Err(AtlasError::NotFound(_))), "{:?}", format);
    }
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_truncated_container() {
    let container = write_store(ContainerFormat::Bare, 1, 2);
    let bytes = container.to_vec();
    let mut truncated = MemoryContainer::from_bytes(bytes[..bytes.len() - 10].to_vec());
    assert!(matches!(
        read_descriptor(&mut truncated, "events"),
        Err(AtlasError::CorruptDescriptor(_))
    ));

    let mut tiny = MemoryContainer::from_bytes(b"ATNT".to_vec());
    assert!(matches!(
        read_descriptor(&mut tiny, "events"),
        Err(AtlasError::CorruptDescriptor(_))
    ));
}

#[test]
fn test_corrupt_anchor_magic() {
    let container = write_store(ContainerFormat::Bare, 1, 2);
    container.modify(|bytes| {
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
    });
    let mut reader = container.clone();
    assert!(matches!(
        read_descriptor(&mut reader, "events"),
        Err(AtlasError::CorruptDescriptor(_))
    ));
}

#[test]
fn test_overflowing_anchor_fields() {
    // (offset within the anchor, planted u64): seek_footer near the top of
    // the address space, then seek_header likewise
    for (offset, planted) in [(16usize, u64::MAX - 3), (0usize, u64::MAX - 1)] {
        let container = write_store(ContainerFormat::Bare, 1, 2);
        container.modify(|bytes| {
            let at = bytes.len() - ANCHOR_SIZE + offset;
            bytes[at..at + 8].copy_from_slice(&planted.to_le_bytes());
        });
        let mut reader = container.clone();
        assert!(
            matches!(
                read_descriptor(&mut reader, "events"),
                Err(AtlasError::CorruptDescriptor(_))
            ),
            "anchor offset {}",
            offset
        );
    }
}

#[test]
fn test_corrupt_footer_bytes() {
    let container = write_store(ContainerFormat::Bare, 2, 5);
    container.modify(|bytes| {
        // Last byte of the footer record, just before the anchor
        let at = bytes.len() - ANCHOR_SIZE - 1;
        bytes[at] ^= 0x5a;
    });
    let mut reader = container.clone();
    assert!(matches!(
        read_descriptor(&mut reader, "events"),
        Err(AtlasError::CorruptDescriptor(_))
    ));
}

#[test]
fn test_inconsistent_footer_rejected() {
    let mut builder = ModelBuilder::new();
    builder.make_field("x", FieldType::I32).unwrap();
    let model = std::sync::Arc::new(builder.create());

    let mut descriptor_builder = DescriptorBuilder::new(
        "bad",
        ContainerFormat::Bare,
        Compression::None,
        model,
    );
    descriptor_builder
        .record_cluster(0, 0, 5, ByteRange::default())
        .unwrap();
    // No pages recorded for column 0 although the cluster holds 5 entries
    let descriptor = descriptor_builder.into_descriptor();
    assert!(matches!(
        descriptor.validate(),
        Err(AtlasError::CorruptDescriptor(_))
    ));

    let header = HeaderRecord::from_descriptor(&descriptor);
    let footer = FooterRecord::from_descriptor(&descriptor);
    assert!(atlascol::Descriptor::from_records(header, footer, ContainerFormat::Bare).is_err());
}

#[test]
fn test_container_reader_bounds() {
    let mut container = write_store(ContainerFormat::Bare, 1, 1);
    let len = ContainerReader::len(&container);
    assert!(container.read_at(len - 4, 4).is_ok());
    assert!(container.read_at(len - 4, 5).is_err());
}
