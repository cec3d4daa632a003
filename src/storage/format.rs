//! Preamble, store header and anchor
//!
//! The anchor is the fixed-size entry point of a stored store: it sits in
//! the last `ANCHOR_SIZE` bytes of the container and locates the header and
//! footer records.

use bytes::{Buf, BufMut, BytesMut};
use tracing::debug;

use crate::config::{Compression, ContainerFormat};
use crate::descriptor::{Descriptor, FooterRecord, HeaderRecord};
use crate::error::{AtlasError, Result};

use super::container::{ContainerReader, ContainerWriter};

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes opening the generic archive preamble
pub(crate) const PREAMBLE_MAGIC: &[u8; 4] = b"ATAR";

/// Magic bytes opening the store header
pub(crate) const HEADER_MAGIC: &[u8; 4] = b"ATNT";

/// Magic bytes closing the anchor
pub(crate) const ANCHOR_MAGIC: &[u8; 4] = b"ATNA";

/// Current container framing version
pub(crate) const VERSION: u16 = 1;

/// Store header size: Magic (4) + Version (2) + Format (1) + Codec (1)
pub(crate) const STORE_HEADER_SIZE: usize = 8;

/// Anchor size: two (seek u64, stored u32, unpacked u32) triples, two CRCs,
/// format, codec, padding (2) and magic
pub const ANCHOR_SIZE: usize = 48;

/// Upper bound on a preamble name
const MAX_NAME_LEN: usize = 4096;

// =============================================================================
// Write Side
// =============================================================================

/// Write the archive preamble carrying the store name
pub(crate) fn write_preamble(writer: &mut dyn ContainerWriter, name: &str) -> Result<()> {
    let mut buf = BytesMut::with_capacity(8 + name.len());
    buf.put_slice(PREAMBLE_MAGIC);
    buf.put_u32_le(name.len() as u32);
    buf.put_slice(name.as_bytes());
    writer.append(&buf)?;
    Ok(())
}

pub(crate) fn write_store_header(
    writer: &mut dyn ContainerWriter,
    format: ContainerFormat,
    compression: Compression,
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(STORE_HEADER_SIZE);
    buf.put_slice(HEADER_MAGIC);
    buf.put_u16_le(VERSION);
    buf.put_u8(format.to_u8());
    buf.put_u8(compression.to_u8());
    writer.append(&buf)?;
    Ok(())
}

// =============================================================================
// Anchor
// =============================================================================

/// Fixed-size trailer locating the header and footer records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub seek_header: u64,
    pub nbytes_header: u32,
    pub len_header: u32,
    pub seek_footer: u64,
    pub nbytes_footer: u32,
    pub len_footer: u32,
    pub crc_header: u32,
    pub crc_footer: u32,
    pub format: ContainerFormat,
    /// Codec of the header and footer records
    pub compression: Compression,
}

impl Anchor {
    pub fn encode(&self) -> [u8; ANCHOR_SIZE] {
        let mut buf = BytesMut::with_capacity(ANCHOR_SIZE);
        buf.put_u64_le(self.seek_header);
        buf.put_u32_le(self.nbytes_header);
        buf.put_u32_le(self.len_header);
        buf.put_u64_le(self.seek_footer);
        buf.put_u32_le(self.nbytes_footer);
        buf.put_u32_le(self.len_footer);
        buf.put_u32_le(self.crc_header);
        buf.put_u32_le(self.crc_footer);
        buf.put_u8(self.format.to_u8());
        buf.put_u8(self.compression.to_u8());
        buf.put_bytes(0, 2);
        buf.put_slice(ANCHOR_MAGIC);

        let mut out = [0u8; ANCHOR_SIZE];
        out.copy_from_slice(&buf);
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != ANCHOR_SIZE {
            return Err(AtlasError::CorruptDescriptor(format!(
                "anchor is {} bytes, expected {}",
                data.len(),
                ANCHOR_SIZE
            )));
        }
        if &data[ANCHOR_SIZE - 4..] != ANCHOR_MAGIC {
            return Err(AtlasError::CorruptDescriptor(format!(
                "invalid anchor magic: expected ATNA, got {:?}",
                &data[ANCHOR_SIZE - 4..]
            )));
        }

        let mut buf = data;
        let seek_header = buf.get_u64_le();
        let nbytes_header = buf.get_u32_le();
        let len_header = buf.get_u32_le();
        let seek_footer = buf.get_u64_le();
        let nbytes_footer = buf.get_u32_le();
        let len_footer = buf.get_u32_le();
        let crc_header = buf.get_u32_le();
        let crc_footer = buf.get_u32_le();
        let format = ContainerFormat::from_u8(buf.get_u8()).ok_or_else(|| {
            AtlasError::CorruptDescriptor("unknown container format in anchor".to_string())
        })?;
        let compression = Compression::from_u8(buf.get_u8()).ok_or_else(|| {
            AtlasError::CorruptDescriptor("unknown codec in anchor".to_string())
        })?;

        Ok(Self {
            seek_header,
            nbytes_header,
            len_header,
            seek_footer,
            nbytes_footer,
            len_footer,
            crc_header,
            crc_footer,
            format,
            compression,
        })
    }

    /// First byte after the header record; `None` if the fields overflow
    pub fn data_start(&self) -> Option<u64> {
        self.seek_header.checked_add(self.nbytes_header as u64)
    }

    /// First byte after the footer record; `None` if the fields overflow
    pub fn footer_end(&self) -> Option<u64> {
        self.seek_footer.checked_add(self.nbytes_footer as u64)
    }
}

// =============================================================================
// Read Side
// =============================================================================

/// Locate, decode and validate the descriptor of store `name`
///
/// A container that holds a different store yields `NotFound`; anything
/// unreadable or inconsistent yields `CorruptDescriptor`.
pub fn read_descriptor(reader: &mut dyn ContainerReader, name: &str) -> Result<Descriptor> {
    let size = reader.len();
    if size < (STORE_HEADER_SIZE + ANCHOR_SIZE) as u64 {
        return Err(AtlasError::CorruptDescriptor(format!(
            "container of {} bytes is too small to hold a store",
            size
        )));
    }

    // Step 1: framing at the front
    let head = read_corrupt(reader, 0, 8, "container head")?;
    let (format, store_header_at) = if &head[0..4] == PREAMBLE_MAGIC {
        let name_len = (&head[4..8]).get_u32_le() as usize;
        if name_len > MAX_NAME_LEN {
            return Err(AtlasError::CorruptDescriptor(format!(
                "preamble name length {} exceeds {}",
                name_len, MAX_NAME_LEN
            )));
        }
        let stored = read_corrupt(reader, 8, name_len, "preamble")?;
        if stored != name.as_bytes() {
            return Err(AtlasError::NotFound(format!(
                "container holds '{}', not '{}'",
                String::from_utf8_lossy(&stored),
                name
            )));
        }
        (ContainerFormat::Embedded, 8 + name_len as u64)
    } else {
        (ContainerFormat::Bare, 0)
    };

    let store_header = read_corrupt(reader, store_header_at, STORE_HEADER_SIZE, "store header")?;
    if &store_header[0..4] != HEADER_MAGIC {
        return Err(AtlasError::CorruptDescriptor(format!(
            "invalid store magic: expected ATNT, got {:?}",
            &store_header[0..4]
        )));
    }
    let version = (&store_header[4..6]).get_u16_le();
    if version != VERSION {
        return Err(AtlasError::CorruptDescriptor(format!(
            "unsupported container version {}",
            version
        )));
    }

    // Step 2: anchor at the back
    let anchor_bytes = read_corrupt(reader, size - ANCHOR_SIZE as u64, ANCHOR_SIZE, "anchor")?;
    let anchor = Anchor::decode(&anchor_bytes)?;
    if anchor.format != format || store_header[6] != format.to_u8() {
        return Err(AtlasError::CorruptDescriptor(format!(
            "framing says {:?} but anchor says {:?}",
            format, anchor.format
        )));
    }
    // The anchor carries no checksum of its own: every field is untrusted
    let records_end = size - ANCHOR_SIZE as u64;
    let out_of_bounds =
        || AtlasError::CorruptDescriptor("anchor record locations are out of bounds".to_string());
    let data_start = anchor.data_start().ok_or_else(out_of_bounds)?;
    let footer_end = anchor.footer_end().ok_or_else(out_of_bounds)?;
    let header_in_bounds = anchor.seek_header == store_header_at + STORE_HEADER_SIZE as u64;
    let footer_in_bounds = anchor.seek_footer >= data_start && footer_end == records_end;
    if !header_in_bounds || !footer_in_bounds {
        return Err(out_of_bounds());
    }

    // Step 3: records
    let header_bytes = read_corrupt(
        reader,
        anchor.seek_header,
        anchor.nbytes_header as usize,
        "header record",
    )?;
    let header: HeaderRecord = crate::descriptor::decode_record(
        "header record",
        &header_bytes,
        anchor.len_header,
        anchor.crc_header,
        anchor.compression,
    )?;
    if header.name != name {
        return Err(AtlasError::NotFound(format!(
            "container holds '{}', not '{}'",
            header.name, name
        )));
    }

    let footer_bytes = read_corrupt(
        reader,
        anchor.seek_footer,
        anchor.nbytes_footer as usize,
        "footer record",
    )?;
    let footer: FooterRecord = crate::descriptor::decode_record(
        "footer record",
        &footer_bytes,
        anchor.len_footer,
        anchor.crc_footer,
        anchor.compression,
    )?;

    // Step 4: cross-check
    let descriptor = Descriptor::from_records(header, footer, format)?;
    check_locators(&descriptor, data_start, anchor.seek_footer)?;

    debug!(
        name,
        entries = descriptor.n_entries(),
        clusters = descriptor.n_clusters(),
        "Loaded descriptor"
    );
    Ok(descriptor)
}

/// Every page and cluster span must fall inside the data region
fn check_locators(descriptor: &Descriptor, data_start: u64, data_end: u64) -> Result<()> {
    for cluster in descriptor.clusters() {
        let span = cluster.locator;
        let span_end = span.position.checked_add(span.len);
        let span_inside = matches!(span_end, Some(end) if span.position >= data_start && end <= data_end);
        if span.len > 0 && !span_inside {
            return Err(AtlasError::CorruptDescriptor(format!(
                "cluster {} spans {} bytes at {} outside the data region",
                cluster.id, span.len, span.position
            )));
        }
        for range in &cluster.page_ranges {
            for info in &range.page_infos {
                let loc = info.locator;
                let end = loc.position.checked_add(loc.bytes_on_storage as u64);
                let inside = matches!(end, Some(end) if loc.position >= data_start && end <= data_end);
                if !inside {
                    return Err(AtlasError::CorruptDescriptor(format!(
                        "page of column {} in cluster {} lies outside the data region",
                        range.column, cluster.id
                    )));
                }
            }
        }
    }
    Ok(())
}

fn read_corrupt(
    reader: &mut dyn ContainerReader,
    position: u64,
    len: usize,
    what: &str,
) -> Result<Vec<u8>> {
    reader
        .read_at(position, len)
        .map_err(|e| AtlasError::CorruptDescriptor(format!("{}: {}", what, e)))
}
