//! Page and SealedPage

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::Compression;
use crate::error::{AtlasError, Result};
use crate::model::{ColumnId, Value};

use super::compression::zip;
use super::element::ColumnType;

/// Open, in-memory run of consecutive column elements
#[derive(Debug)]
pub struct Page {
    column: ColumnId,
    element: ColumnType,
    n_elements: u32,
    buffer: BytesMut,
}

/// Sealed page: the exact bytes that go to storage plus their metadata
#[derive(Debug, Clone, PartialEq)]
pub struct SealedPage {
    /// Number of column elements in the page
    pub n_elements: u32,
    /// Size of the unpacked element buffer
    pub uncompressed_size: u32,
    /// Stored bytes (compressed if smaller than the unpacked buffer)
    pub bytes: Bytes,
    /// Codec that produced `bytes`; `None` when stored unpacked
    pub codec: Compression,
    /// CRC32 of `bytes`
    pub checksum: u32,
}

impl Page {
    /// Create an empty page sized for `capacity` elements
    pub fn new(column: ColumnId, element: ColumnType, capacity: usize) -> Self {
        Self {
            column,
            element,
            n_elements: 0,
            buffer: BytesMut::with_capacity(capacity * element.size()),
        }
    }

    /// Wrap an already packed element buffer
    pub fn from_bytes(column: ColumnId, element: ColumnType, data: &[u8]) -> Result<Self> {
        if data.len() % element.size() != 0 {
            return Err(AtlasError::Serialization(format!(
                "{} bytes is not a whole number of {:?} elements",
                data.len(),
                element
            )));
        }
        Ok(Self {
            column,
            element,
            n_elements: (data.len() / element.size()) as u32,
            buffer: BytesMut::from(data),
        })
    }

    pub fn column(&self) -> ColumnId {
        self.column
    }

    pub fn element(&self) -> ColumnType {
        self.element
    }

    pub fn n_elements(&self) -> u32 {
        self.n_elements
    }

    pub fn is_empty(&self) -> bool {
        self.n_elements == 0
    }

    /// Unpacked size in bytes
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    // -------------------------------------------------------------------------
    // Append
    // -------------------------------------------------------------------------

    pub fn push_value(&mut self, value: &Value) -> Result<()> {
        self.element.encode(value, &mut self.buffer)?;
        self.n_elements += 1;
        Ok(())
    }

    pub fn push_offset(&mut self, total: u64) -> Result<()> {
        self.expect_element(ColumnType::Offset)?;
        self.buffer.put_u64_le(total);
        self.n_elements += 1;
        Ok(())
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.expect_element(ColumnType::Byte)?;
        self.buffer.put_slice(bytes);
        self.n_elements += bytes.len() as u32;
        Ok(())
    }

    fn expect_element(&self, element: ColumnType) -> Result<()> {
        if self.element != element {
            return Err(AtlasError::Schema(format!(
                "column {} holds {:?} elements, not {:?}",
                self.column, self.element, element
            )));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Seal
    // -------------------------------------------------------------------------

    /// Compress the page into its storage form
    ///
    /// Fails if the unpacked page exceeds `max_size` bytes.
    pub fn seal(&self, compression: Compression, max_size: usize) -> Result<SealedPage> {
        if self.buffer.len() > max_size {
            return Err(AtlasError::WriteFailure(format!(
                "page of column {} is {} bytes, limit is {}",
                self.column,
                self.buffer.len(),
                max_size
            )));
        }

        let (bytes, codec) = match zip(compression, &self.buffer) {
            Some(compressed) => (Bytes::from(compressed), compression),
            None => (Bytes::copy_from_slice(&self.buffer), Compression::None),
        };
        let checksum = crc32fast::hash(&bytes);

        Ok(SealedPage {
            n_elements: self.n_elements,
            uncompressed_size: self.buffer.len() as u32,
            bytes,
            codec,
            checksum,
        })
    }
}

impl SealedPage {
    pub fn bytes_on_storage(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_compressed(&self) -> bool {
        (self.bytes.len() as u32) < self.uncompressed_size
    }
}
