//! Cluster and page metadata records

use serde::{Deserialize, Serialize};

use crate::model::{ClusterId, ColumnId, EntryIndex};

/// Where a page's stored bytes live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// Byte offset in the container
    pub position: u64,
    /// Stored (possibly compressed) length
    pub bytes_on_storage: u32,
    /// Unpacked element buffer length
    pub uncompressed_size: u32,
}

/// Byte span `[position, position + len)` in the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ByteRange {
    pub position: u64,
    pub len: u64,
}

/// One page of one column within a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub n_elements: u32,
    pub locator: Locator,
    /// CRC32 of the stored bytes
    pub checksum: u32,
}

/// Ordered pages of one column within one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub column: ColumnId,
    pub page_infos: Vec<PageInfo>,
    /// First cluster-local element index of each page
    #[serde(skip)]
    starts: Vec<u64>,
}

impl PageRange {
    pub fn new(column: ColumnId, page_infos: Vec<PageInfo>) -> Self {
        let mut range = Self {
            column,
            page_infos,
            starts: Vec::new(),
        };
        range.rebuild_index();
        range
    }

    /// Recompute the per-page start index after deserialization
    pub(crate) fn rebuild_index(&mut self) {
        self.starts.clear();
        let mut first = 0u64;
        for info in &self.page_infos {
            self.starts.push(first);
            first += info.n_elements as u64;
        }
    }

    /// Total elements across all pages
    pub fn n_elements(&self) -> u64 {
        self.page_infos.iter().map(|p| p.n_elements as u64).sum()
    }

    /// Find the page covering cluster-local element `index`
    ///
    /// Returns `(page number, first local index in that page, page info)`.
    pub fn find(&self, index: u64) -> Option<(usize, u64, &PageInfo)> {
        // Last page starting at or before `index`; skip empty pages
        let pos = self.starts.partition_point(|&start| start <= index);
        let page_no = pos.checked_sub(1)?;
        let info = self.page_infos.get(page_no)?;
        let first = self.starts[page_no];
        (index < first + info.n_elements as u64).then_some((page_no, first, info))
    }
}

/// Global element span of one column within one cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnRange {
    pub column: ColumnId,
    pub first_element_index: u64,
    pub n_elements: u64,
}

impl ColumnRange {
    pub fn contains(&self, index: u64) -> bool {
        index >= self.first_element_index && index < self.first_element_index + self.n_elements
    }
}

/// A committed, contiguous run of entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDescriptor {
    pub id: ClusterId,
    pub first_entry: EntryIndex,
    pub n_entries: u64,
    /// Span of all page bytes of this cluster
    pub locator: ByteRange,
    /// Indexed by column id
    pub column_ranges: Vec<ColumnRange>,
    /// Indexed by column id
    pub page_ranges: Vec<PageRange>,
}

impl ClusterDescriptor {
    pub fn contains_entry(&self, entry: EntryIndex) -> bool {
        entry >= self.first_entry && entry < self.first_entry + self.n_entries
    }

    pub fn column_range(&self, column: ColumnId) -> Option<&ColumnRange> {
        self.column_ranges.get(column as usize)
    }

    pub fn page_range(&self, column: ColumnId) -> Option<&PageRange> {
        self.page_ranges.get(column as usize)
    }

    /// Number of pages across all columns
    pub fn n_pages(&self) -> usize {
        self.page_ranges.iter().map(|r| r.page_infos.len()).sum()
    }
}
