//! Page source
//!
//! Resolves (column, global element index) to a loaded page through the
//! descriptor, reading and unpacking pages on demand. The most recent page
//! of every column is kept; with the cluster cache on, the whole byte span
//! of the active cluster is read once and every page of every requested
//! column is served from it.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::config::{ClusterCache, ReadOptions};
use crate::descriptor::{ByteRange, Descriptor, PageInfo};
use crate::error::{AtlasError, Result};
use crate::metrics::{Counter, Metrics};
use crate::model::{ClusterId, ColumnId, ElementSource, Value};
use crate::page::{unzip, ColumnType};
use crate::storage::ContainerReader;

/// An unpacked page
#[derive(Debug, Clone)]
struct LoadedPage {
    cluster: ClusterId,
    /// Global index of the first element
    first: u64,
    n_elements: u64,
    data: Bytes,
}

impl LoadedPage {
    fn contains(&self, index: u64) -> bool {
        index >= self.first && index < self.first + self.n_elements
    }
}

/// Pages of the active cluster
#[derive(Debug)]
struct ClusterPages {
    id: ClusterId,
    span: ByteRange,
    raw: Bytes,
    /// Unpacked pages keyed by (column, page number)
    pages: HashMap<(ColumnId, usize), Bytes>,
    /// Columns whose pages are all in `pages`
    loaded_columns: Vec<ColumnId>,
}

pub(crate) struct PageSource {
    container: Box<dyn ContainerReader>,
    descriptor: Arc<Descriptor>,
    options: ReadOptions,

    current: Vec<Option<LoadedPage>>,
    cluster: Option<ClusterPages>,

    metrics: Metrics,
    n_page_loaded: Arc<Counter>,
    n_page_populated: Arc<Counter>,
    n_cluster_loaded: Arc<Counter>,
    n_read: Arc<Counter>,
    sz_read_payload: Arc<Counter>,
    sz_unzip: Arc<Counter>,
}

impl PageSource {
    pub(crate) fn new(
        container: Box<dyn ContainerReader>,
        descriptor: Arc<Descriptor>,
        options: ReadOptions,
    ) -> Result<Self> {
        let mut metrics = Metrics::new("PageSource");
        let n_page_loaded = metrics.make_counter("nPageLoaded", "", "pages read and unpacked")?;
        let n_page_populated =
            metrics.make_counter("nPagePopulated", "", "pages made current for a column")?;
        let n_cluster_loaded =
            metrics.make_counter("nClusterLoaded", "", "clusters read by the cluster cache")?;
        let n_read = metrics.make_counter("nRead", "", "container read calls")?;
        let sz_read_payload = metrics.make_counter("szReadPayload", "B", "bytes read")?;
        let sz_unzip = metrics.make_counter("szUnzip", "B", "bytes produced by decompression")?;

        let n_columns = descriptor.model().n_columns();
        Ok(Self {
            container,
            descriptor,
            options,
            current: vec![None; n_columns],
            cluster: None,
            metrics,
            n_page_loaded,
            n_page_populated,
            n_cluster_loaded,
            n_read,
            sz_read_payload,
            sz_unzip,
        })
    }

    /// A second source over the same store with its own container handle,
    /// page state and counters
    pub(crate) fn try_clone(&self) -> Result<Self> {
        let container = self.container.try_clone()?;
        Self::new(container, self.descriptor.clone(), self.options.clone())
    }

    pub(crate) fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn element_type(&self, column: ColumnId) -> Result<ColumnType> {
        self.descriptor
            .model()
            .columns()
            .get(column as usize)
            .map(|c| c.element)
            .ok_or_else(|| AtlasError::Schema(format!("unknown column {}", column)))
    }

    // =========================================================================
    // Page resolution
    // =========================================================================

    /// Make the page holding global element `index` of `column` current
    fn page_for(&mut self, column: ColumnId, index: u64) -> Result<&LoadedPage> {
        let c = column as usize;
        if c >= self.current.len() {
            return Err(AtlasError::Schema(format!("unknown column {}", column)));
        }
        let hit = matches!(&self.current[c], Some(page) if page.contains(index));
        if !hit {
            let page = self.load(column, index)?;
            self.n_page_populated.inc();
            self.current[c] = Some(page);
        }
        self.current[c].as_ref().ok_or_else(|| {
            AtlasError::InvalidState(format!("no current page for column {}", column))
        })
    }

    fn load(&mut self, column: ColumnId, index: u64) -> Result<LoadedPage> {
        // Step 1: descriptor lookup
        let descriptor = self.descriptor.clone();
        let cluster_id = descriptor
            .find_cluster_for_element(column, index)
            .ok_or_else(|| {
                AtlasError::CorruptDescriptor(format!(
                    "element {} of column {} is not covered by any cluster",
                    index, column
                ))
            })?;
        let cluster = descriptor.cluster(cluster_id).ok_or_else(|| {
            AtlasError::CorruptDescriptor(format!("missing cluster {}", cluster_id))
        })?;
        let (range, pages) = match (cluster.column_range(column), cluster.page_range(column)) {
            (Some(range), Some(pages)) => (range, pages),
            _ => {
                return Err(AtlasError::CorruptDescriptor(format!(
                    "cluster {} has no range for column {}",
                    cluster_id, column
                )))
            }
        };
        let (page_no, first_local, info) = pages
            .find(index - range.first_element_index)
            .ok_or_else(|| AtlasError::CorruptPage {
                column,
                cluster: cluster_id,
                reason: format!("no page holds element {}", index),
            })?;

        // Step 2: bytes
        let data = match self.options.cluster_cache {
            ClusterCache::On => self.cached_page(cluster_id, column, page_no)?,
            ClusterCache::Off => {
                let stored = self.read(info.locator.position, info.locator.bytes_on_storage as usize)
                    .map_err(|e| corrupt(column, cluster_id, e))?;
                self.unpack(cluster_id, column, info, &stored)?
            }
        };

        Ok(LoadedPage {
            cluster: cluster_id,
            first: range.first_element_index + first_local,
            n_elements: info.n_elements as u64,
            data,
        })
    }

    // =========================================================================
    // Cluster cache
    // =========================================================================

    fn cached_page(&mut self, cluster_id: ClusterId, column: ColumnId, page_no: usize) -> Result<Bytes> {
        let active = self.cluster.as_ref().map(|c| c.id);
        if active != Some(cluster_id) {
            self.load_cluster(cluster_id)?;
        }
        let loaded = self
            .cluster
            .as_ref()
            .map(|c| c.loaded_columns.contains(&column))
            .unwrap_or(false);
        if !loaded {
            self.populate_column(cluster_id, column)?;
        }

        self.cluster
            .as_ref()
            .and_then(|c| c.pages.get(&(column, page_no)).cloned())
            .ok_or_else(|| AtlasError::CorruptPage {
                column,
                cluster: cluster_id,
                reason: format!("page {} missing from cluster cache", page_no),
            })
    }

    /// Read the byte span of a cluster, replacing the previous one
    fn load_cluster(&mut self, cluster_id: ClusterId) -> Result<()> {
        let span = self
            .descriptor
            .cluster(cluster_id)
            .map(|c| c.locator)
            .unwrap_or_default();
        let raw = self.read(span.position, span.len as usize).map_err(|e| {
            AtlasError::CorruptDescriptor(format!("cluster {}: {}", cluster_id, e))
        })?;

        // Columns that were active stay active in the new cluster
        let previous = self
            .cluster
            .take()
            .map(|c| c.loaded_columns)
            .unwrap_or_default();
        self.cluster = Some(ClusterPages {
            id: cluster_id,
            span,
            raw: Bytes::from(raw),
            pages: HashMap::new(),
            loaded_columns: Vec::new(),
        });
        self.n_cluster_loaded.inc();

        for column in previous {
            self.populate_column(cluster_id, column)?;
        }
        Ok(())
    }

    /// Unpack all pages of `column` from the active cluster span
    fn populate_column(&mut self, cluster_id: ClusterId, column: ColumnId) -> Result<()> {
        let descriptor = self.descriptor.clone();
        let infos = descriptor
            .cluster(cluster_id)
            .and_then(|c| c.page_range(column))
            .map(|r| r.page_infos.as_slice())
            .unwrap_or_default();

        let mut unpacked = Vec::with_capacity(infos.len());
        if let Some(cached) = self.cluster.as_ref() {
            for (page_no, info) in infos.iter().enumerate() {
                let start = info.locator.position.checked_sub(cached.span.position);
                let end = start.map(|s| s + info.locator.bytes_on_storage as u64);
                let stored = match (start, end) {
                    (Some(s), Some(e)) if e <= cached.raw.len() as u64 => {
                        cached.raw.slice(s as usize..e as usize)
                    }
                    _ => {
                        return Err(AtlasError::CorruptPage {
                            column,
                            cluster: cluster_id,
                            reason: format!("page {} lies outside the cluster span", page_no),
                        })
                    }
                };
                unpacked.push((page_no, info, stored));
            }
        }

        let mut pages = Vec::with_capacity(unpacked.len());
        for (page_no, info, stored) in unpacked {
            pages.push((page_no, self.unpack(cluster_id, column, info, &stored)?));
        }
        if let Some(cached) = self.cluster.as_mut() {
            for (page_no, data) in pages {
                cached.pages.insert((column, page_no), data);
            }
            cached.loaded_columns.push(column);
        }
        Ok(())
    }

    /// Items owned by earlier clusters, if `index` opens its cluster
    ///
    /// Offsets are running totals, so the total preceding a cluster's first
    /// offset equals the first element index of the item column, which is
    /// always allocated right after its offset column. This keeps the read
    /// inside the active cluster.
    fn cluster_item_start(&self, column: ColumnId, index: u64) -> Option<u64> {
        let columns = self.descriptor.model().columns();
        let (offsets, items) = (columns.get(column as usize)?, columns.get(column as usize + 1)?);
        if items.field != offsets.field || items.depth != offsets.depth + 1 {
            return None;
        }

        let cluster_id = self.descriptor.find_cluster_for_element(column, index)?;
        let cluster = self.descriptor.cluster(cluster_id)?;
        if cluster.column_range(column)?.first_element_index != index {
            return None;
        }
        cluster.column_range(items.id).map(|r| r.first_element_index)
    }

    // =========================================================================
    // I/O
    // =========================================================================

    fn read(&mut self, position: u64, len: usize) -> Result<Vec<u8>> {
        let data = self.container.read_at(position, len)?;
        self.n_read.inc();
        self.sz_read_payload.add(len as u64);
        Ok(data)
    }

    /// Verify and decompress one stored page
    fn unpack(
        &self,
        cluster: ClusterId,
        column: ColumnId,
        info: &PageInfo,
        stored: &[u8],
    ) -> Result<Bytes> {
        if self.options.verify_checksums && crc32fast::hash(stored) != info.checksum {
            return Err(AtlasError::CorruptPage {
                column,
                cluster,
                reason: "checksum mismatch".to_string(),
            });
        }
        let size = info.locator.uncompressed_size as usize;
        let data = unzip(self.descriptor.compression(), stored, size)
            .map_err(|e| corrupt(column, cluster, e))?;
        if stored.len() < size {
            self.sz_unzip.add(size as u64);
        }
        self.n_page_loaded.inc();
        Ok(Bytes::from(data))
    }
}

fn corrupt(column: ColumnId, cluster: ClusterId, e: AtlasError) -> AtlasError {
    AtlasError::CorruptPage {
        column,
        cluster,
        reason: e.to_string(),
    }
}

impl ElementSource for PageSource {
    fn value(&mut self, column: ColumnId, index: u64) -> Result<Value> {
        let element = self.element_type(column)?;
        let page = self.page_for(column, index)?;
        element
            .decode(&page.data, (index - page.first) as usize)
            .map_err(|e| corrupt(column, page.cluster, e))
    }

    fn offset(&mut self, column: ColumnId, index: u64) -> Result<u64> {
        let page = self.page_for(column, index)?;
        ColumnType::decode_offset(&page.data, (index - page.first) as usize)
            .map_err(|e| corrupt(column, page.cluster, e))
    }

    fn offset_before(&mut self, column: ColumnId, index: u64) -> Result<u64> {
        if index == 0 {
            return Ok(0);
        }
        match self.cluster_item_start(column, index) {
            Some(start) => Ok(start),
            None => self.offset(column, index - 1),
        }
    }

    fn bytes(&mut self, column: ColumnId, start: u64, len: u64) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len as usize);
        let end = start + len;
        let mut index = start;
        while index < end {
            let page = self.page_for(column, index)?;
            let from = (index - page.first) as usize;
            let to = (end.min(page.first + page.n_elements) - page.first) as usize;
            let chunk = page.data.get(from..to).ok_or_else(|| AtlasError::CorruptPage {
                column,
                cluster: page.cluster,
                reason: format!("byte range {}..{} outside page", from, to),
            })?;
            out.extend_from_slice(chunk);
            index += (to - from) as u64;
        }
        Ok(out)
    }
}
