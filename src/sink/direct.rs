//! Direct sink
//!
//! Seals pages synchronously and appends them to the container in arrival
//! order; the descriptor mirrors the write order exactly.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{Compression, ContainerFormat, WriteOptions};
use crate::descriptor::{
    encode_record, ByteRange, Descriptor, DescriptorBuilder, EncodedRecord, FooterRecord,
    HeaderRecord, Locator, PageInfo,
};
use crate::error::{AtlasError, Result};
use crate::metrics::{Counter, Metrics};
use crate::model::{ClusterId, ColumnId, Model};
use crate::page::{Page, SealedPage};
use crate::storage::{write_preamble, write_store_header, Anchor, ContainerWriter};

use super::{PageSet, PageSink};

/// Header record location, kept for the anchor
#[derive(Debug, Clone, Copy)]
struct HeaderLocation {
    seek: u64,
    nbytes: u32,
    len: u32,
    crc: u32,
}

/// Sink writing straight into a container
pub struct DirectSink<C: ContainerWriter> {
    name: String,
    container: C,
    container_format: ContainerFormat,
    compression: Compression,
    max_page_size: usize,

    /// Set by `create`
    builder: Option<DescriptorBuilder>,
    header: Option<HeaderLocation>,

    /// Pages of the open cluster, per column
    pending: Vec<Vec<PageInfo>>,
    /// `[min page offset, max page end)` of the open cluster
    cluster_span: Option<(u64, u64)>,
    finalized: bool,

    metrics: Metrics,
    n_page_committed: Arc<Counter>,
    sz_write_payload: Arc<Counter>,
    sz_zip: Arc<Counter>,
}

impl<C: ContainerWriter> DirectSink<C> {
    pub fn new(name: &str, container: C, options: &WriteOptions) -> Result<Self> {
        let mut metrics = Metrics::new("DirectSink");
        let n_page_committed =
            metrics.make_counter("nPageCommitted", "", "number of pages written")?;
        let sz_write_payload =
            metrics.make_counter("szWritePayload", "B", "page bytes written to storage")?;
        let sz_zip = metrics.make_counter("szZip", "B", "unpacked bytes sealed by this sink")?;

        Ok(Self {
            name: name.to_string(),
            container,
            container_format: options.container_format,
            compression: options.compression,
            max_page_size: options.max_unzipped_page_size,
            builder: None,
            header: None,
            pending: Vec::new(),
            cluster_span: None,
            finalized: false,
            metrics,
            n_page_committed,
            sz_write_payload,
            sz_zip,
        })
    }

    /// The underlying container
    pub fn container(&self) -> &C {
        &self.container
    }

    fn builder_mut(&mut self) -> Result<&mut DescriptorBuilder> {
        if self.finalized {
            return Err(AtlasError::InvalidState(format!(
                "sink for '{}' is finalized",
                self.name
            )));
        }
        self.builder.as_mut().ok_or_else(|| {
            AtlasError::InvalidState("page sink used before create".to_string())
        })
    }

    fn append_record(&mut self, record: &EncodedRecord) -> Result<u64> {
        self.container.append(&record.bytes)
    }
}

impl<C: ContainerWriter> PageSink for DirectSink<C> {
    fn create(&mut self, model: Arc<Model>) -> Result<()> {
        if self.builder.is_some() {
            return Err(AtlasError::InvalidState(format!(
                "sink for '{}' already created",
                self.name
            )));
        }

        // Step 1: framing
        if self.container_format == ContainerFormat::Embedded {
            write_preamble(&mut self.container, &self.name)?;
        }
        write_store_header(&mut self.container, self.container_format, self.compression)?;

        // Step 2: schema record
        let builder = DescriptorBuilder::new(
            &self.name,
            self.container_format,
            self.compression,
            model.clone(),
        );
        let record = encode_record(
            &HeaderRecord::from_descriptor(builder.descriptor()),
            self.compression,
        )?;
        let seek = self.append_record(&record)?;
        self.header = Some(HeaderLocation {
            seek,
            nbytes: record.bytes.len() as u32,
            len: record.uncompressed_len,
            crc: record.checksum,
        });

        self.pending = vec![Vec::new(); model.n_columns()];
        self.builder = Some(builder);

        info!(
            name = %self.name,
            format = ?self.container_format,
            columns = model.n_columns(),
            "Created store"
        );
        Ok(())
    }

    fn commit_page(&mut self, page: Page) -> Result<()> {
        let sealed = page.seal(self.compression, self.max_page_size)?;
        self.sz_zip.add(page.size() as u64);
        self.commit_sealed_page(page.column(), sealed)
    }

    fn commit_sealed_page(&mut self, column: ColumnId, page: SealedPage) -> Result<()> {
        let n_columns = self.builder_mut()?.descriptor().model().n_columns();
        if column as usize >= n_columns {
            return Err(AtlasError::WriteFailure(format!(
                "page for unknown column {}",
                column
            )));
        }

        let position = self.container.append(&page.bytes)?;
        let end = position + page.bytes.len() as u64;
        self.cluster_span = Some(match self.cluster_span {
            Some((lo, hi)) => (lo.min(position), hi.max(end)),
            None => (position, end),
        });

        self.pending[column as usize].push(PageInfo {
            n_elements: page.n_elements,
            locator: Locator {
                position,
                bytes_on_storage: page.bytes_on_storage(),
                uncompressed_size: page.uncompressed_size,
            },
            checksum: page.checksum,
        });

        self.n_page_committed.inc();
        self.sz_write_payload.add(page.bytes.len() as u64);
        Ok(())
    }

    fn commit_cluster(&mut self, n_entries: u64) -> Result<ClusterId> {
        if n_entries == 0 {
            return Err(AtlasError::WriteFailure(
                "cannot commit a cluster without entries".to_string(),
            ));
        }
        let span = self
            .cluster_span
            .take()
            .map(|(lo, hi)| ByteRange {
                position: lo,
                len: hi - lo,
            })
            .unwrap_or_default();
        let pending = std::mem::take(&mut self.pending);
        let n_columns = pending.len();

        let builder = self.builder_mut()?;
        let id = builder.next_cluster_id();
        let first_entry = builder.descriptor().n_entries();
        builder.record_cluster(id, first_entry, n_entries, span)?;
        let mut n_pages = 0;
        for (column, infos) in pending.into_iter().enumerate() {
            n_pages += infos.len();
            builder.record_page_range(id, column as ColumnId, infos)?;
        }
        self.pending = vec![Vec::new(); n_columns];

        debug!(
            cluster = id,
            first_entry,
            entries = n_entries,
            pages = n_pages,
            bytes = span.len,
            "Committed cluster"
        );
        Ok(id)
    }

    fn commit_page_set(&mut self, set: PageSet) -> Result<ClusterId> {
        let expected = self.builder_mut()?.next_cluster_id();
        if set.cluster_id != expected {
            return Err(AtlasError::WriteFailure(format!(
                "page set for cluster {}, expected cluster {}",
                set.cluster_id, expected
            )));
        }
        for (column, pages) in set.columns {
            for page in pages {
                self.commit_sealed_page(column, page)?;
            }
        }
        self.commit_cluster(set.n_entries)
    }

    fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        let header = self.header.ok_or_else(|| {
            AtlasError::InvalidState("page sink finalized before create".to_string())
        })?;
        if self.pending.iter().any(|p| !p.is_empty()) {
            return Err(AtlasError::WriteFailure(
                "pages committed without a closing cluster".to_string(),
            ));
        }

        let compression = self.compression;
        let descriptor = self.builder_mut()?.descriptor();
        let footer = encode_record(&FooterRecord::from_descriptor(descriptor), compression)?;
        let (n_entries, n_clusters) = (descriptor.n_entries(), descriptor.n_clusters());

        let seek_footer = self.append_record(&footer)?;
        let anchor = Anchor {
            seek_header: header.seek,
            nbytes_header: header.nbytes,
            len_header: header.len,
            seek_footer,
            nbytes_footer: footer.bytes.len() as u32,
            len_footer: footer.uncompressed_len,
            crc_header: header.crc,
            crc_footer: footer.checksum,
            format: self.container_format,
            compression: self.compression,
        };
        self.container.append(&anchor.encode())?;
        self.container.sync()?;
        self.finalized = true;

        info!(
            name = %self.name,
            entries = n_entries,
            clusters = n_clusters,
            bytes = self.container.position(),
            "Finalized store"
        );
        Ok(())
    }

    fn descriptor(&self) -> Option<&Descriptor> {
        self.builder.as_ref().map(|b| b.descriptor())
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
