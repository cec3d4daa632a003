//! Buffered sink
//!
//! Decorates another sink. Pages of the open cluster are staged in memory
//! per column; at cluster commit they are sealed (serially, or on the
//! compression pool when parallel compression is enabled) and forwarded to
//! the inner sink as one page set, grouped by column in column-id order.
//! Arrival order and task completion order never reach the inner sink.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::{Compression, WriteOptions};
use crate::descriptor::Descriptor;
use crate::error::{AtlasError, Result};
use crate::metrics::{Counter, Metrics};
use crate::model::{ClusterId, ColumnId, Model};
use crate::page::{Page, SealedPage};

use super::pool::CompressionPool;
use super::{PageSet, PageSink};

#[derive(Debug)]
enum Staged {
    Raw(Page),
    Sealed(SealedPage),
}

pub struct BufferedSink {
    inner: Box<dyn PageSink>,
    compression: Compression,
    max_page_size: usize,
    parallel: bool,
    pool: CompressionPool,

    /// Pages of the open cluster; each column's pages in arrival order
    staged: BTreeMap<ColumnId, Vec<Staged>>,
    next_cluster_id: ClusterId,

    metrics: Metrics,
    parallel_zip: Arc<Counter>,
    sz_zip: Arc<Counter>,
}

impl BufferedSink {
    pub fn new(inner: Box<dyn PageSink>, options: &WriteOptions) -> Result<Self> {
        let mut metrics = Metrics::new("BufferedSink");
        let parallel_zip = metrics.make_gauge(
            "ParallelZip",
            "",
            "1 if the last cluster was compressed concurrently on the worker pool",
        )?;
        let sz_zip = metrics.make_counter("szZip", "B", "unpacked bytes sealed by this sink")?;
        metrics.observe(inner.metrics());

        Ok(Self {
            inner,
            compression: options.compression,
            max_page_size: options.max_unzipped_page_size,
            parallel: options.parallel_compression,
            pool: CompressionPool::new(options.compression_workers),
            staged: BTreeMap::new(),
            next_cluster_id: 0,
            metrics,
            parallel_zip,
            sz_zip,
        })
    }

    /// Number of pages staged for the open cluster
    pub fn n_staged(&self) -> usize {
        self.staged.values().map(Vec::len).sum()
    }

    /// Seal the staged pages and group them by column
    fn seal_staged(&mut self) -> Result<(Vec<(ColumnId, Vec<SealedPage>)>, bool)> {
        let staged = std::mem::take(&mut self.staged);

        // Step 1: flatten in column-id order, pulling out the raw pages
        let mut slots: Vec<(ColumnId, Option<SealedPage>)> = Vec::new();
        let mut raw: Vec<Page> = Vec::new();
        let mut raw_slots: Vec<usize> = Vec::new();
        for (column, pages) in staged {
            for page in pages {
                match page {
                    Staged::Sealed(sealed) => slots.push((column, Some(sealed))),
                    Staged::Raw(page) => {
                        raw_slots.push(slots.len());
                        slots.push((column, None));
                        raw.push(page);
                    }
                }
            }
        }

        // Step 2: seal; concurrently only with two workers and two pages
        let use_pool = self.parallel && self.pool.workers() > 1 && raw.len() > 1;
        self.sz_zip.add(raw.iter().map(|p| p.size() as u64).sum());
        let sealed = if use_pool {
            self.pool.seal_all(raw, self.compression, self.max_page_size)?
        } else {
            raw.iter()
                .map(|p| p.seal(self.compression, self.max_page_size))
                .collect::<Result<Vec<_>>>()?
        };
        for (slot, page) in raw_slots.into_iter().zip(sealed) {
            slots[slot].1 = Some(page);
        }

        // Step 3: regroup
        let mut columns: Vec<(ColumnId, Vec<SealedPage>)> = Vec::new();
        for (column, page) in slots {
            let page = page.ok_or_else(|| {
                AtlasError::WriteFailure(format!("page of column {} was not sealed", column))
            })?;
            match columns.last_mut() {
                Some((c, pages)) if *c == column => pages.push(page),
                _ => columns.push((column, vec![page])),
            }
        }
        Ok((columns, use_pool))
    }
}

impl PageSink for BufferedSink {
    fn create(&mut self, model: Arc<Model>) -> Result<()> {
        self.inner.create(model)
    }

    fn commit_page(&mut self, page: Page) -> Result<()> {
        self.staged
            .entry(page.column())
            .or_default()
            .push(Staged::Raw(page));
        Ok(())
    }

    fn commit_sealed_page(&mut self, column: ColumnId, page: SealedPage) -> Result<()> {
        self.staged
            .entry(column)
            .or_default()
            .push(Staged::Sealed(page));
        Ok(())
    }

    fn commit_cluster(&mut self, n_entries: u64) -> Result<ClusterId> {
        let (columns, used_pool) = self.seal_staged()?;
        self.parallel_zip.set(used_pool as i64);

        let set = PageSet {
            cluster_id: self.next_cluster_id,
            n_entries,
            columns,
        };
        let n_pages = set.n_pages();
        let id = self.inner.commit_page_set(set)?;
        self.next_cluster_id = id + 1;

        debug!(
            cluster = id,
            pages = n_pages,
            parallel = used_pool,
            "Flushed buffered cluster"
        );
        Ok(id)
    }

    fn commit_page_set(&mut self, set: PageSet) -> Result<ClusterId> {
        if set.cluster_id != self.next_cluster_id {
            return Err(AtlasError::WriteFailure(format!(
                "page set for cluster {}, expected cluster {}",
                set.cluster_id, self.next_cluster_id
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
        if !self.staged.is_empty() {
            return Err(AtlasError::WriteFailure(format!(
                "{} staged pages without a closing cluster",
                self.n_staged()
            )));
        }
        self.inner.finalize()
    }

    fn descriptor(&self) -> Option<&Descriptor> {
        self.inner.descriptor()
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
