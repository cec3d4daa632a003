//! Sink Module
//!
//! Page sinks persist pages and record their locators in the descriptor.
//!
//! ## Responsibilities
//! - Write the store header on create, the footer and anchor on finalize
//! - Seal (compress) pages and append them to the container
//! - Close clusters: record entry ranges and per-column page ranges
//!
//! ## Variants
//! ```text
//!                  ┌──────────────────────────────┐
//!   Writer ──────▶ │ BufferedSink                 │  stages a cluster's pages
//!                  │   seal: serial | pool        │  per column, seals them,
//!                  │   flush: column-id order     │  forwards one PageSet
//!                  └──────────────┬───────────────┘
//!                                 │ commit_page_set
//!                                 ▼
//!                  ┌──────────────────────────────┐
//!                  │ DirectSink<C>                │  appends in arrival order,
//!                  │   container: C               │  records locators
//!                  └──────────────────────────────┘
//! ```
//! Either variant can be bound to a writer; `BufferedSink` decorates any
//! other `PageSink`.

mod buffered;
mod direct;
mod pool;

use std::sync::Arc;

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::model::{ClusterId, ColumnId, Model};
use crate::page::{Page, SealedPage};

pub use buffered::BufferedSink;
pub use direct::DirectSink;
pub use pool::CompressionPool;

/// The sealed pages of one cluster, grouped by column
#[derive(Debug, Clone, Default)]
pub struct PageSet {
    pub cluster_id: ClusterId,
    pub n_entries: u64,
    /// Column groups in persistence order; pages within a group are ordered
    pub columns: Vec<(ColumnId, Vec<SealedPage>)>,
}

impl PageSet {
    pub fn n_pages(&self) -> usize {
        self.columns.iter().map(|(_, pages)| pages.len()).sum()
    }
}

/// Consumer of pages and cluster commits
pub trait PageSink: Send {
    /// Bind the model and write the store header; called once, first
    fn create(&mut self, model: Arc<Model>) -> Result<()>;

    /// Hand over an unsealed page of the open cluster
    fn commit_page(&mut self, page: Page) -> Result<()>;

    /// Hand over an already sealed page of the open cluster
    fn commit_sealed_page(&mut self, column: ColumnId, page: SealedPage) -> Result<()>;

    /// Close the open cluster covering the next `n_entries` entries
    fn commit_cluster(&mut self, n_entries: u64) -> Result<ClusterId>;

    /// Commit a complete cluster in one call
    ///
    /// Pages are committed in the order given, then the cluster is closed.
    fn commit_page_set(&mut self, set: PageSet) -> Result<ClusterId> {
        for (column, pages) in set.columns {
            for page in pages {
                self.commit_sealed_page(column, page)?;
            }
        }
        self.commit_cluster(set.n_entries)
    }

    /// Write the footer and anchor; no commits are accepted afterwards
    fn finalize(&mut self) -> Result<()>;

    /// Descriptor built so far; `None` before `create`
    fn descriptor(&self) -> Option<&Descriptor>;

    fn metrics(&self) -> &Metrics;
}

impl<S: PageSink + ?Sized> PageSink for Box<S> {
    fn create(&mut self, model: Arc<Model>) -> Result<()> {
        (**self).create(model)
    }

    fn commit_page(&mut self, page: Page) -> Result<()> {
        (**self).commit_page(page)
    }

    fn commit_sealed_page(&mut self, column: ColumnId, page: SealedPage) -> Result<()> {
        (**self).commit_sealed_page(column, page)
    }

    fn commit_cluster(&mut self, n_entries: u64) -> Result<ClusterId> {
        (**self).commit_cluster(n_entries)
    }

    fn commit_page_set(&mut self, set: PageSet) -> Result<ClusterId> {
        (**self).commit_page_set(set)
    }

    fn finalize(&mut self) -> Result<()> {
        (**self).finalize()
    }

    fn descriptor(&self) -> Option<&Descriptor> {
        (**self).descriptor()
    }

    fn metrics(&self) -> &Metrics {
        (**self).metrics()
    }
}
