//! Writer Module
//!
//! Turns filled entries into column pages and hands them to a page sink.
//!
//! ## Responsibilities
//! - Decompose each filled entry into column elements
//! - Seal full pages mid-cluster, flush partial pages at cluster commit
//! - Own cluster boundaries and the final close
//!
//! ## Lifecycle
//! ```text
//! create ──▶ (fill)* ──▶ (commit_cluster | fill)* ──▶ close
//!                                                    (implicit on drop)
//! ```
//! Any sink failure is fatal: the writer refuses further operations and the
//! store must be discarded.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::WriteOptions;
use crate::descriptor::Descriptor;
use crate::error::{AtlasError, Result};
use crate::metrics::Metrics;
use crate::model::{ColumnAppender, ColumnId, Entry, Model, Value};
use crate::page::{ColumnWriter, Page};
use crate::sink::{BufferedSink, DirectSink, PageSink};
use crate::storage::{ContainerWriter, FileWriter};

/// Writes entries of one model into one store
pub struct Writer {
    model: Arc<Model>,
    /// Default entry, staged by the caller and consumed by `fill`
    entry: Entry,
    sink: Box<dyn PageSink>,
    columns: Vec<ColumnWriter>,
    /// Pages sealed during the current fill, not yet handed to the sink
    outbox: Vec<Page>,

    n_entries: u64,
    /// Entries filled since the last cluster commit
    n_pending: u64,
    closed: bool,
    failed: bool,

    metrics: Metrics,
}

impl Writer {
    /// Create a store file at `path` holding store `name`
    ///
    /// The sink is a direct file sink, wrapped in the buffered sink when
    /// `options.use_buffered_sink` is set.
    pub fn create(
        model: impl Into<Arc<Model>>,
        name: &str,
        path: &Path,
        options: WriteOptions,
    ) -> Result<Self> {
        options.validate()?;
        let container = FileWriter::create(path)?;
        Self::create_in(model, name, container, options)
    }

    /// Create store `name` in an arbitrary container
    pub fn create_in<C: ContainerWriter + 'static>(
        model: impl Into<Arc<Model>>,
        name: &str,
        container: C,
        options: WriteOptions,
    ) -> Result<Self> {
        options.validate()?;
        let direct = DirectSink::new(name, container, &options)?;
        let sink: Box<dyn PageSink> = if options.use_buffered_sink {
            Box::new(BufferedSink::new(Box::new(direct), &options)?)
        } else {
            Box::new(direct)
        };
        Self::with_sink(model, sink, options)
    }

    /// Bind a model to a caller-provided sink
    pub fn with_sink(
        model: impl Into<Arc<Model>>,
        mut sink: Box<dyn PageSink>,
        options: WriteOptions,
    ) -> Result<Self> {
        options.validate()?;
        let model = model.into();
        sink.create(model.clone())?;

        let columns = model
            .columns()
            .iter()
            .map(|c| ColumnWriter::new(c, options.elements_per_page))
            .collect();
        let mut metrics = Metrics::new("Writer");
        metrics.observe(sink.metrics());

        info!(
            fields = model.n_fields(),
            columns = model.n_columns(),
            elements_per_page = options.elements_per_page,
            buffered = options.use_buffered_sink,
            "Writer bound"
        );

        Ok(Self {
            entry: Entry::new(model.clone()),
            model,
            sink,
            columns,
            outbox: Vec::new(),
            n_entries: 0,
            n_pending: 0,
            closed: false,
            failed: false,
            metrics,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// The writer's default entry
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn entry_mut(&mut self) -> &mut Entry {
        &mut self.entry
    }

    /// A fresh entry bound to this writer's model
    pub fn create_entry(&self) -> Entry {
        Entry::new(self.model.clone())
    }

    /// Entries filled so far
    pub fn n_entries(&self) -> u64 {
        self.n_entries
    }

    /// Entries filled since the last cluster commit
    pub fn n_pending(&self) -> u64 {
        self.n_pending
    }

    pub fn descriptor(&self) -> Option<&Descriptor> {
        self.sink.descriptor()
    }

    /// Counters of this writer and its sinks, rooted at `Writer`
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // =========================================================================
    // Fill / Commit
    // =========================================================================

    /// Append the default entry as the next entry
    pub fn fill(&mut self) -> Result<()> {
        self.check_usable()?;
        let result = decompose(
            &self.model,
            self.entry.values(),
            &mut self.columns,
            &mut self.outbox,
        )
        .and_then(|_| self.drain_outbox());
        self.finish_fill(result)
    }

    /// Append `entry` as the next entry; it must share this writer's model
    pub fn fill_entry(&mut self, entry: &Entry) -> Result<()> {
        self.check_usable()?;
        if !entry.shares_model(&self.model) {
            return Err(AtlasError::Schema(
                "entry belongs to a different model".to_string(),
            ));
        }
        let result = decompose(&self.model, entry.values(), &mut self.columns, &mut self.outbox)
            .and_then(|_| self.drain_outbox());
        self.finish_fill(result)
    }

    /// Seal every open page and close the current cluster
    ///
    /// A no-op when nothing was filled since the last commit.
    pub fn commit_cluster(&mut self) -> Result<()> {
        self.check_usable()?;
        if self.n_pending == 0 {
            return Ok(());
        }
        let result = self.flush_cluster();
        self.poison_on_error(result)
    }

    /// Commit pending entries and finalize the store
    pub fn close(mut self) -> Result<()> {
        self.close_inner()
    }

    fn finish_fill(&mut self, result: Result<()>) -> Result<()> {
        self.poison_on_error(result)?;
        self.n_entries += 1;
        self.n_pending += 1;
        Ok(())
    }

    fn drain_outbox(&mut self) -> Result<()> {
        for page in self.outbox.drain(..) {
            self.sink.commit_page(page)?;
        }
        Ok(())
    }

    fn flush_cluster(&mut self) -> Result<()> {
        // Step 1: seal partial pages
        for column in &mut self.columns {
            column.flush(&mut self.outbox);
        }
        self.drain_outbox()?;

        // Step 2: close the cluster
        let id = self.sink.commit_cluster(self.n_pending)?;
        debug!(cluster = id, entries = self.n_pending, "Writer committed cluster");
        self.n_pending = 0;
        Ok(())
    }

    fn close_inner(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.check_usable()?;
        self.closed = true;

        let result = self.finish();
        self.poison_on_error(result)?;

        info!(entries = self.n_entries, "Writer closed");
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.n_pending > 0 {
            self.flush_cluster()?;
        }
        self.sink.finalize()
    }

    fn check_usable(&self) -> Result<()> {
        if self.failed {
            return Err(AtlasError::InvalidState(
                "writer failed earlier; the store must be discarded".to_string(),
            ));
        }
        if self.closed {
            return Err(AtlasError::InvalidState("writer is closed".to_string()));
        }
        Ok(())
    }

    fn poison_on_error(&mut self, result: Result<()>) -> Result<()> {
        if result.is_err() {
            self.failed = true;
        }
        result
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if self.closed || self.failed {
            return;
        }
        if let Err(e) = self.close_inner() {
            warn!(error = %e, "Implicit close of writer failed");
        }
    }
}

/// Decompose one entry's values into column elements
fn decompose(
    model: &Model,
    values: &[Value],
    columns: &mut [ColumnWriter],
    outbox: &mut Vec<Page>,
) -> Result<()> {
    let mut target = FillTarget { columns, outbox };
    for (field, value) in model.fields().iter().zip(values) {
        field.layout.append(value, &mut target)?;
    }
    Ok(())
}

/// Routes decomposed elements to the column writers
struct FillTarget<'a> {
    columns: &'a mut [ColumnWriter],
    outbox: &'a mut Vec<Page>,
}

impl FillTarget<'_> {
    fn column(&mut self, id: ColumnId) -> Result<(&mut ColumnWriter, &mut Vec<Page>)> {
        let column = self
            .columns
            .get_mut(id as usize)
            .ok_or_else(|| AtlasError::Schema(format!("unknown column {}", id)))?;
        Ok((column, &mut *self.outbox))
    }
}

impl ColumnAppender for FillTarget<'_> {
    fn append_value(&mut self, column: ColumnId, value: &Value) -> Result<()> {
        let (writer, outbox) = self.column(column)?;
        writer.push_value(value, outbox)
    }

    fn append_offset(&mut self, column: ColumnId, count: u64) -> Result<()> {
        let (writer, outbox) = self.column(column)?;
        writer.push_offset(count, outbox)
    }

    fn append_bytes(&mut self, column: ColumnId, bytes: &[u8]) -> Result<()> {
        let (writer, outbox) = self.column(column)?;
        writer.push_bytes(bytes, outbox)
    }
}
