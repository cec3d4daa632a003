//! Reader Module
//!
//! Opens a stored store and serves its entries by index.
//!
//! ## Responsibilities
//! - Load and validate the descriptor before any entry access
//! - Materialize whole entries (`load_entry`) into the reader's entry
//! - Serve single fields without materializing entries (`view`)
//!
//! ## Read Path
//! ```text
//! load_entry(i) ─▶ Layout::read ─▶ PageSource ──▶ current page? ──yes──▶ decode
//!                                     │ no
//!                                     ▼
//!                      descriptor: cluster ▶ page range ▶ PageInfo
//!                                     │
//!                          cluster cache / single page read ─▶ unzip
//! ```

mod source;
mod view;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::ReadOptions;
use crate::descriptor::Descriptor;
use crate::error::{AtlasError, Result};
use crate::metrics::Metrics;
use crate::model::{Entry, EntryIndex, FieldValue, Model, Value};
use crate::storage::{read_descriptor, ContainerReader, FileReader};

use source::PageSource;

pub use view::{EntryRange, View};

/// Entry-indexed access to one stored store
///
/// A reader is single-threaded: `load_entry` and views share one page
/// source behind a lock.
pub struct Reader {
    descriptor: Arc<Descriptor>,
    source: Arc<Mutex<PageSource>>,
    entry: Entry,
    metrics: Metrics,
}

impl Reader {
    /// Open store `name` in the file at `path` with default options
    pub fn open(name: &str, path: &Path) -> Result<Self> {
        Self::open_with_options(name, path, ReadOptions::default())
    }

    pub fn open_with_options(name: &str, path: &Path, options: ReadOptions) -> Result<Self> {
        let container = FileReader::open(path)?;
        Self::from_container(name, Box::new(container), options)
    }

    /// Open store `name` in an arbitrary container
    pub fn from_container(
        name: &str,
        mut container: Box<dyn ContainerReader>,
        options: ReadOptions,
    ) -> Result<Self> {
        let descriptor = Arc::new(read_descriptor(container.as_mut(), name)?);
        let source = PageSource::new(container, descriptor.clone(), options)?;

        info!(
            name,
            entries = descriptor.n_entries(),
            clusters = descriptor.n_clusters(),
            "Opened store"
        );
        Ok(Self::bind(descriptor, source))
    }

    /// Open a second, independent reader on the same store
    ///
    /// The descriptor is shared; the container is reopened, and the clone
    /// has its own page state, entry and counters, so it can be moved to
    /// another thread.
    pub fn try_clone(&self) -> Result<Self> {
        let source = self.source.lock().try_clone()?;
        debug!(entries = self.n_entries(), "Cloned reader");
        Ok(Self::bind(self.descriptor.clone(), source))
    }

    fn bind(descriptor: Arc<Descriptor>, source: PageSource) -> Self {
        let mut metrics = Metrics::new("Reader");
        metrics.observe(source.metrics());

        Self {
            entry: Entry::new(descriptor.model().clone()),
            descriptor,
            source: Arc::new(Mutex::new(source)),
            metrics,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn n_entries(&self) -> u64 {
        self.descriptor.n_entries()
    }

    /// Model reconstructed from the stored schema
    pub fn model(&self) -> &Arc<Model> {
        self.descriptor.model()
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The entry `load_entry` fills
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Counters of this reader, rooted at `Reader`
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// All entry indices, in order; may be taken any number of times
    pub fn entry_range(&self) -> EntryRange {
        EntryRange::new(self.n_entries())
    }

    // =========================================================================
    // Entry Access
    // =========================================================================

    /// Materialize entry `index` into the reader's entry
    ///
    /// On failure the entry keeps its previous values.
    pub fn load_entry(&mut self, index: EntryIndex) -> Result<()> {
        self.check_index(index)?;
        let values = {
            let mut source = self.source.lock();
            self.descriptor
                .model()
                .fields()
                .iter()
                .map(|field| field.layout.read(index, &mut *source))
                .collect::<Result<Vec<Value>>>()?
        };
        for (slot, value) in self.entry.values_mut().iter_mut().zip(values) {
            *slot = value;
        }
        Ok(())
    }

    /// Typed view on a field or dotted record member path
    pub fn view<T: FieldValue>(&self, path: &str) -> Result<View<T>> {
        let (field_type, layout) = self.model().resolve(path)?;
        if field_type != T::field_type() {
            return Err(AtlasError::Schema(format!(
                "'{}' is stored as {}, requested {}",
                path,
                field_type.type_name(),
                T::field_type().type_name()
            )));
        }
        Ok(View::new(
            path,
            self.source.clone(),
            layout,
            self.n_entries(),
            T::from_value,
        ))
    }

    /// Untyped view on a field or dotted record member path
    pub fn value_view(&self, path: &str) -> Result<View<Value>> {
        let (_, layout) = self.model().resolve(path)?;
        Ok(View::new(path, self.source.clone(), layout, self.n_entries(), Some))
    }

    fn check_index(&self, index: EntryIndex) -> Result<()> {
        if index >= self.n_entries() {
            return Err(AtlasError::OutOfRange {
                index,
                entries: self.n_entries(),
            });
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Reader {
    type Item = EntryIndex;
    type IntoIter = EntryRange;

    fn into_iter(self) -> EntryRange {
        self.entry_range()
    }
}
