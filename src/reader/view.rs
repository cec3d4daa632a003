//! Field views and entry ranges

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{AtlasError, Result};
use crate::model::{EntryIndex, Layout, Value};

use super::source::PageSource;

/// Typed accessor for one field (or record member) across all entries
///
/// Reads only the columns of that field; no entry is materialized.
pub struct View<T> {
    path: String,
    source: Arc<Mutex<PageSource>>,
    layout: Layout,
    n_entries: u64,
    convert: fn(Value) -> Option<T>,
}

impl<T> View<T> {
    pub(crate) fn new(
        path: &str,
        source: Arc<Mutex<PageSource>>,
        layout: Layout,
        n_entries: u64,
        convert: fn(Value) -> Option<T>,
    ) -> Self {
        Self {
            path: path.to_string(),
            source,
            layout,
            n_entries,
            convert,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.n_entries
    }

    pub fn is_empty(&self) -> bool {
        self.n_entries == 0
    }

    /// Value of entry `index`
    pub fn get(&self, index: EntryIndex) -> Result<T> {
        if index >= self.n_entries {
            return Err(AtlasError::OutOfRange {
                index,
                entries: self.n_entries,
            });
        }
        let value = {
            let mut source = self.source.lock();
            self.layout.read(index, &mut *source)?
        };
        (self.convert)(value).ok_or_else(|| {
            AtlasError::Schema(format!("stored value of '{}' has an unexpected shape", self.path))
        })
    }

    /// Values of all entries, in order
    pub fn iter(&self) -> impl Iterator<Item = Result<T>> + '_ {
        EntryRange::new(self.n_entries).map(move |i| self.get(i))
    }
}

/// Ascending entry indices `[0, n)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRange {
    next: u64,
    end: u64,
}

impl EntryRange {
    pub fn new(n_entries: u64) -> Self {
        Self {
            next: 0,
            end: n_entries,
        }
    }
}

impl Iterator for EntryRange {
    type Item = EntryIndex;

    fn next(&mut self) -> Option<EntryIndex> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for EntryRange {
    fn next_back(&mut self) -> Option<EntryIndex> {
        if self.next >= self.end {
            return None;
        }
        self.end -= 1;
        Some(self.end)
    }
}

impl ExactSizeIterator for EntryRange {}
