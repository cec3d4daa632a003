//! Writer-side column state
//!
//! Each column owns at most one open page. A page that reaches capacity is
//! moved to the caller's outbox immediately; the rest is moved out when the
//! cluster is committed.

use crate::error::Result;
use crate::model::{ColumnDescriptor, ColumnId, Value};

use super::element::ColumnType;
use super::page::Page;

/// Produces pages for one column
#[derive(Debug)]
pub struct ColumnWriter {
    id: ColumnId,
    element: ColumnType,
    /// Page capacity in elements
    capacity: usize,
    /// Lazily allocated open page
    open: Option<Page>,
    /// Running item total (offset columns only)
    running_total: u64,
    /// Elements written over the column's lifetime
    n_elements: u64,
}

impl ColumnWriter {
    pub fn new(descriptor: &ColumnDescriptor, capacity: usize) -> Self {
        Self {
            id: descriptor.id,
            element: descriptor.element,
            capacity: capacity.max(1),
            open: None,
            running_total: 0,
            n_elements: 0,
        }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn n_elements(&self) -> u64 {
        self.n_elements
    }

    /// Elements buffered in the open page
    pub fn n_buffered(&self) -> u32 {
        self.open.as_ref().map(|p| p.n_elements()).unwrap_or(0)
    }

    pub fn push_value(&mut self, value: &Value, outbox: &mut Vec<Page>) -> Result<()> {
        self.open_page().push_value(value)?;
        self.n_elements += 1;
        self.seal_if_full(outbox);
        Ok(())
    }

    pub fn push_offset(&mut self, count: u64, outbox: &mut Vec<Page>) -> Result<()> {
        let total = self.running_total + count;
        self.open_page().push_offset(total)?;
        self.running_total = total;
        self.n_elements += 1;
        self.seal_if_full(outbox);
        Ok(())
    }

    /// Append bytes, splitting them across pages at capacity boundaries
    pub fn push_bytes(&mut self, mut bytes: &[u8], outbox: &mut Vec<Page>) -> Result<()> {
        while !bytes.is_empty() {
            let room = self.capacity - self.n_buffered() as usize;
            let (head, tail) = bytes.split_at(room.min(bytes.len()));
            self.open_page().push_bytes(head)?;
            self.n_elements += head.len() as u64;
            self.seal_if_full(outbox);
            bytes = tail;
        }
        Ok(())
    }

    /// Move the open page, if it holds anything, to the outbox
    pub fn flush(&mut self, outbox: &mut Vec<Page>) {
        if let Some(page) = self.open.take() {
            if !page.is_empty() {
                outbox.push(page);
            }
        }
    }

    fn open_page(&mut self) -> &mut Page {
        let (id, element, capacity) = (self.id, self.element, self.capacity);
        self.open
            .get_or_insert_with(|| Page::new(id, element, capacity))
    }

    fn seal_if_full(&mut self, outbox: &mut Vec<Page>) {
        if self.n_buffered() as usize >= self.capacity {
            self.flush(outbox);
        }
    }
}
