//! In-memory container
//!
//! A shared growable buffer. Clones see the same bytes, so a store written
//! through one handle can be read back through another.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

use super::container::{out_of_bounds, ContainerReader, ContainerWriter};

#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    data: Arc<Mutex<Vec<u8>>>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: Arc::new(Mutex::new(bytes)),
        }
    }

    /// Copy of the current contents
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    /// Mutate the contents in place
    pub fn modify<F: FnOnce(&mut Vec<u8>)>(&self, f: F) {
        f(&mut self.data.lock());
    }
}

impl ContainerWriter for MemoryContainer {
    fn append(&mut self, data: &[u8]) -> Result<u64> {
        let mut buf = self.data.lock();
        let at = buf.len() as u64;
        buf.extend_from_slice(data);
        Ok(at)
    }

    fn position(&self) -> u64 {
        self.data.lock().len() as u64
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

impl ContainerReader for MemoryContainer {
    fn len(&self) -> u64 {
        self.data.lock().len() as u64
    }

    fn read_at(&mut self, position: u64, len: usize) -> Result<Vec<u8>> {
        let buf = self.data.lock();
        let size = buf.len() as u64;
        if position.saturating_add(len as u64) > size {
            return Err(out_of_bounds(position, len, size).into());
        }
        let start = position as usize;
        Ok(buf[start..start + len].to_vec())
    }

    fn try_clone(&self) -> Result<Box<dyn ContainerReader>> {
        Ok(Box::new(self.clone()))
    }
}
