//! Container traits

use crate::error::Result;

/// Append-only byte sink backing a store being written
pub trait ContainerWriter: Send {
    /// Append `data`, returning the position of its first byte
    fn append(&mut self, data: &[u8]) -> Result<u64>;

    /// Position the next append will land at
    fn position(&self) -> u64;

    /// Flush buffered bytes to the backing medium
    fn sync(&mut self) -> Result<()>;
}

/// Positional reader over a stored container
pub trait ContainerReader: Send {
    /// Total container size in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly `len` bytes at `position`
    fn read_at(&mut self, position: u64, len: usize) -> Result<Vec<u8>>;

    /// Open an independent handle on the same bytes
    fn try_clone(&self) -> Result<Box<dyn ContainerReader>>;
}

impl<W: ContainerWriter + ?Sized> ContainerWriter for Box<W> {
    fn append(&mut self, data: &[u8]) -> Result<u64> {
        (**self).append(data)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn sync(&mut self) -> Result<()> {
        (**self).sync()
    }
}

pub(crate) fn out_of_bounds(position: u64, len: usize, size: u64) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!(
            "read of {} bytes at {} past container end {}",
            len, position, size
        ),
    )
}
