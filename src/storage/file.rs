//! File-backed containers

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::container::{out_of_bounds, ContainerReader, ContainerWriter};

/// Buffered, append-only file writer
#[derive(Debug)]
pub struct FileWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    position: u64,
}

impl FileWriter {
    /// Create (or truncate) the file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            position: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContainerWriter for FileWriter {
    fn append(&mut self, data: &[u8]) -> Result<u64> {
        let at = self.position;
        self.writer.write_all(data)?;
        self.position += data.len() as u64;
        Ok(at)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

/// Positional file reader
#[derive(Debug)]
pub struct FileReader {
    file: File,
    path: PathBuf,
    len: u64,
}

impl FileReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContainerReader for FileReader {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&mut self, position: u64, len: usize) -> Result<Vec<u8>> {
        if position.saturating_add(len as u64) > self.len {
            return Err(out_of_bounds(position, len, self.len).into());
        }
        self.file.seek(SeekFrom::Start(position))?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reopens the file: handles never share a seek position
    fn try_clone(&self) -> Result<Box<dyn ContainerReader>> {
        Ok(Box::new(FileReader::open(&self.path)?))
    }
}
