//! Configuration for AtlasCol
//!
//! Write and read options with sensible defaults. Nothing here is ambient
//! process state: the parallel compression switch in particular is passed
//! explicitly to every writer/sink that honours it.

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// How the store is framed inside its backing container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerFormat {
    /// Store bytes start at offset 0 of the container
    Bare,

    /// Store bytes follow a generic archive preamble that carries the store name
    Embedded,
}

impl ContainerFormat {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            ContainerFormat::Bare => 0,
            ContainerFormat::Embedded => 1,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ContainerFormat::Bare),
            1 => Some(ContainerFormat::Embedded),
            _ => None,
        }
    }
}

/// Page compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    /// Pages are stored as packed element bytes
    None,

    /// LZ4 block compression
    Lz4,
}

impl Compression {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Lz4 => 1,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Compression::None),
            1 => Some(Compression::Lz4),
            _ => None,
        }
    }
}

/// Reader-side cluster caching strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterCache {
    /// Load every page of a cluster for the requested column set in one pass
    On,

    /// Read pages one at a time, keeping only the most recent page per column
    Off,
}

// =============================================================================
// Write Options
// =============================================================================

/// Options consumed by writers and page sinks
#[derive(Debug, Clone)]
pub struct WriteOptions {
    // -------------------------------------------------------------------------
    // Container Configuration
    // -------------------------------------------------------------------------
    /// Bare or embedded framing
    pub container_format: ContainerFormat,

    // -------------------------------------------------------------------------
    // Page Configuration
    // -------------------------------------------------------------------------
    /// Codec applied to pages, schema header and footer
    pub compression: Compression,

    /// Page capacity in elements; a full page is sealed mid-cluster
    pub elements_per_page: usize,

    /// Upper bound on a page's unpacked size (in bytes)
    pub max_unzipped_page_size: usize,

    // -------------------------------------------------------------------------
    // Sink Configuration
    // -------------------------------------------------------------------------
    /// Wrap the direct sink in the buffered, column-grouping sink
    pub use_buffered_sink: bool,

    /// Compress a cluster's pages concurrently in the buffered sink
    pub parallel_compression: bool,

    /// Maximum number of concurrent compression tasks
    pub compression_workers: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            container_format: ContainerFormat::Bare,
            compression: Compression::Lz4,
            elements_per_page: 10_000,
            max_unzipped_page_size: 16 * 1024 * 1024, // 16 MB
            use_buffered_sink: true,
            parallel_compression: false,
            compression_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl WriteOptions {
    /// Create a new options builder
    pub fn builder() -> WriteOptionsBuilder {
        WriteOptionsBuilder::default()
    }

    /// Check the options for values the engine cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.elements_per_page == 0 {
            return Err(AtlasError::Config(
                "elements_per_page must be at least 1".to_string(),
            ));
        }
        if self.compression_workers == 0 {
            return Err(AtlasError::Config(
                "compression_workers must be at least 1".to_string(),
            ));
        }
        if self.max_unzipped_page_size < 8 {
            return Err(AtlasError::Config(format!(
                "max_unzipped_page_size too small: {}",
                self.max_unzipped_page_size
            )));
        }
        Ok(())
    }
}

/// Builder for WriteOptions
#[derive(Default)]
pub struct WriteOptionsBuilder {
    options: WriteOptions,
}

impl WriteOptionsBuilder {
    /// Set the container framing
    pub fn container_format(mut self, format: ContainerFormat) -> Self {
        self.options.container_format = format;
        self
    }

    /// Set the page codec
    pub fn compression(mut self, compression: Compression) -> Self {
        self.options.compression = compression;
        self
    }

    /// Set the page capacity (in elements)
    pub fn elements_per_page(mut self, n: usize) -> Self {
        self.options.elements_per_page = n;
        self
    }

    /// Set the maximum unpacked page size (in bytes)
    pub fn max_unzipped_page_size(mut self, bytes: usize) -> Self {
        self.options.max_unzipped_page_size = bytes;
        self
    }

    /// Enable or disable the buffered sink decorator
    pub fn use_buffered_sink(mut self, enabled: bool) -> Self {
        self.options.use_buffered_sink = enabled;
        self
    }

    /// Enable or disable concurrent page compression
    pub fn parallel_compression(mut self, enabled: bool) -> Self {
        self.options.parallel_compression = enabled;
        self
    }

    /// Set the compression worker pool size
    pub fn compression_workers(mut self, n: usize) -> Self {
        self.options.compression_workers = n;
        self
    }

    pub fn build(self) -> WriteOptions {
        self.options
    }
}

// =============================================================================
// Read Options
// =============================================================================

/// Options consumed by readers
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Cluster caching strategy
    pub cluster_cache: ClusterCache,

    /// Verify page checksums on load
    pub verify_checksums: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            cluster_cache: ClusterCache::On,
            verify_checksums: true,
        }
    }
}

impl ReadOptions {
    pub fn builder() -> ReadOptionsBuilder {
        ReadOptionsBuilder::default()
    }
}

/// Builder for ReadOptions
#[derive(Default)]
pub struct ReadOptionsBuilder {
    options: ReadOptions,
}

impl ReadOptionsBuilder {
    pub fn cluster_cache(mut self, cache: ClusterCache) -> Self {
        self.options.cluster_cache = cache;
        self
    }

    pub fn verify_checksums(mut self, enabled: bool) -> Self {
        self.options.verify_checksums = enabled;
        self
    }

    pub fn build(self) -> ReadOptions {
        self.options
    }
}
