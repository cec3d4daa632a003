//! Storage Module
//!
//! Byte containers and the framing of a store inside them.
//!
//! ## Responsibilities
//! - Append-only writing and positional reading of raw bytes
//! - File-backed and in-memory containers
//! - Preamble, store header and anchor encoding
//! - Locating and validating the descriptor of a stored store
//!
//! ## Container Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Preamble (Embedded format only)                         │
//! │   Magic: "ATAR" (4) | NameLen: u32 (4) | Name           │
//! ├─────────────────────────────────────────────────────────┤
//! │ Store Header (8 bytes)                                  │
//! │   Magic: "ATNT" (4) | Version: u16 | Format: u8 | Codec │
//! ├─────────────────────────────────────────────────────────┤
//! │ Header Record (schema, bincode, maybe compressed)       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Pages (variable)                                        │
//! │   cluster 0 pages, cluster 1 pages, ...                 │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer Record (cluster index, bincode, maybe compressed)│
//! ├─────────────────────────────────────────────────────────┤
//! │ Anchor (48 bytes)                                       │
//! │   header/footer seek + sizes + CRCs | Format | "ATNA"   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Page locators hold absolute container
//! positions.

mod container;
mod file;
mod format;
mod memory;

pub use container::{ContainerReader, ContainerWriter};
pub use file::{FileReader, FileWriter};
pub use format::{read_descriptor, Anchor, ANCHOR_SIZE};
pub use memory::MemoryContainer;

pub(crate) use format::{write_preamble, write_store_header};
