//! # AtlasCol
//!
//! A columnar entry store with:
//! - Typed schemas mapped onto physical columns (scalars, strings,
//!   sequences, records)
//! - Page-granular compression with per-page checksums
//! - Cluster-granular commits and a persisted page index
//! - A buffered sink that groups pages by column and can compress them on a
//!   worker pool
//! - Entry-indexed random access and per-field views on read
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Model  ──▶  Entry (values)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ fill / commit_cluster
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Writer                                  │
//! │           (column writers → pages)                           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │BufferedSink │ ───────▶ │ DirectSink  │
//!   │ (pool zip)  │          │ (locators)  │
//!   └─────────────┘          └──────┬──────┘
//!                                   ▼
//!                           ┌─────────────┐         ┌─────────────┐
//!                           │  Container  │ ◀────── │   Reader    │
//!                           │ (file, mem) │         │ (views)     │
//!                           └─────────────┘         └─────────────┘
//! ```
//!
//! ## Example
//! ```no_run
//! use atlascol::{FieldType, ModelBuilder, Reader, WriteOptions, Writer};
//! # fn main() -> atlascol::Result<()> {
//! let path = std::path::Path::new("events.atc");
//!
//! let mut builder = ModelBuilder::new();
//! builder.make_field("pt", FieldType::F32)?;
//! builder.make_field("hits", FieldType::sequence(FieldType::F64))?;
//!
//! let mut writer = Writer::create(builder.create(), "events", path, WriteOptions::default())?;
//! writer.entry_mut().set("pt", 42.0f32)?;
//! writer.entry_mut().set("hits", vec![1.0f64, 2.0])?;
//! writer.fill()?;
//! writer.close()?;
//!
//! let reader = Reader::open("events", path)?;
//! let pt = reader.view::<f32>("pt")?;
//! assert_eq!(pt.get(0)?, 42.0);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod metrics;

pub mod model;
pub mod page;
pub mod descriptor;
pub mod storage;
pub mod sink;
pub mod writer;
pub mod reader;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{AtlasError, Result};
pub use config::{ClusterCache, Compression, ContainerFormat, ReadOptions, WriteOptions};
pub use descriptor::Descriptor;
pub use metrics::{Counter, Metrics};
pub use model::{Entry, FieldType, FieldValue, Model, ModelBuilder, Value};
pub use reader::{EntryRange, Reader, View};
pub use writer::Writer;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasCol
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
