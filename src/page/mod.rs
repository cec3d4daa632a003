//! Page Module
//!
//! In-memory column pages and their compressed on-disk form.
//!
//! ## Lifecycle
//! ```text
//!   ColumnWriter ──push──▶ Page (open) ──seal──▶ SealedPage ──▶ PageSink
//!                           raw LE elements        compressed bytes
//!                                                  + sizes + crc32
//! ```
//!
//! A page belongs to exactly one column and one cluster. Once sealed it is
//! immutable.

mod column;
mod compression;
mod element;
#[allow(clippy::module_inception)]
mod page;

pub use column::ColumnWriter;
pub use compression::{unzip, zip};
pub use element::ColumnType;
pub use page::{Page, SealedPage};
