//! Descriptor Module
//!
//! Persisted metadata that makes every stored value addressable: the schema
//! plus, per cluster and per column, the ordered page locators.
//!
//! ## Lookup Path
//! ```text
//! entry i ──find_cluster_for_entry──▶ cluster c
//! (column k, global element g) ──find_cluster_for_element──▶ cluster c
//!   ──page_range(k).find(g - first_element_index)──▶ (page no, PageInfo)
//! ```
//!
//! ## Persisted Form
//! The schema is written once as the header record when the store is
//! created; the cluster index is written once as the footer record at
//! finalize. Both are bincode-encoded, optionally compressed, and located
//! through the fixed-size anchor at the end of the container (see
//! [`crate::storage`]).

mod builder;
mod cluster;
mod codec;
#[allow(clippy::module_inception)]
mod descriptor;

pub use builder::DescriptorBuilder;
pub use cluster::{ByteRange, ClusterDescriptor, ColumnRange, Locator, PageInfo, PageRange};
pub use codec::{FooterRecord, HeaderRecord, FORMAT_VERSION};
pub(crate) use codec::{decode_record, encode_record, EncodedRecord};
pub use descriptor::Descriptor;
