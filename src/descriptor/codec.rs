//! Header and footer records
//!
//! Both records are bincode-encoded, then compressed with the store codec
//! when that shrinks them. Decoding failures of any kind surface as
//! `CorruptDescriptor`: a store whose metadata cannot be read is unusable.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Compression;
use crate::error::{AtlasError, Result};
use crate::model::{ColumnDescriptor, FieldDescriptor};
use crate::page::{unzip, zip};

use super::cluster::ClusterDescriptor;
use super::descriptor::Descriptor;

/// Version of the header/footer record layout
pub const FORMAT_VERSION: u16 = 1;

/// Schema record, written once when the store is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderRecord {
    pub name: String,
    pub version: u16,
    pub compression: Compression,
    pub fields: Vec<FieldDescriptor>,
    pub columns: Vec<ColumnDescriptor>,
}

/// Cluster index record, written once at finalize
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FooterRecord {
    pub n_entries: u64,
    pub clusters: Vec<ClusterDescriptor>,
}

impl HeaderRecord {
    pub fn from_descriptor(descriptor: &Descriptor) -> Self {
        let model = descriptor.model();
        Self {
            name: descriptor.name().to_string(),
            version: FORMAT_VERSION,
            compression: descriptor.compression(),
            fields: model.fields().to_vec(),
            columns: model.columns().to_vec(),
        }
    }
}

impl FooterRecord {
    pub fn from_descriptor(descriptor: &Descriptor) -> Self {
        Self {
            n_entries: descriptor.n_entries(),
            clusters: descriptor.clusters().to_vec(),
        }
    }
}

/// A record in its stored form
#[derive(Debug, Clone)]
pub(crate) struct EncodedRecord {
    pub bytes: Vec<u8>,
    pub uncompressed_len: u32,
    pub checksum: u32,
}

pub(crate) fn encode_record<T: Serialize>(record: &T, compression: Compression) -> Result<EncodedRecord> {
    let raw = bincode::serialize(record)?;
    let uncompressed_len = u32::try_from(raw.len())
        .map_err(|_| AtlasError::Serialization(format!("record of {} bytes too large", raw.len())))?;
    let bytes = zip(compression, &raw).unwrap_or(raw);
    let checksum = crc32fast::hash(&bytes);
    Ok(EncodedRecord {
        bytes,
        uncompressed_len,
        checksum,
    })
}

pub(crate) fn decode_record<T: DeserializeOwned>(
    what: &str,
    stored: &[u8],
    uncompressed_len: u32,
    checksum: u32,
    compression: Compression,
) -> Result<T> {
    if crc32fast::hash(stored) != checksum {
        return Err(AtlasError::CorruptDescriptor(format!("{} checksum mismatch", what)));
    }
    let raw = unzip(compression, stored, uncompressed_len as usize)
        .map_err(|e| AtlasError::CorruptDescriptor(format!("{}: {}", what, e)))?;
    bincode::deserialize(&raw)
        .map_err(|e| AtlasError::CorruptDescriptor(format!("{}: {}", what, e)))
}
