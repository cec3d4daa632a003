//! Page compression
//!
//! A blob is stored compressed only if that makes it strictly smaller, so
//! `stored.len() < uncompressed_len` is the compressed marker on read.

use crate::config::Compression;
use crate::error::{AtlasError, Result};

/// Compress `raw` with `compression`
///
/// Returns `None` when the blob should be stored as-is (no codec, or the
/// codec did not shrink it).
pub fn zip(compression: Compression, raw: &[u8]) -> Option<Vec<u8>> {
    match compression {
        Compression::None => None,
        Compression::Lz4 => {
            let compressed = lz4_flex::block::compress(raw);
            (compressed.len() < raw.len()).then_some(compressed)
        }
    }
}

/// Restore a stored blob to `uncompressed_len` bytes
pub fn unzip(compression: Compression, stored: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
    if stored.len() == uncompressed_len {
        return Ok(stored.to_vec());
    }
    if stored.len() > uncompressed_len {
        return Err(AtlasError::Compression(format!(
            "stored blob of {} bytes exceeds its unpacked size {}",
            stored.len(),
            uncompressed_len
        )));
    }

    let out = match compression {
        Compression::Lz4 => lz4_flex::block::decompress(stored, uncompressed_len)
            .map_err(|e| AtlasError::Compression(format!("LZ4 decompression failed: {}", e)))?,
        Compression::None => {
            return Err(AtlasError::Compression(format!(
                "blob of {} bytes is shorter than {} but the store is uncompressed",
                stored.len(),
                uncompressed_len
            )))
        }
    };

    if out.len() != uncompressed_len {
        return Err(AtlasError::Compression(format!(
            "decompressed {} bytes, expected {}",
            out.len(),
            uncompressed_len
        )));
    }
    Ok(out)
}
