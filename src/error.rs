//! Error types for AtlasCol
//!
//! Provides a unified error type for all operations.
//!
//! Fatal kinds (`WriteFailure`, `Io` and `Compression` raised during a commit,
//! `CorruptDescriptor`) leave the store unusable. `OutOfRange` is local and
//! never corrupts reader state.

use thiserror::Error;

/// Result type alias using AtlasError
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Unified error type for AtlasCol operations
#[derive(Debug, Error)]
pub enum AtlasError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Schema Errors
    // -------------------------------------------------------------------------
    /// Duplicate or unknown field, or a type mismatch between the requested
    /// and the stored field type
    #[error("Schema error: {0}")]
    Schema(String),

    // -------------------------------------------------------------------------
    // Write Errors
    // -------------------------------------------------------------------------
    /// Sink failure or compression task failure during a commit
    #[error("Write failure: {0}")]
    WriteFailure(String),

    #[error("Compression error: {0}")]
    Compression(String),

    // -------------------------------------------------------------------------
    // Read Errors
    // -------------------------------------------------------------------------
    /// Anchor, header or footer failed to parse or to validate
    #[error("Corrupt descriptor: {0}")]
    CorruptDescriptor(String),

    #[error("Corrupt page (column {column}, cluster {cluster}): {reason}")]
    CorruptPage {
        column: u32,
        cluster: u64,
        reason: String,
    },

    /// Store name not present in the container
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Entry index {index} out of range (store has {entries} entries)")]
    OutOfRange { index: u64, entries: u64 },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Diagnostics Errors
    // -------------------------------------------------------------------------
    /// Counter registration or exposition failed
    #[error("Metrics error: {0}")]
    Metrics(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<prometheus::Error> for AtlasError {
    fn from(e: prometheus::Error) -> Self {
        AtlasError::Metrics(e.to_string())
    }
}

impl From<bincode::Error> for AtlasError {
    fn from(e: bincode::Error) -> Self {
        AtlasError::Serialization(e.to_string())
    }
}
