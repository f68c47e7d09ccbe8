//! Error types for CairnKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using CairnError
pub type Result<T> = std::result::Result<T, CairnError>;

/// Unified error type for CairnKV operations
#[derive(Debug, Error)]
pub enum CairnError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("store is not ready")]
    NotReady,

    // -------------------------------------------------------------------------
    // Journal Errors
    // -------------------------------------------------------------------------
    #[error("journal is corrupt at offset {offset}: {reason}")]
    CorruptJournal { offset: u64, reason: String },

    #[error("frame format error: {0}")]
    Format(String),

    #[error("journal holds a torn record that could not be rolled back; coalesce to recover")]
    JournalFailed,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CairnError {
    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        CairnError::CorruptJournal {
            offset,
            reason: reason.into(),
        }
    }
}
