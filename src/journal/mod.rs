//! Journal (Write-Ahead Log) Module
//!
//! Provides durability for mutations made since the last snapshot.
//!
//! ## Responsibilities
//! - Append one record per Set/Unset, buffered until flushed
//! - CRC32 checksums for corruption detection
//! - Replay records onto a freshly loaded snapshot at open
//! - Truncation once a coalesce has made the records redundant
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Record 1                                     │
//! │ ┌────────┬─────────┬─────────┬─────────────┐ │
//! │ │ Op (1) │ Len (4) │ CRC (4) │ Transaction │ │
//! │ └────────┴─────────┴─────────┴─────────────┘ │
//! ├──────────────────────────────────────────────┤
//! │ Record 2                                     │
//! │ ┌────────┬─────────┬─────────┬─────────────┐ │
//! │ │ Op (1) │ Len (4) │ CRC (4) │ Transaction │ │
//! │ └────────┴─────────┴─────────┴─────────────┘ │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Length and CRC are big-endian. The CRC (IEEE) covers the transaction
//! bytes only, never the header.

mod frame;
mod record;
mod recovery;
mod writer;

pub use frame::{decode_header, encode_header, FrameHeader, HEADER_SIZE};
pub use record::{Operation, Transaction};
pub use recovery::{replay, ReplayStats};
pub use writer::Journal;
