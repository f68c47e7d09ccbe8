//! # CairnKV
//!
//! An embedded, single-process key-value store with:
//! - A checksummed, append-only journal for every mutation
//! - Full-state snapshots written at coalesce time
//! - Crash recovery by replaying the journal onto the last snapshot
//! - Schema-free values that carry their own type
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │        get / set / unset / flush / coalesce / close         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  one Mutex: map + journal + lifecycle
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Journal   │          │  Snapshot   │
//!   │  (Append)   │          │   (Dump)    │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │ Frame Codec │
//!   │ op|len|crc  │
//!   └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use cairnkv::{Store, Value};
//!
//! # fn main() -> cairnkv::Result<()> {
//! let store = Store::open("data.db", "data.wal")?;
//! store.set("foo", 1)?;
//! store.flush()?;
//! assert_eq!(store.get("foo")?, Some(Value::Int(1)));
//! store.coalesce()?;
//! store.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod value;

pub mod journal;
pub mod snapshot;
pub mod store;

mod flusher;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CairnError, Result};
pub use config::{Config, SyncPolicy};
pub use value::{State, Value};
pub use store::Store;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CairnKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
