//! Configuration for CairnKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CairnError, Result};

/// Main configuration for a CairnKV store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // File Configuration
    // -------------------------------------------------------------------------
    /// Snapshot file holding the whole map as of the last coalesce
    pub snapshot_path: PathBuf,

    /// Journal file holding mutations appended since the last coalesce
    pub journal_path: PathBuf,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// When the journal's buffered writer reaches the file
    pub sync_policy: SyncPolicy,
}

/// Journal sync policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Records reach the file only on an explicit `flush` (or coalesce/close)
    Manual,

    /// flush + fsync after every append (safest, slowest)
    EveryWrite,

    /// A background thread flushes the buffered writer on this interval
    Interval(Duration),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("cairnkv.db"),
            journal_path: PathBuf::from("cairnkv.wal"),
            sync_policy: SyncPolicy::Manual,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the config before any file is touched
    pub fn validate(&self) -> Result<()> {
        if self.snapshot_path == self.journal_path {
            return Err(CairnError::Config(format!(
                "snapshot and journal must be different files, both are '{}'",
                self.snapshot_path.display()
            )));
        }
        if let SyncPolicy::Interval(interval) = self.sync_policy {
            if interval.is_zero() {
                return Err(CairnError::Config(
                    "sync interval must be non-zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    sync_interval: Option<Duration>,
    sync_every_write: bool,
}

impl ConfigBuilder {
    /// Set the snapshot file path
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_path = path.into();
        self
    }

    /// Set the journal file path
    pub fn journal_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.journal_path = path.into();
        self
    }

    /// Flush the journal in the background every `interval`.
    /// A zero interval disables background flushing.
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Flush and fsync the journal after every append.
    /// Overrides `sync_interval`.
    pub fn sync_every_write(mut self) -> Self {
        self.sync_every_write = true;
        self
    }

    pub fn build(self) -> Config {
        let mut config = self.config;
        config.sync_policy = if self.sync_every_write {
            SyncPolicy::EveryWrite
        } else {
            match self.sync_interval {
                Some(interval) if !interval.is_zero() => SyncPolicy::Interval(interval),
                _ => SyncPolicy::Manual,
            }
        };
        config
    }
}
