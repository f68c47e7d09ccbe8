//! Store Module
//!
//! The coordinator that owns the in-memory map and sequences every mutation
//! through the journal.
//!
//! ## Responsibilities
//! - Open: load (or create) the snapshot, replay the journal onto it
//! - Serve get/set/unset against the map, journaling each mutation
//! - Coalesce: rewrite the snapshot and truncate the journal
//! - Close: flush and release the journal

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{Config, SyncPolicy};
use crate::error::{CairnError, Result};
use crate::flusher::Flusher;
use crate::journal::{replay, Journal, Operation, ReplayStats};
use crate::snapshot::SnapshotStore;
use crate::value::{State, Value};

/// An open key-value store
///
/// ## Concurrency
///
/// One mutex guards the map, the journal handle and the lifecycle. The
/// lifecycle is the journal slot itself: `Some` while open, `None` after
/// `close`. Every operation checks it under the same lock hold that performs
/// the work, so an operation never runs against a closed journal; one that
/// loses a race with `close` fails with `NotReady`.
///
/// Set and Unset append to the journal first and mutate the map second,
/// inside a single critical section. A failed append leaves the map
/// untouched. Coalesce holds the lock across dump and truncate, blocking
/// every other operation for its duration.
pub struct Store {
    config: Config,

    snapshot: SnapshotStore,

    /// Shared with the background flusher, which holds only a `Weak`
    inner: Arc<Mutex<Inner>>,

    /// Running only under `SyncPolicy::Interval`
    flusher: Mutex<Option<Flusher>>,

    /// What the open-time replay applied
    recovery: ReplayStats,
}

struct Inner {
    state: State,

    /// `None` once the store is closed
    journal: Option<Journal>,

    last_flush: Option<Instant>,
}

impl Store {
    /// Open a store from a snapshot file and a journal file
    ///
    /// Uses the default config (manual flushing) with these paths.
    pub fn open(snapshot_path: impl AsRef<Path>, journal_path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder()
            .snapshot_path(snapshot_path.as_ref())
            .journal_path(journal_path.as_ref())
            .build();
        Self::open_with_config(config)
    }

    /// Open a store with the given config
    ///
    /// On startup:
    /// 1. Load the snapshot, or write an empty one
    /// 2. Replay the journal (if any) onto the loaded map
    /// 3. If anything was replayed, persist it as the new snapshot
    /// 4. Recreate the journal empty and start serving
    ///
    /// Any failure aborts the open; no partially recovered store is returned.
    pub fn open_with_config(config: Config) -> Result<Self> {
        let start = Instant::now();
        config.validate()?;

        let snapshot = SnapshotStore::new(&config.snapshot_path);
        let mut state = snapshot.load_or_create().map_err(|e| {
            error!(path = %config.snapshot_path.display(), error = %e, "failed to load snapshot");
            e
        })?;

        let recovery = if config.journal_path.exists() {
            replay(&config.journal_path, &mut state).map_err(|e| {
                error!(path = %config.journal_path.display(), error = %e, "failed to replay journal");
                e
            })?
        } else {
            ReplayStats::default()
        };

        // The journal is about to be recreated empty; the replayed records
        // must be in the snapshot before that happens
        if recovery.records_applied > 0 {
            snapshot.dump(&state)?;
            info!(records = recovery.records_applied, "recovered records persisted to snapshot");
        }

        let journal = Journal::create(&config.journal_path)?;

        let inner = Arc::new(Mutex::new(Inner {
            state,
            journal: Some(journal),
            last_flush: None,
        }));

        let flusher = match config.sync_policy {
            SyncPolicy::Interval(interval) => Some(Self::spawn_flusher(&inner, interval)?),
            SyncPolicy::Manual | SyncPolicy::EveryWrite => None,
        };

        info!(
            snapshot = %config.snapshot_path.display(),
            journal = %config.journal_path.display(),
            keys = inner.lock().state.len(),
            elapsed = ?start.elapsed(),
            "store opened"
        );

        Ok(Self {
            config,
            snapshot,
            inner,
            flusher: Mutex::new(flusher),
            recovery,
        })
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let inner = self.inner.lock();
        inner.ensure_open()?;
        Ok(inner.state.get(key).cloned())
    }

    /// Set a key, overwriting any previous value
    ///
    /// If the journal append fails the error is returned and the map is
    /// left unchanged.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();

        let mut guard = self.inner.lock();
        let Inner {
            state,
            journal,
            last_flush,
        } = &mut *guard;
        let journal = journal.as_mut().ok_or(CairnError::NotReady)?;

        if let Err(e) = journal.log(Operation::Set, &key, Some(&value)) {
            error!(key = %key, error = %e, "failed to journal set");
            return Err(e);
        }
        state.insert(key, value);

        self.sync_if_required(journal, last_flush)
    }

    /// Remove a key
    ///
    /// Returns `true` once the key is absent. Removing a missing key writes
    /// nothing to the journal.
    pub fn unset(&self, key: &str) -> Result<bool> {
        let mut guard = self.inner.lock();
        let Inner {
            state,
            journal,
            last_flush,
        } = &mut *guard;
        let journal = journal.as_mut().ok_or(CairnError::NotReady)?;

        if !state.contains_key(key) {
            return Ok(true);
        }

        if let Err(e) = journal.log(Operation::Unset, key, None) {
            error!(key, error = %e, "failed to journal unset");
            return Err(e);
        }
        state.remove(key);

        self.sync_if_required(journal, last_flush)?;
        Ok(true)
    }

    /// Push buffered journal records to the file
    pub fn flush(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let Inner {
            journal,
            last_flush,
            ..
        } = &mut *guard;
        let journal = journal.as_mut().ok_or(CairnError::NotReady)?;

        journal.flush()?;
        *last_flush = Some(Instant::now());

        debug!("journal flushed");
        Ok(())
    }

    /// Write the whole map as the new snapshot, then truncate the journal
    ///
    /// If the dump succeeds but the truncate fails, the snapshot is current
    /// and the stale journal is replayed again on the next open. Set and
    /// Unset are idempotent, so that replay is harmless.
    pub fn coalesce(&self) -> Result<()> {
        let start = Instant::now();

        let mut guard = self.inner.lock();
        let Inner { state, journal, .. } = &mut *guard;
        let journal = journal.as_mut().ok_or(CairnError::NotReady)?;

        self.snapshot.dump(state).map_err(|e| {
            error!(error = %e, "coalesce: failed to dump snapshot");
            e
        })?;
        journal.truncate().map_err(|e| {
            error!(error = %e, "coalesce: failed to truncate journal");
            e
        })?;

        info!(keys = state.len(), elapsed = ?start.elapsed(), "coalesce complete");
        Ok(())
    }

    /// Close the journal
    ///
    /// Does not write a snapshot; call `coalesce` first for a compact
    /// on-disk state. The store is closed afterwards even if the final
    /// flush fails.
    pub fn close(&self) -> Result<()> {
        let start = Instant::now();

        // The flusher takes the store lock on every tick; stop it first
        self.stop_flusher();

        let journal = self.inner.lock().journal.take().ok_or(CairnError::NotReady)?;
        journal.close()?;

        info!(elapsed = ?start.elapsed(), "store closed");
        Ok(())
    }

    /// Close the store and remove both of its files
    pub fn destroy(self) -> Result<()> {
        self.stop_flusher();

        let journal = self.inner.lock().journal.take();
        match journal {
            Some(journal) => journal.delete()?,
            None => remove_if_exists(&self.config.journal_path)?,
        }
        remove_if_exists(&self.config.snapshot_path)?;

        info!(snapshot = %self.config.snapshot_path.display(), "store destroyed");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_open(&self) -> bool {
        self.inner.lock().journal.is_some()
    }

    /// Number of keys
    pub fn len(&self) -> Result<usize> {
        let inner = self.inner.lock();
        inner.ensure_open()?;
        Ok(inner.state.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        let inner = self.inner.lock();
        inner.ensure_open()?;
        Ok(inner.state.contains_key(key))
    }

    /// When the journal was last flushed, by `flush`, the flusher or a
    /// synced write
    pub fn last_flush(&self) -> Option<Instant> {
        self.inner.lock().last_flush
    }

    /// What the open-time replay applied
    pub fn recovery_stats(&self) -> ReplayStats {
        self.recovery
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sync_if_required(&self, journal: &mut Journal, last_flush: &mut Option<Instant>) -> Result<()> {
        if self.config.sync_policy == SyncPolicy::EveryWrite {
            journal.sync()?;
            *last_flush = Some(Instant::now());
        }
        Ok(())
    }

    fn spawn_flusher(inner: &Arc<Mutex<Inner>>, interval: Duration) -> Result<Flusher> {
        let weak: Weak<Mutex<Inner>> = Arc::downgrade(inner);
        Flusher::spawn(interval, move || {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let mut guard = inner.lock();
            let Inner {
                journal,
                last_flush,
                ..
            } = &mut *guard;
            let Some(journal) = journal.as_mut() else {
                return false;
            };
            match journal.flush() {
                Ok(()) => *last_flush = Some(Instant::now()),
                Err(e) => warn!(error = %e, "background flush failed"),
            }
            true
        })
    }

    fn stop_flusher(&self) {
        if let Some(flusher) = self.flusher.lock().take() {
            flusher.stop();
        }
    }
}

impl Inner {
    fn ensure_open(&self) -> Result<()> {
        match self.journal {
            Some(_) => Ok(()),
            None => Err(CairnError::NotReady),
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Some(flusher) = self.flusher.get_mut().take() {
            flusher.stop();
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_temp_store() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let snapshot = temp_dir.path().join("test.db");
        let journal = temp_dir.path().join("test.wal");
        (temp_dir, snapshot, journal)
    }

    fn break_journal(store: &Store) {
        store
            .inner
            .lock()
            .journal
            .as_mut()
            .unwrap()
            .fail_writes()
            .unwrap();
    }

    fn oversized() -> Value {
        Value::Text("x".repeat(20_000))
    }

    #[test]
    fn test_set_with_failed_append_leaves_map_unchanged() {
        let (_temp, snapshot, journal) = setup_temp_store();
        let store = Store::open(&snapshot, &journal).unwrap();
        store.set("a", 1).unwrap();

        break_journal(&store);
        assert!(matches!(store.set("b", oversized()), Err(CairnError::Io(_))));
        assert_eq!(store.get("b").unwrap(), None);
        assert_eq!(store.len().unwrap(), 1);

        store.set("c", 3).unwrap();
        store.flush().unwrap();
        store.close().unwrap();

        let store = Store::open(&snapshot, &journal).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(Value::Int(1)));
        assert_eq!(store.get("b").unwrap(), None);
        assert_eq!(store.get("c").unwrap(), Some(Value::Int(3)));
        assert_eq!(store.recovery_stats().records_applied, 2);
    }

    #[test]
    fn test_unset_with_failed_append_keeps_key() {
        let (_temp, snapshot, journal) = setup_temp_store();
        let store = Store::open(&snapshot, &journal).unwrap();
        let big_key = "k".repeat(20_000);
        store.set(big_key.as_str(), 1).unwrap();
        store.set("a", 2).unwrap();

        break_journal(&store);
        assert!(store.unset(&big_key).is_err());
        assert!(store.contains_key(&big_key).unwrap());

        store.unset("a").unwrap();
        store.flush().unwrap();
        store.close().unwrap();

        let store = Store::open(&snapshot, &journal).unwrap();
        assert_eq!(store.get(&big_key).unwrap(), Some(Value::Int(1)));
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_coalesce_recovers_failed_journal() {
        let (_temp, snapshot, journal) = setup_temp_store();
        let store = Store::open(&snapshot, &journal).unwrap();
        store.set("a", 1).unwrap();
        store.inner.lock().journal.as_mut().unwrap().mark_failed();

        assert!(matches!(store.set("b", 2), Err(CairnError::JournalFailed)));
        assert!(matches!(store.flush(), Err(CairnError::JournalFailed)));

        store.coalesce().unwrap();
        store.set("b", 2).unwrap();
        store.close().unwrap();

        let store = Store::open(&snapshot, &journal).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(Value::Int(1)));
        assert_eq!(store.get("b").unwrap(), Some(Value::Int(2)));
    }
}
