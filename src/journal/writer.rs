//! Journal handle
//!
//! Owns the open journal file and its buffered writer.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::mem;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{CairnError, Result};
use crate::value::{State, Value};
use super::{encode_header, replay, Operation, ReplayStats, Transaction, HEADER_SIZE};

/// Append-only journal file
///
/// Lifecycle: `open` (replays, then recreates the file empty) → appends →
/// `truncate` any number of times → `close` or `delete`. Both of the latter
/// consume the handle.
///
/// A failed append is cut back to the last whole record, so the file never
/// holds a torn record in front of later ones. If that cut itself fails the
/// journal refuses appends and flushes with `JournalFailed` until the next
/// `truncate`.
pub struct Journal {
    /// Journal file path, reused by `truncate`
    path: PathBuf,

    /// Buffered writer over the file; records reach the file on flush
    writer: BufWriter<File>,

    /// Bytes of whole records appended since the file was last created
    appended_bytes: u64,

    /// Set when a torn append could not be rolled back
    failed: bool,

    /// What the open-time replay applied
    replayed: ReplayStats,
}

impl Journal {
    /// Open the journal at `path`
    ///
    /// If the file exists its records are replayed onto `state` first. The
    /// file is then recreated empty, ready for appends.
    pub fn open(path: &Path, state: &mut State) -> Result<Self> {
        let replayed = if path.exists() {
            replay(path, state)?
        } else {
            ReplayStats::default()
        };

        let mut journal = Self::create(path)?;
        journal.replayed = replayed;
        Ok(journal)
    }

    /// Create (or truncate) the journal at `path` without replaying it
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        info!(path = %path.display(), "journal created");

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            appended_bytes: 0,
            failed: false,
            replayed: ReplayStats::default(),
        })
    }

    /// Append one record
    ///
    /// The record is buffered; it is durable only after `flush`/`sync`.
    /// On error nothing of the record remains in the buffer or the file.
    pub fn log(&mut self, operation: Operation, key: &str, value: Option<&Value>) -> Result<()> {
        self.ensure_usable()?;

        let payload = Transaction::new(key, value.cloned()).encode()?;
        let length = u32::try_from(payload.len()).map_err(|_| {
            CairnError::Format(format!(
                "transaction for key '{}' is {} bytes, over the u32 frame limit",
                key,
                payload.len()
            ))
        })?;
        let checksum = crc32fast::hash(&payload);
        let header = encode_header(operation, length, checksum);

        let written = self
            .writer
            .write_all(&header)
            .and_then(|()| self.writer.write_all(&payload));
        if let Err(e) = written {
            warn!(key, error = %e, "append failed, rolling back to last whole record");
            if let Err(rollback) = self.rollback() {
                error!(path = %self.path.display(), error = %rollback, "journal rollback failed");
                self.failed = true;
            }
            return Err(e.into());
        }
        self.appended_bytes += (HEADER_SIZE + payload.len()) as u64;

        debug!(op = ?operation, key, length, checksum, "record appended");
        Ok(())
    }

    /// Push buffered records to the file (no fsync)
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.writer.flush()?;
        Ok(())
    }

    /// Flush, then fsync the file data
    pub fn sync(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Drop all records: flush and release the current file, then recreate it empty
    ///
    /// Also clears the failed state.
    pub fn truncate(&mut self) -> Result<()> {
        if self.failed {
            discard(mem::replace(&mut self.writer, BufWriter::new(File::create(&self.path)?)));
            self.failed = false;
        } else {
            self.writer.flush()?;
            self.writer = BufWriter::new(File::create(&self.path)?);
        }
        self.appended_bytes = 0;

        info!(path = %self.path.display(), "journal truncated");
        Ok(())
    }

    /// Flush and close the file
    ///
    /// A failed journal is closed without flushing its buffer.
    pub fn close(self) -> Result<()> {
        let path = self.path;
        if self.failed {
            discard(self.writer);
        } else {
            let file = self.writer.into_inner().map_err(|e| e.into_error())?;
            drop(file);
        }

        debug!(path = %path.display(), "journal closed");
        Ok(())
    }

    /// Close the journal and remove its file
    pub fn delete(self) -> Result<()> {
        let path = self.path.clone();
        self.close()?;
        fs::remove_file(&path)?;

        info!(path = %path.display(), "journal deleted");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of whole records appended since the file was created or last
    /// truncated, flushed or not
    pub fn appended_bytes(&self) -> u64 {
        self.appended_bytes
    }

    /// Whether a failed rollback has disabled appends until `truncate`
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Stats of the replay performed by `open`
    pub fn replay_stats(&self) -> ReplayStats {
        self.replayed
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_usable(&self) -> Result<()> {
        if self.failed {
            return Err(CairnError::JournalFailed);
        }
        Ok(())
    }

    /// Cut the journal back to `appended_bytes` after a torn append
    ///
    /// The logical stream is the file followed by the writer's unwritten
    /// buffer. Everything past `appended_bytes` belongs to the torn record;
    /// whole records still sitting in the buffer are written back.
    fn rollback(&mut self) -> io::Result<()> {
        let reopened = OpenOptions::new().write(true).open(&self.path)?;
        let (old_file, pending) = mem::replace(&mut self.writer, BufWriter::new(reopened)).into_parts();
        let pending = pending.unwrap_or_else(|panicked| panicked.into_inner());
        let on_disk = old_file.metadata()?.len();
        drop(old_file);

        let committed = on_disk.min(self.appended_bytes);
        let keep = usize::try_from(self.appended_bytes - committed)
            .unwrap_or(usize::MAX)
            .min(pending.len());

        let file = self.writer.get_mut();
        file.set_len(committed)?;
        file.seek(SeekFrom::Start(committed))?;
        self.writer.write_all(&pending[..keep])?;

        debug!(committed, rewritten = keep, "journal rolled back");
        Ok(())
    }

    /// Swap in a read-only handle so the next append that overflows the
    /// buffer fails with its header already buffered, the way a write
    /// error partway through a record does
    #[cfg(test)]
    pub(crate) fn fail_writes(&mut self) -> Result<()> {
        self.writer.flush()?;
        let read_only = File::open(&self.path)?;
        self.writer = BufWriter::new(read_only);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn mark_failed(&mut self) {
        self.failed = true;
    }
}

/// Drop a writer without flushing what it buffered
fn discard(writer: BufWriter<File>) {
    let (file, _unwritten) = writer.into_parts();
    drop(file);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_temp_journal() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.wal");
        (temp_dir, path)
    }

    #[test]
    fn test_failed_append_leaves_no_torn_record() {
        let (_temp, path) = setup_temp_journal();
        let mut journal = Journal::create(&path).unwrap();
        journal.log(Operation::Set, "a", Some(&Value::Int(1))).unwrap();
        let committed = journal.appended_bytes();

        journal.fail_writes().unwrap();
        let big = Value::Text("x".repeat(20_000));
        assert!(matches!(
            journal.log(Operation::Set, "big", Some(&big)),
            Err(CairnError::Io(_))
        ));
        assert!(!journal.is_failed());
        assert_eq!(journal.appended_bytes(), committed);

        journal.log(Operation::Set, "b", Some(&Value::Int(2))).unwrap();
        journal.close().unwrap();

        let mut state = State::new();
        let stats = replay(&path, &mut state).unwrap();
        assert_eq!(stats.records_applied, 2);
        assert_eq!(state.get("a"), Some(&Value::Int(1)));
        assert_eq!(state.get("b"), Some(&Value::Int(2)));
        assert!(!state.contains_key("big"));
    }

    #[test]
    fn test_rollback_keeps_buffered_whole_records() {
        let (_temp, path) = setup_temp_journal();
        let mut journal = Journal::create(&path).unwrap();
        journal.log(Operation::Set, "flushed", Some(&Value::Int(1))).unwrap();
        journal.fail_writes().unwrap();

        // Fits in the buffer, so it has not reached the file yet
        journal.log(Operation::Set, "buffered", Some(&Value::Int(2))).unwrap();
        let committed = journal.appended_bytes();

        let big = Value::Bytes(vec![7u8; 20_000]);
        assert!(journal.log(Operation::Set, "big", Some(&big)).is_err());
        assert_eq!(journal.appended_bytes(), committed);

        journal.close().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), committed);

        let mut state = State::new();
        let stats = replay(&path, &mut state).unwrap();
        assert_eq!(stats.records_applied, 2);
        assert_eq!(state.get("flushed"), Some(&Value::Int(1)));
        assert_eq!(state.get("buffered"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_failed_journal_refuses_appends_until_truncate() {
        let (_temp, path) = setup_temp_journal();
        let mut journal = Journal::create(&path).unwrap();
        journal.failed = true;

        assert!(matches!(
            journal.log(Operation::Set, "a", Some(&Value::Int(1))),
            Err(CairnError::JournalFailed)
        ));
        assert!(matches!(journal.flush(), Err(CairnError::JournalFailed)));

        journal.truncate().unwrap();
        assert!(!journal.is_failed());
        journal.log(Operation::Set, "a", Some(&Value::Int(1))).unwrap();
        journal.close().unwrap();

        let mut state = State::new();
        assert_eq!(replay(&path, &mut state).unwrap().records_applied, 1);
    }
}
