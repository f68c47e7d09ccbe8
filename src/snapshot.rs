//! Snapshot Store
//!
//! Whole-state persistence in a single file.
//!
//! ## Responsibilities
//! - Load the map at startup, or lay down an empty one on first open
//! - Rewrite the whole map at coalesce time (never incremental)
//!
//! The file is one bincode encoding of the entire `State`. Each `Value`
//! carries its variant tag, so the file needs no external schema.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{CairnError, Result};
use crate::value::State;

/// Reads and writes the snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the snapshot, creating an empty one if the file does not exist
    pub fn load_or_create(&self) -> Result<State> {
        if self.path.exists() {
            self.load()
        } else {
            self.create_empty()?;
            Ok(State::new())
        }
    }

    /// Decode the snapshot file
    pub fn load(&self) -> Result<State> {
        // Decoding from a slice bounds every length prefix by the file size
        let bytes = fs::read(&self.path)?;
        let state: State = bincode::deserialize(&bytes)?;

        info!(path = %self.path.display(), keys = state.len(), "snapshot loaded");
        Ok(state)
    }

    /// Write an empty map so later loads are well-formed
    pub fn create_empty(&self) -> Result<()> {
        self.dump(&State::new())
    }

    /// Overwrite the snapshot with `state`
    ///
    /// Written to a sibling temp file, synced, then renamed over the
    /// snapshot, so a crash mid-dump leaves the previous snapshot intact.
    pub fn dump(&self, state: &State) -> Result<()> {
        let tmp_path = self.tmp_path();

        if let Err(e) = self.write_and_replace(&tmp_path, state) {
            warn!(path = %tmp_path.display(), error = %e, "snapshot dump failed, removing temp file");
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        debug!(path = %self.path.display(), keys = state.len(), "snapshot written");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_and_replace(&self, tmp_path: &Path, state: &State) -> Result<()> {
        let file = File::create(tmp_path)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, state)?;
        writer.flush()?;

        let file = writer.into_inner().map_err(|e| CairnError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);

        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }

    /// `<snapshot>.tmp`, next to the snapshot
    fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}
