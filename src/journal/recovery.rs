//! Journal replay
//!
//! Applies every record of an existing journal, in append order, to a state
//! map that was just loaded from the snapshot.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{CairnError, Result};
use crate::value::State;
use super::{decode_header, Operation, Transaction, HEADER_SIZE};

/// Summary of a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records applied to the state
    pub records_applied: u64,

    /// Of which Set records
    pub sets: u64,

    /// Of which Unset records
    pub unsets: u64,

    /// Bytes consumed from the journal (headers + payloads)
    pub bytes_read: u64,
}

/// Replay the journal at `path` onto `state`
///
/// End of file at a record boundary ends the replay. Anything else that
/// stops a record from being read whole and checksum-clean is
/// `CorruptJournal`; records before it stay applied.
pub fn replay(path: &Path, state: &mut State) -> Result<ReplayStats> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut stats = ReplayStats::default();
    let mut offset: u64 = 0;

    loop {
        let mut header = [0u8; HEADER_SIZE];
        let n = read_full(&mut reader, &mut header)?;
        if n == 0 {
            debug!(path = %path.display(), "end of journal");
            break;
        }
        if n < HEADER_SIZE {
            return Err(CairnError::corrupt(
                offset,
                format!("torn header: {} of {} bytes", n, HEADER_SIZE),
            ));
        }

        let frame = decode_header(&header).map_err(|e| CairnError::corrupt(offset, e.to_string()))?;

        // Reject before allocating: a damaged length must not size the buffer
        let remaining = file_len.saturating_sub(offset + HEADER_SIZE as u64);
        if u64::from(frame.length) > remaining {
            return Err(CairnError::corrupt(
                offset,
                format!(
                    "payload length {} exceeds remaining {} bytes",
                    frame.length, remaining
                ),
            ));
        }

        let mut payload = vec![0u8; frame.length as usize];
        reader.read_exact(&mut payload).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CairnError::corrupt(offset, "torn payload"),
            _ => CairnError::Io(e),
        })?;

        let checksum = crc32fast::hash(&payload);
        if checksum != frame.checksum {
            return Err(CairnError::corrupt(
                offset,
                format!(
                    "checksum mismatch: header {:#010x}, payload {:#010x}",
                    frame.checksum, checksum
                ),
            ));
        }

        let tx = Transaction::decode(&payload)?;
        debug!(offset, op = ?frame.operation, key = %tx.key, "replaying record");
        tx.apply(frame.operation, state);

        stats.records_applied += 1;
        match frame.operation {
            Operation::Set => stats.sets += 1,
            Operation::Unset => stats.unsets += 1,
        }
        offset += (HEADER_SIZE + payload.len()) as u64;
    }

    stats.bytes_read = offset;
    info!(
        path = %path.display(),
        records = stats.records_applied,
        sets = stats.sets,
        unsets = stats.unsets,
        bytes = stats.bytes_read,
        "journal replayed"
    );
    Ok(stats)
}

/// Fill `buf` from `reader`, stopping early only at end of file
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
