//! Record frame codec
//!
//! Fixed 9-byte header written before every journal payload.

use bytes::{Buf, BufMut};

use crate::error::{CairnError, Result};
use super::Operation;

/// Header size: 1 byte operation + 4 bytes length + 4 bytes checksum
pub const HEADER_SIZE: usize = 9;

/// Decoded record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub operation: Operation,
    /// Payload length in bytes
    pub length: u32,
    /// CRC-32 (IEEE) of the payload
    pub checksum: u32,
}

impl FrameHeader {
    pub fn new(operation: Operation, length: u32, checksum: u32) -> Self {
        Self {
            operation,
            length,
            checksum,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        encode_header(self.operation, self.length, self.checksum)
    }
}

/// Encode a record header
///
/// Format: op (1) + length (4, BE) + checksum (4, BE)
pub fn encode_header(operation: Operation, length: u32, checksum: u32) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    let mut buf = &mut header[..];
    buf.put_u8(operation as u8);
    buf.put_u32(length);
    buf.put_u32(checksum);
    header
}

/// Decode a record header
///
/// Fails unless `bytes` is exactly `HEADER_SIZE` long and carries a known
/// operation tag.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader> {
    if bytes.len() != HEADER_SIZE {
        return Err(CairnError::Format(format!(
            "expected {} header bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut buf = bytes;
    let tag = buf.get_u8();
    let length = buf.get_u32();
    let checksum = buf.get_u32();

    let operation = Operation::try_from(tag)?;
    Ok(FrameHeader::new(operation, length, checksum))
}
