//! Record framing for the sync log.
//!
//! ```text
//! | magic (4) | version (2) | length (4) | payload (length) | crc32 (4) |
//! ```
//!
//! The CRC covers everything before it. Integers are little-endian.

use crate::error::{CatalogError, CatalogResult};

/// Magic bytes opening every log record.
pub const FRAME_MAGIC: [u8; 4] = *b"PSLG";

/// Current frame format version.
pub const FRAME_VERSION: u16 = 1;

const HEADER_SIZE: usize = 10;
const CRC_SIZE: usize = 4;

/// Wraps a payload in a frame.
///
/// # Errors
///
/// Returns an error if the payload does not fit the 4-byte length field.
pub(crate) fn encode_frame(payload: &[u8]) -> CatalogResult<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| CatalogError::codec("log record larger than 4 GiB"))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    frame.extend_from_slice(&FRAME_MAGIC);
    frame.extend_from_slice(&FRAME_VERSION.to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);
    let crc = crc32(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Result of scanning a byte store for frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameScan {
    /// `(offset, payload)` of every intact frame, in order.
    pub frames: Vec<(u64, Vec<u8>)>,
    /// Length of the prefix made of intact frames.
    pub valid_len: u64,
    /// True if bytes after `valid_len` form an incomplete or torn frame.
    pub torn_tail: bool,
}

/// Scans `data` for frames.
///
/// A short or checksum-failing frame that ends exactly at the end of `data`
/// is a torn append and ends the scan. Anything else that fails to parse
/// is corruption.
///
/// # Errors
///
/// Returns [`CatalogError::Corrupted`] for bad magic, an unknown version, or a
/// checksum mismatch followed by further data.
pub fn scan_frames(data: &[u8]) -> CatalogResult<FrameScan> {
    let mut frames = Vec::new();
    let mut offset = 0usize;
    let mut torn_tail = false;

    while offset < data.len() {
        let rest = &data[offset..];
        let at = offset as u64;

        if rest.len() < HEADER_SIZE {
            torn_tail = true;
            break;
        }
        if rest[0..4] != FRAME_MAGIC {
            return Err(CatalogError::corrupted(at, "bad record magic"));
        }
        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version != FRAME_VERSION {
            return Err(CatalogError::corrupted(
                at,
                format!("unsupported record version {version}"),
            ));
        }
        let len = u32::from_le_bytes([rest[6], rest[7], rest[8], rest[9]]) as usize;
        let total = HEADER_SIZE + len + CRC_SIZE;
        if rest.len() < total {
            torn_tail = true;
            break;
        }

        let body_end = HEADER_SIZE + len;
        let stored = u32::from_le_bytes([
            rest[body_end],
            rest[body_end + 1],
            rest[body_end + 2],
            rest[body_end + 3],
        ]);
        if crc32(&rest[..body_end]) != stored {
            if rest.len() == total {
                torn_tail = true;
                break;
            }
            return Err(CatalogError::corrupted(at, "checksum mismatch"));
        }

        frames.push((at, rest[HEADER_SIZE..body_end].to_vec()));
        offset += total;
    }

    Ok(FrameScan {
        frames,
        valid_len: offset as u64,
        torn_tail,
    })
}

const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut bit = 0;
        while bit < 8 {
            c = if c & 1 == 1 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            bit += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// CRC-32 (IEEE 802.3).
pub(crate) fn crc32(data: &[u8]) -> u32 {
    !data.iter().fold(u32::MAX, |c, &b| {
        CRC_TABLE[((c ^ u32::from(b)) & 0xFF) as usize] ^ (c >> 8)
    })
}
