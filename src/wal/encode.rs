//! Record header framing and per-diff-shape payload codec (§4.10).
//!
//! Wire shapes, matching the record-mutation functions' `RedoDelta`
//! return type one-for-one:
//!
//! - `WAL_REC_RV_DELETE`:        `[offset:u32][len:u32]`
//! - `WAL_REC_RV_INSERT`:        `[offset:u32][bytes...]`
//! - `WAL_REC_RV_UPDATE_ALL`:    `[offset:u32][old_len:u32][new_bytes...]`
//! - `WAL_REC_RV_UPDATE_PARTIAL`: `[n_pieces:u16][piece...]` where each
//!   piece is `[offset:u32][old_len:u32][new_len:u32][new_bytes...]`
//! - `BEGIN`/`COMMIT`/`TRUNCATE`: empty payload.

use std::io::Write;

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{
    WAL_REC_HDR_SIZE, WAL_REC_OFF_CRC32, WAL_REC_OFF_FLAGS, WAL_REC_OFF_LEN, WAL_REC_OFF_LSN,
    WAL_REC_OFF_PAGE_ID, WAL_REC_OFF_RESERVED, WAL_REC_OFF_TYPE, WAL_REC_RV_DELETE,
    WAL_REC_RV_INSERT, WAL_REC_RV_UPDATE_ALL, WAL_REC_RV_UPDATE_PARTIAL,
};
use crate::page::redo::{PartialUpdate, RedoDelta};

#[inline]
pub fn crc32c_of_parts(head_without_crc: &[u8], payload: &[u8]) -> u32 {
    let c = crc32c::crc32c_append(0, head_without_crc);
    crc32c::crc32c_append(c, payload)
}

pub fn build_hdr_with_crc(
    rec_type: u8,
    flags: u8,
    lsn: u64,
    page_id: u64,
    payload: &[u8],
) -> [u8; WAL_REC_HDR_SIZE] {
    let mut hdr = [0u8; WAL_REC_HDR_SIZE];
    hdr[WAL_REC_OFF_TYPE] = rec_type;
    hdr[WAL_REC_OFF_FLAGS] = flags;
    LittleEndian::write_u16(&mut hdr[WAL_REC_OFF_RESERVED..WAL_REC_OFF_RESERVED + 2], 0);
    LittleEndian::write_u64(&mut hdr[WAL_REC_OFF_LSN..WAL_REC_OFF_LSN + 8], lsn);
    LittleEndian::write_u64(
        &mut hdr[WAL_REC_OFF_PAGE_ID..WAL_REC_OFF_PAGE_ID + 8],
        page_id,
    );
    LittleEndian::write_u32(
        &mut hdr[WAL_REC_OFF_LEN..WAL_REC_OFF_LEN + 4],
        payload.len() as u32,
    );
    let crc = crc32c_of_parts(&hdr[..WAL_REC_OFF_CRC32], payload);
    LittleEndian::write_u32(&mut hdr[WAL_REC_OFF_CRC32..WAL_REC_OFF_CRC32 + 4], crc);
    hdr
}

pub fn write_record<W: Write>(
    writer: &mut W,
    rec_type: u8,
    flags: u8,
    lsn: u64,
    page_id: u64,
    payload: &[u8],
) -> Result<()> {
    let hdr = build_hdr_with_crc(rec_type, flags, lsn, page_id, payload);
    writer.write_all(&hdr)?;
    writer.write_all(payload)?;
    Ok(())
}

/// Encode a `RedoDelta` into `(rec_type, payload)`. Returns `None` for
/// `RedoDelta::None` (no durable change, nothing to log).
pub fn encode_delta(delta: &RedoDelta) -> Option<(u8, Vec<u8>)> {
    match delta {
        RedoDelta::None => None,
        RedoDelta::Delete { offset, len } => {
            let mut p = Vec::with_capacity(8);
            p.extend_from_slice(&(*offset as u32).to_le_bytes());
            p.extend_from_slice(&(*len as u32).to_le_bytes());
            Some((WAL_REC_RV_DELETE, p))
        }
        RedoDelta::Insert { offset, bytes } => {
            let mut p = Vec::with_capacity(4 + bytes.len());
            p.extend_from_slice(&(*offset as u32).to_le_bytes());
            p.extend_from_slice(bytes);
            Some((WAL_REC_RV_INSERT, p))
        }
        RedoDelta::UpdateAll {
            offset,
            old_len,
            new_bytes,
        } => {
            let mut p = Vec::with_capacity(8 + new_bytes.len());
            p.extend_from_slice(&(*offset as u32).to_le_bytes());
            p.extend_from_slice(&(*old_len as u32).to_le_bytes());
            p.extend_from_slice(new_bytes);
            Some((WAL_REC_RV_UPDATE_ALL, p))
        }
        RedoDelta::UpdatePartial { pieces } => {
            let mut p = Vec::new();
            p.extend_from_slice(&(pieces.len() as u16).to_le_bytes());
            for piece in pieces {
                p.extend_from_slice(&(piece.offset as u32).to_le_bytes());
                p.extend_from_slice(&(piece.old_len as u32).to_le_bytes());
                p.extend_from_slice(&(piece.new_bytes.len() as u32).to_le_bytes());
                p.extend_from_slice(&piece.new_bytes);
            }
            Some((WAL_REC_RV_UPDATE_PARTIAL, p))
        }
    }
}

/// Decode a diff-record payload back into a `RedoDelta`, the inverse
/// of `encode_delta`, used by replay to re-apply the change to a page.
pub fn decode_delta(rec_type: u8, payload: &[u8]) -> RedoDelta {
    match rec_type {
        WAL_REC_RV_DELETE => RedoDelta::Delete {
            offset: LittleEndian::read_u32(&payload[0..4]) as usize,
            len: LittleEndian::read_u32(&payload[4..8]) as usize,
        },
        WAL_REC_RV_INSERT => RedoDelta::Insert {
            offset: LittleEndian::read_u32(&payload[0..4]) as usize,
            bytes: payload[4..].to_vec(),
        },
        WAL_REC_RV_UPDATE_ALL => RedoDelta::UpdateAll {
            offset: LittleEndian::read_u32(&payload[0..4]) as usize,
            old_len: LittleEndian::read_u32(&payload[4..8]) as usize,
            new_bytes: payload[8..].to_vec(),
        },
        WAL_REC_RV_UPDATE_PARTIAL => {
            let n = LittleEndian::read_u16(&payload[0..2]) as usize;
            let mut pieces = Vec::with_capacity(n);
            let mut off = 2;
            for _ in 0..n {
                let offset = LittleEndian::read_u32(&payload[off..off + 4]) as usize;
                let old_len = LittleEndian::read_u32(&payload[off + 4..off + 8]) as usize;
                let new_len = LittleEndian::read_u32(&payload[off + 8..off + 12]) as usize;
                let start = off + 12;
                let new_bytes = payload[start..start + new_len].to_vec();
                off = start + new_len;
                pieces.push(PartialUpdate {
                    offset,
                    old_len,
                    new_bytes,
                });
            }
            RedoDelta::UpdatePartial { pieces }
        }
        _ => RedoDelta::None,
    }
}

/// Apply a decoded `RedoDelta` to a record's byte buffer, mirroring
/// what the original mutation did in memory (used by replay, which
/// reconstructs the in-page record bytes rather than re-running the
/// higher-level insert/delete logic).
pub fn apply_delta(buf: &mut Vec<u8>, delta: &RedoDelta) {
    match delta {
        RedoDelta::None => {}
        RedoDelta::Delete { offset, len } => {
            buf.drain(*offset..*offset + *len);
        }
        RedoDelta::Insert { offset, bytes } => {
            buf.splice(*offset..*offset, bytes.iter().copied());
        }
        RedoDelta::UpdateAll {
            offset,
            old_len,
            new_bytes,
        } => {
            buf.splice(*offset..*offset + *old_len, new_bytes.iter().copied());
        }
        RedoDelta::UpdatePartial { pieces } => {
            // Applied back-to-front so earlier offsets stay valid as
            // later pieces shift the buffer length.
            for piece in pieces.iter().rev() {
                buf.splice(
                    piece.offset..piece.offset + piece.old_len,
                    piece.new_bytes.iter().copied(),
                );
            }
        }
    }
}
