//! Sequential WAL record reader with CRC32C validation.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::consts::{
    WAL_REC_HDR_SIZE, WAL_REC_OFF_CRC32, WAL_REC_OFF_FLAGS, WAL_REC_OFF_LEN, WAL_REC_OFF_LSN,
    WAL_REC_OFF_PAGE_ID, WAL_REC_OFF_TYPE,
};
use crate::wal::encode::crc32c_of_parts;

#[derive(Debug, Clone)]
pub struct WalRecord {
    pub rec_type: u8,
    pub flags: u8,
    pub lsn: u64,
    /// 0 for non-page records (BEGIN/COMMIT/TRUNCATE).
    pub page_id: u64,
    pub payload: Vec<u8>,
    pub pos: u64,
    pub len_total: u64,
}

/// Read one record at `pos`. Returns `Ok(None)` on a clean EOF or a
/// partial trailing record (a crash mid-append), either of which
/// replay treats as "nothing more to apply".
pub fn read_next(f: &mut File, pos: u64, file_len: u64) -> Result<Option<(WalRecord, u64)>> {
    if pos + WAL_REC_HDR_SIZE as u64 > file_len {
        return Ok(None);
    }
    f.seek(SeekFrom::Start(pos))?;
    let mut hdr = [0u8; WAL_REC_HDR_SIZE];
    if let Err(e) = f.read_exact(&mut hdr) {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Ok(None);
        }
        return Err(anyhow!("wal read header: {}", e));
    }

    let payload_len = LittleEndian::read_u32(&hdr[WAL_REC_OFF_LEN..WAL_REC_OFF_LEN + 4]) as usize;
    let total = WAL_REC_HDR_SIZE as u64 + payload_len as u64;
    let next_pos = pos + total;
    if next_pos > file_len {
        return Ok(None);
    }

    let mut payload = vec![0u8; payload_len];
    if let Err(e) = f.read_exact(&mut payload) {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Ok(None);
        }
        return Err(anyhow!("wal read payload: {}", e));
    }

    let stored_crc = LittleEndian::read_u32(&hdr[WAL_REC_OFF_CRC32..WAL_REC_OFF_CRC32 + 4]);
    let calc_crc = crc32c_of_parts(&hdr[..WAL_REC_OFF_CRC32], &payload);
    if stored_crc != calc_crc {
        return Err(anyhow!(
            "WAL CRC mismatch at pos {} (stored={}, calc={})",
            pos,
            stored_crc,
            calc_crc
        ));
    }

    let rec = WalRecord {
        rec_type: hdr[WAL_REC_OFF_TYPE],
        flags: hdr[WAL_REC_OFF_FLAGS],
        lsn: LittleEndian::read_u64(&hdr[WAL_REC_OFF_LSN..WAL_REC_OFF_LSN + 8]),
        page_id: LittleEndian::read_u64(&hdr[WAL_REC_OFF_PAGE_ID..WAL_REC_OFF_PAGE_ID + 8]),
        payload,
        pos,
        len_total: total,
    };
    Ok(Some((rec, next_pos)))
}
