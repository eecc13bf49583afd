//! Page trailer: `[page_lsn: u64][checksum: u32][reserved: u32]`,
//! the last `TRAILER_LEN` bytes of every page. The checksum is a
//! CRC32C over the whole page with the checksum field zeroed, matching
//! the teacher's 2.0-generation checksum scheme (the 2.1 AEAD/TDE
//! trailer variant is out of scope — crypto and on-the-fly re-keying
//! belong to a different layer entirely). `page_lsn` is the LSN of the
//! last WAL record successfully applied to this page, read by replay
//! to decide whether a record must be re-applied (§4.10's "redo replay
//! for a leaf/overflow page is idempotent given the page LSA and the
//! diff").

use std::sync::OnceLock;

use byteorder::{ByteOrder, LittleEndian};

use crate::consts::TRAILER_LEN;

const LSN_LEN: usize = 8;
const CRC_LEN: usize = 4;

fn checksum_disabled() -> bool {
    static DISABLED: OnceLock<bool> = OnceLock::new();
    *DISABLED.get_or_init(|| {
        std::env::var("BTREE_DISABLE_PAGE_CHECKSUM")
            .ok()
            .map(|s| s.trim().to_ascii_lowercase())
            .map(|s| s == "1" || s == "true" || s == "yes" || s == "on")
            .unwrap_or(false)
    })
}

fn trailer_offset(page: &[u8]) -> usize {
    page.len() - TRAILER_LEN
}

fn crc_offset(page: &[u8]) -> usize {
    trailer_offset(page) + LSN_LEN
}

pub fn page_lsn(page: &[u8]) -> u64 {
    let off = trailer_offset(page);
    LittleEndian::read_u64(&page[off..off + LSN_LEN])
}

pub fn set_page_lsn(page: &mut [u8], lsn: u64) {
    let off = trailer_offset(page);
    LittleEndian::write_u64(&mut page[off..off + LSN_LEN], lsn);
}

pub fn compute_crc32c(page: &[u8]) -> u32 {
    let off = crc_offset(page);
    let mut tmp = page.to_vec();
    tmp[off..off + CRC_LEN].copy_from_slice(&[0, 0, 0, 0]);
    crc32c::crc32c(&tmp)
}

pub fn update_checksum(page: &mut [u8]) {
    if checksum_disabled() {
        return;
    }
    let off = crc_offset(page);
    let saved: [u8; 4] = page[off..off + CRC_LEN].try_into().unwrap();
    page[off..off + CRC_LEN].copy_from_slice(&[0, 0, 0, 0]);
    let crc = crc32c::crc32c(page);
    page[off..off + CRC_LEN].copy_from_slice(&saved);
    LittleEndian::write_u32(&mut page[off..off + CRC_LEN], crc);
}

pub fn verify_checksum(page: &[u8]) -> bool {
    if checksum_disabled() {
        return true;
    }
    let off = crc_offset(page);
    let stored = LittleEndian::read_u32(&page[off..off + CRC_LEN]);
    if stored == 0 {
        // Treat an all-zero trailer as "not yet checksummed" for
        // compatibility with freshly allocated pages.
        return true;
    }
    stored == compute_crc32c(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_roundtrip() {
        let mut page = vec![0u8; 256];
        for (i, b) in page.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let off = crc_offset(&page);
        page[off..off + CRC_LEN].copy_from_slice(&[0, 0, 0, 0]);
        update_checksum(&mut page);
        assert!(verify_checksum(&page));
        page[0] ^= 0xFF;
        assert!(!verify_checksum(&page));
    }

    #[test]
    fn page_lsn_roundtrip() {
        let mut page = vec![0u8; 256];
        set_page_lsn(&mut page, 0xdead_beef_cafe);
        update_checksum(&mut page);
        assert_eq!(page_lsn(&page), 0xdead_beef_cafe);
        assert!(verify_checksum(&page));
    }
}
