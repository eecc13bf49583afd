//! Multi-record page body (§3.7, §A.7 "slotted page"): a leaf or
//! non-leaf page holds a small slot directory (count + offset/length
//! pairs) right after the node header, with record bytes packed from
//! the trailer backward, unallocated space in between.
//!
//! Every mutation that touches a leaf/non-leaf page's body is applied
//! by decoding the full set of records, mutating the in-memory list,
//! and calling `rebuild` to produce a brand-new page image — the tree
//! layer then hands that whole image to `pager::commit::SystemOp` as a
//! single whole-page `RedoDelta::UpdateAll`. This trades a few extra
//! logged bytes per mutation for never having to track how a record's
//! resize shifts every slot after it; see DESIGN.md.

use byteorder::{ByteOrder, LittleEndian};

use crate::consts::TRAILER_LEN;
use crate::page::header::{NodeHeader, RootExtra, NODE_HDR_LEN, NODE_HDR_OFFSET, ROOT_EXTRA_LEN};
use crate::page::{init_common_header, PageKind};

/// `[offset: u32][len: u32]` per record.
pub const SLOT_ENTRY_LEN: usize = 8;
/// `[slot_count: u16][reserved: u16]` before the entries.
const SLOT_DIR_HDR_LEN: usize = 4;

pub fn body_start(is_root: bool) -> usize {
    let base = NODE_HDR_OFFSET + NODE_HDR_LEN;
    if is_root {
        base + ROOT_EXTRA_LEN
    } else {
        base
    }
}

fn slot_dir_offset(is_root: bool) -> usize {
    body_start(is_root)
}

pub fn read_slot_count(page: &[u8], is_root: bool) -> usize {
    let off = slot_dir_offset(is_root);
    LittleEndian::read_u16(&page[off..off + 2]) as usize
}

fn slot_entry_offset(is_root: bool, i: usize) -> usize {
    slot_dir_offset(is_root) + SLOT_DIR_HDR_LEN + i * SLOT_ENTRY_LEN
}

pub fn read_slot(page: &[u8], is_root: bool, i: usize) -> (usize, usize) {
    let e = slot_entry_offset(is_root, i);
    let off = LittleEndian::read_u32(&page[e..e + 4]) as usize;
    let len = LittleEndian::read_u32(&page[e + 4..e + 8]) as usize;
    (off, len)
}

pub fn record_bytes(page: &[u8], is_root: bool, i: usize) -> &[u8] {
    let (off, len) = read_slot(page, is_root, i);
    &page[off..off + len]
}

pub fn all_record_bytes(page: &[u8], is_root: bool) -> Vec<Vec<u8>> {
    (0..read_slot_count(page, is_root))
        .map(|i| record_bytes(page, is_root, i).to_vec())
        .collect()
}

/// Rebuild a whole leaf/non-leaf page image from scratch. `records[0]`
/// becomes slot 0 and so on; callers keep leaf records sorted by key
/// (with any fence records at the ends) and non-leaf records sorted by
/// separator key with the dummy leftmost at slot 0.
pub fn rebuild(
    page_size: usize,
    kind: PageKind,
    page_id: u64,
    is_root: bool,
    node_header: &NodeHeader,
    root_extra: Option<&RootExtra>,
    records: &[Vec<u8>],
) -> Vec<u8> {
    let mut page = vec![0u8; page_size];
    init_common_header(&mut page, kind, page_id);
    node_header.write(&mut page);
    if let Some(extra) = root_extra {
        extra.write(&mut page);
    }

    let dir_off = slot_dir_offset(is_root);
    let n = records.len();
    LittleEndian::write_u16(&mut page[dir_off..dir_off + 2], n as u16);
    LittleEndian::write_u16(&mut page[dir_off + 2..dir_off + 4], 0);

    let mut cursor = page_size - TRAILER_LEN;
    for (i, rec) in records.iter().enumerate() {
        cursor -= rec.len();
        page[cursor..cursor + rec.len()].copy_from_slice(rec);
        let e = dir_off + SLOT_DIR_HDR_LEN + i * SLOT_ENTRY_LEN;
        LittleEndian::write_u32(&mut page[e..e + 4], cursor as u32);
        LittleEndian::write_u32(&mut page[e + 4..e + 8], rec.len() as u32);
    }
    page
}

/// Bytes of free space left between the end of the slot directory and
/// the start of the packed record area, used by the split/merge
/// load-factor checks (§4.4, §4.5).
pub fn free_space(page_size: usize, is_root: bool, n_records: usize, records_bytes_total: usize) -> usize {
    let dir_end = slot_dir_offset(is_root) + SLOT_DIR_HDR_LEN + n_records * SLOT_ENTRY_LEN;
    let records_start = page_size - TRAILER_LEN - records_bytes_total;
    records_start.saturating_sub(dir_end)
}

/// Usable body size (everything between the header and the trailer),
/// the denominator for a node's load factor.
pub fn usable_body_size(page_size: usize, is_root: bool) -> usize {
    (page_size - TRAILER_LEN).saturating_sub(body_start(is_root))
}

/// Whether `n_records` totaling `total_record_bytes` (their encoded
/// lengths summed) fit in one page, slot directory included. Checked
/// up front so a caller never hands `rebuild` a layout that would
/// underflow its packing cursor.
pub fn fits(page_size: usize, is_root: bool, n_records: usize, total_record_bytes: usize) -> bool {
    let dir_end = slot_dir_offset(is_root) + SLOT_DIR_HDR_LEN + n_records * SLOT_ENTRY_LEN;
    dir_end + total_record_bytes <= page_size - TRAILER_LEN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::header::NodeHeader;

    #[test]
    fn rebuild_and_read_roundtrip() {
        let recs = vec![vec![1u8, 2, 3], vec![4u8, 5, 6, 7], vec![9u8]];
        let page = rebuild(4096, PageKind::Leaf, 5, false, &NodeHeader::new_leaf(), None, &recs);
        assert_eq!(read_slot_count(&page, false), 3);
        assert_eq!(record_bytes(&page, false, 0), &recs[0][..]);
        assert_eq!(record_bytes(&page, false, 1), &recs[1][..]);
        assert_eq!(record_bytes(&page, false, 2), &recs[2][..]);
        assert_eq!(all_record_bytes(&page, false), recs);
    }

    #[test]
    fn empty_page_has_zero_slots() {
        let page = rebuild(4096, PageKind::Leaf, 0, true, &NodeHeader::new_leaf(), None, &[]);
        assert_eq!(read_slot_count(&page, true), 0);
    }
}
