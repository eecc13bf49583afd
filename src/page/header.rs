//! Node header (§3.7): the fixed fields present on every leaf/non-leaf
//! page, plus the extra fields carried only on the root page.
//!
//! Layout, starting right after the common page-kind prefix
//! (`consts::COMMON_HDR_LEN`):
//!
//!   [node_level: u16][max_key_len: u16]
//!   [prev_vpid: u64][next_vpid: u64]
//!   [split_pivot: f32][split_index: u32]
//!   [common_prefix_count: u16][reserved: u16]
//!
//! followed, on the root page only, by:
//!
//!   [key_type_tag: u32][flags: u16][reserved: u16]
//!   [top_class_oid: 8][overflow_key_file_id: u32]
//!   [num_nulls: u64][num_oids: u64][num_keys: u64]
//!   [revision: u32]

use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{COMMON_HDR_LEN, NO_PAGE};
use crate::oid::Oid;

pub const NODE_HDR_LEN: usize = 32;
pub const ROOT_EXTRA_LEN: usize = 48;

pub const NODE_HDR_OFFSET: usize = COMMON_HDR_LEN;
pub const ROOT_EXTRA_OFFSET: usize = NODE_HDR_OFFSET + NODE_HDR_LEN;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeHeader {
    /// Leaf nodes are level 1; each non-leaf level is child level + 1.
    pub node_level: u16,
    pub max_key_len: u16,
    pub prev_vpid: u64,
    pub next_vpid: u64,
    /// Running-average split pivot in [0, 1], see §4.4.
    pub split_pivot: f32,
    pub split_index: u32,
    /// Leading columns stripped from every non-fence key in this leaf,
    /// recomputed from the fence pair on split/merge/compact (§3.6).
    /// Always 0 on non-leaf nodes.
    pub common_prefix_count: u16,
}

impl NodeHeader {
    pub fn new_leaf() -> Self {
        NodeHeader {
            node_level: 1,
            max_key_len: 0,
            prev_vpid: NO_PAGE,
            next_vpid: NO_PAGE,
            split_pivot: 0.5,
            split_index: 0,
            common_prefix_count: 0,
        }
    }

    pub fn new_nonleaf(child_level: u16) -> Self {
        NodeHeader {
            node_level: child_level + 1,
            max_key_len: 0,
            prev_vpid: NO_PAGE,
            next_vpid: NO_PAGE,
            split_pivot: 0.5,
            split_index: 0,
            common_prefix_count: 0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.node_level == 1
    }

    pub fn read(buf: &[u8]) -> Self {
        let b = &buf[NODE_HDR_OFFSET..NODE_HDR_OFFSET + NODE_HDR_LEN];
        NodeHeader {
            node_level: LittleEndian::read_u16(&b[0..2]),
            max_key_len: LittleEndian::read_u16(&b[2..4]),
            prev_vpid: LittleEndian::read_u64(&b[4..12]),
            next_vpid: LittleEndian::read_u64(&b[12..20]),
            split_pivot: f32::from_bits(LittleEndian::read_u32(&b[20..24])),
            split_index: LittleEndian::read_u32(&b[24..28]),
            common_prefix_count: LittleEndian::read_u16(&b[28..30]),
        }
    }

    pub fn write(&self, buf: &mut [u8]) {
        let b = &mut buf[NODE_HDR_OFFSET..NODE_HDR_OFFSET + NODE_HDR_LEN];
        LittleEndian::write_u16(&mut b[0..2], self.node_level);
        LittleEndian::write_u16(&mut b[2..4], self.max_key_len);
        LittleEndian::write_u64(&mut b[4..12], self.prev_vpid);
        LittleEndian::write_u64(&mut b[12..20], self.next_vpid);
        LittleEndian::write_u32(&mut b[20..24], self.split_pivot.to_bits());
        LittleEndian::write_u32(&mut b[24..28], self.split_index);
        LittleEndian::write_u16(&mut b[28..30], self.common_prefix_count);
        LittleEndian::write_u16(&mut b[30..32], 0);
    }

    /// Update the in-page max-key length, which must be monotonic: a
    /// parent's max-key-length is never allowed to drop below any
    /// child's (§3.7 invariant `parent.max_key_length >= child.max_key_length`).
    pub fn bump_max_key_len(&mut self, observed: u16) {
        if observed > self.max_key_len {
            self.max_key_len = observed;
        }
    }

    /// Cumulative moving average update of the split pivot, driven by
    /// every operation that visits this node (§4.4 "split-info running
    /// average"). `slot` and `key_count` give the normalized operation
    /// position; `key_count == 0` leaves the pivot untouched.
    pub fn update_split_pivot(&mut self, slot: usize, key_count: usize) {
        if key_count == 0 {
            return;
        }
        let pos = (slot as f32 / key_count as f32).clamp(0.0, 1.0);
        self.split_index += 1;
        let n = self.split_index as f32;
        self.split_pivot += (pos - self.split_pivot) / n;
        self.split_pivot = self.split_pivot.clamp(0.0, 1.0);
    }
}

/// Root-only flag bits.
pub struct RootFlags;
impl RootFlags {
    pub const UNIQUE: u16 = 0x1;
    pub const PRIMARY_KEY: u16 = 0x2;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootExtra {
    pub key_type_tag: u32,
    pub flags: u16,
    pub top_class_oid: Oid,
    pub overflow_key_file_id: u32,
    pub num_nulls: u64,
    pub num_oids: u64,
    pub num_keys: u64,
    pub revision: u32,
}

impl RootExtra {
    pub fn new(key_type_tag: u32, unique: bool, primary_key: bool) -> Self {
        let mut flags = 0u16;
        if unique {
            flags |= RootFlags::UNIQUE;
        }
        if primary_key {
            flags |= RootFlags::PRIMARY_KEY;
        }
        RootExtra {
            key_type_tag,
            flags,
            top_class_oid: Oid::NULL,
            overflow_key_file_id: 0,
            num_nulls: 0,
            num_oids: 0,
            num_keys: 0,
            revision: 0,
        }
    }

    pub fn is_unique(&self) -> bool {
        self.flags & RootFlags::UNIQUE != 0
    }

    pub fn is_primary_key(&self) -> bool {
        self.flags & RootFlags::PRIMARY_KEY != 0
    }

    pub fn read(buf: &[u8]) -> Self {
        let b = &buf[ROOT_EXTRA_OFFSET..ROOT_EXTRA_OFFSET + ROOT_EXTRA_LEN];
        let key_type_tag = LittleEndian::read_u32(&b[0..4]);
        let flags = LittleEndian::read_u16(&b[4..6]);
        let top_class_oid_bytes = &b[8..16];
        let (top_class_oid, _, _) = Oid::decode(top_class_oid_bytes);
        let overflow_key_file_id = LittleEndian::read_u32(&b[16..20]);
        let num_nulls = LittleEndian::read_u64(&b[20..28]);
        let num_oids = LittleEndian::read_u64(&b[28..36]);
        let num_keys = LittleEndian::read_u64(&b[36..44]);
        let revision = LittleEndian::read_u32(&b[44..48]);
        RootExtra {
            key_type_tag,
            flags,
            top_class_oid,
            overflow_key_file_id,
            num_nulls,
            num_oids,
            num_keys,
            revision,
        }
    }

    pub fn write(&self, buf: &mut [u8]) {
        let b = &mut buf[ROOT_EXTRA_OFFSET..ROOT_EXTRA_OFFSET + ROOT_EXTRA_LEN];
        LittleEndian::write_u32(&mut b[0..4], self.key_type_tag);
        LittleEndian::write_u16(&mut b[4..6], self.flags);
        LittleEndian::write_u16(&mut b[6..8], 0);
        b[8..16].copy_from_slice(&self.top_class_oid.encode(0, 0));
        LittleEndian::write_u32(&mut b[16..20], self.overflow_key_file_id);
        LittleEndian::write_u64(&mut b[20..28], self.num_nulls);
        LittleEndian::write_u64(&mut b[28..36], self.num_oids);
        LittleEndian::write_u64(&mut b[36..44], self.num_keys);
        LittleEndian::write_u32(&mut b[44..48], self.revision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_header_roundtrip() {
        let mut buf = vec![0u8; 128];
        let mut h = NodeHeader::new_leaf();
        h.bump_max_key_len(17);
        h.update_split_pivot(3, 10);
        h.write(&mut buf);
        let h2 = NodeHeader::read(&buf);
        assert_eq!(h, h2);
        assert_eq!(h2.max_key_len, 17);
    }

    #[test]
    fn root_extra_roundtrip() {
        let mut buf = vec![0u8; 256];
        let extra = RootExtra::new(1, true, false);
        extra.write(&mut buf);
        let extra2 = RootExtra::read(&buf);
        assert_eq!(extra, extra2);
        assert!(extra2.is_unique());
        assert!(!extra2.is_primary_key());
    }

    #[test]
    fn max_key_len_is_monotonic() {
        let mut h = NodeHeader::new_leaf();
        h.bump_max_key_len(10);
        h.bump_max_key_len(4);
        assert_eq!(h.max_key_len, 10);
    }
}
