//! Overflow-OID page (§3.8, §4.9): a dedicated page whose single
//! slotted record holds a dense array of fixed-size objects, sorted
//! ascending by OID, forming a singly linked chain anchored at the
//! owning leaf record's trailer link.

use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{COMMON_HDR_LEN, NO_PAGE};
use crate::error::BtreeError;
use crate::oid::Oid;
use crate::page::object::ObjectInfo;
use crate::page::redo::RedoDelta;

/// Overflow page header, right after the common page-kind prefix:
/// `[next_overflow_vpid: u64]`.
pub const OVF_HDR_LEN: usize = 8;
pub const OVF_HDR_OFFSET: usize = COMMON_HDR_LEN;
pub const OVF_RECORD_OFFSET: usize = OVF_HDR_OFFSET + OVF_HDR_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OvfHeader {
    pub next_overflow_vpid: u64,
}

impl OvfHeader {
    pub fn new() -> Self {
        OvfHeader {
            next_overflow_vpid: NO_PAGE,
        }
    }

    pub fn read(buf: &[u8]) -> Self {
        OvfHeader {
            next_overflow_vpid: LittleEndian::read_u64(
                &buf[OVF_HDR_OFFSET..OVF_HDR_OFFSET + OVF_HDR_LEN],
            ),
        }
    }

    pub fn write(&self, buf: &mut [u8]) {
        LittleEndian::write_u64(
            &mut buf[OVF_HDR_OFFSET..OVF_HDR_OFFSET + OVF_HDR_LEN],
            self.next_overflow_vpid,
        );
    }
}

impl Default for OvfHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// The decoded record body: a dense, OID-sorted array of fixed-size
/// objects (§3.8, I3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OvfRecord {
    pub objects: Vec<ObjectInfo>,
}

impl OvfRecord {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for obj in &self.objects {
            debug_assert!(obj.is_fixed_size(), "overflow objects must be fixed size");
            obj.encode(&mut out, 0);
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut objects = Vec::new();
        let mut off = 0;
        while off < buf.len() {
            let (obj, _, consumed) = ObjectInfo::decode(&buf[off..], false);
            objects.push(obj);
            off += consumed;
        }
        OvfRecord { objects }
    }

    /// Insert `object` keeping ascending-by-OID order (I3), returning
    /// the redo delta for the slot insertion.
    pub fn insert_sorted(&mut self, object: ObjectInfo) -> RedoDelta {
        debug_assert!(object.is_fixed_size());
        let mut byte_off = 0usize;
        let mut pos = self.objects.len();
        for (i, o) in self.objects.iter().enumerate() {
            if o.oid > object.oid {
                pos = i;
                break;
            }
            let mut tmp = Vec::new();
            o.encode(&mut tmp, 0);
            byte_off += tmp.len();
        }
        self.objects.insert(pos, object);
        let mut bytes = Vec::new();
        object.encode(&mut bytes, 0);
        RedoDelta::Insert {
            offset: byte_off,
            bytes,
        }
    }

    pub fn remove_by_oid(&mut self, oid: Oid) -> Result<(ObjectInfo, RedoDelta), BtreeError> {
        let idx = self
            .objects
            .iter()
            .position(|o| o.oid == oid)
            .ok_or(BtreeError::OidNotFound(oid))?;
        let mut byte_off = 0usize;
        for o in &self.objects[..idx] {
            let mut tmp = Vec::new();
            o.encode(&mut tmp, 0);
            byte_off += tmp.len();
        }
        let removed = self.objects.remove(idx);
        let mut removed_bytes = Vec::new();
        removed.encode(&mut removed_bytes, 0);
        Ok((
            removed,
            RedoDelta::Delete {
                offset: byte_off,
                len: removed_bytes.len(),
            },
        ))
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn smallest_oid(&self) -> Option<Oid> {
        self.objects.first().map(|o| o.oid)
    }

    pub fn remove_smallest(&mut self) -> Option<(ObjectInfo, RedoDelta)> {
        self.objects.first().map(|o| o.oid).and_then(|oid| self.remove_by_oid(oid).ok())
    }

    /// Byte size one more fixed-size object would need, used by
    /// `find_free_in_chain` (§4.9) to test whether a page has room.
    pub fn fixed_object_size(has_class_oid: bool) -> usize {
        8 + if has_class_oid { 8 } else { 0 } + 8 + 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::MvccId;

    fn fixed(oid: Oid) -> ObjectInfo {
        ObjectInfo::with_mvcc(oid, MvccId(1), MvccId::NULL_MVCCID)
    }

    #[test]
    fn insert_sorted_keeps_ascending_order() {
        let mut rec = OvfRecord::default();
        rec.insert_sorted(fixed(Oid::new(1, 1, 5)));
        rec.insert_sorted(fixed(Oid::new(1, 1, 1)));
        rec.insert_sorted(fixed(Oid::new(1, 1, 3)));
        let oids: Vec<_> = rec.objects.iter().map(|o| o.oid).collect();
        assert_eq!(
            oids,
            vec![Oid::new(1, 1, 1), Oid::new(1, 1, 3), Oid::new(1, 1, 5)]
        );
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut rec = OvfRecord::default();
        rec.insert_sorted(fixed(Oid::new(1, 1, 2)));
        rec.insert_sorted(fixed(Oid::new(1, 1, 9)));
        let bytes = rec.encode();
        let decoded = OvfRecord::decode(&bytes);
        assert_eq!(decoded, rec);
    }

    #[test]
    fn remove_by_oid_not_found() {
        let mut rec = OvfRecord::default();
        rec.insert_sorted(fixed(Oid::new(1, 1, 2)));
        assert!(rec.remove_by_oid(Oid::new(9, 9, 9)).is_err());
    }

    #[test]
    fn header_roundtrip() {
        let mut buf = vec![0u8; 64];
        let h = OvfHeader {
            next_overflow_vpid: 42,
        };
        h.write(&mut buf);
        assert_eq!(OvfHeader::read(&buf).next_overflow_vpid, 42);
    }
}
