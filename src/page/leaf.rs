//! Leaf record layout and record codec (§3.3, §4.1).
//!
//! `[first-object][packed key, aligned to 4][2nd obj]...[nth obj]
//!  [overflow-OID link: 6 bytes aligned to 4]?`
//!
//! The record is decoded/encoded as a whole rather than patched via a
//! page-backed `Record<'a>` view, since the slotted-page store itself is
//! one of the out-of-scope collaborators (§1); callers own the record
//! bytes for the duration of a mutation and hand the returned
//! `RedoDelta` to the WAL layer.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::BtreeError;
use crate::keytype::KeyType;
use crate::oid::{record_flags, Oid};
use crate::page::fence;
use crate::page::object::ObjectInfo;
use crate::page::redo::RedoDelta;

pub fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Length of the key area for a record whose key is stored out-of-page
/// (the in-record placeholder is just a virtual page id into the
/// overflow-key file).
pub const OVERFLOW_KEY_PLACEHOLDER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafRecord {
    pub objects: Vec<ObjectInfo>,
    pub key: Vec<u8>,
    pub is_fence: bool,
    pub overflow_key: bool,
    pub overflow_oids_link: Option<u64>,
}

impl LeafRecord {
    pub fn new(key: Vec<u8>, first_object: ObjectInfo) -> Self {
        LeafRecord {
            objects: vec![first_object],
            key,
            is_fence: false,
            overflow_key: false,
            overflow_oids_link: None,
        }
    }

    pub fn fence(key: Vec<u8>) -> Self {
        LeafRecord {
            objects: vec![ObjectInfo::new(Oid::NULL)],
            key,
            is_fence: true,
            overflow_key: false,
            overflow_oids_link: None,
        }
    }

    fn first_extra_flags(&self) -> u16 {
        let mut f = 0u16;
        if self.is_fence {
            f |= record_flags::FENCE;
        }
        if self.overflow_oids_link.is_some() {
            f |= record_flags::OVERFLOW_OIDS;
        }
        if self.overflow_key {
            f |= record_flags::OVERFLOW_KEY;
        }
        f
    }

    /// Debug-mode invariant check mirroring §4.1's checked invariants.
    pub fn debug_check_invariants(&self) -> Result<(), BtreeError> {
        if self.objects.is_empty() {
            return Err(BtreeError::CorruptLayout("empty leaf record".into()));
        }
        if self.overflow_oids_link.is_some() && !self.objects[0].is_fixed_size() {
            return Err(BtreeError::CorruptLayout(
                "OVERFLOW_OIDS set but first object is not fixed size".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for o in &self.objects {
            if !seen.insert(o.oid) {
                return Err(BtreeError::CorruptLayout(format!(
                    "duplicate OID {:?} in leaf record",
                    o.oid
                )));
            }
        }
        Ok(())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.objects[0].encode(&mut out, self.first_extra_flags());
        let key_start = out.len();
        out.extend_from_slice(&self.key);
        let padded = align4(out.len() - key_start);
        out.resize(key_start + padded, 0);

        for obj in &self.objects[1..] {
            obj.encode(&mut out, 0);
        }

        if let Some(vpid) = self.overflow_oids_link {
            write_vpid6_aligned(&mut out, vpid);
        }
        out
    }

    /// Encode this record for on-page storage, stripping the leaf's
    /// compressible key prefix (§3.6) from non-fence keys. Fence records
    /// always carry their full key regardless of `n_stripped_columns`.
    pub fn encode_with_prefix(&self, key_type: &KeyType, n_stripped_columns: usize) -> Vec<u8> {
        if self.is_fence || self.overflow_key || n_stripped_columns == 0 {
            return self.encode();
        }
        let mut tmp = self.clone();
        tmp.key = fence::strip_prefix(key_type, &self.key, n_stripped_columns);
        tmp.encode()
    }

    /// Decode a leaf record given the external record length (as
    /// reported by the slotted-page layer) and the key-type descriptor
    /// needed to find the key/object boundary when the key is stored
    /// in-page. `is_unique` decides whether non-first objects carry a
    /// class-OID column (§3.2). `n_stripped_columns` is the leaf's
    /// current common-prefix-count (§3.6); the returned `key` is still
    /// the on-page (possibly prefix-stripped) bytes — callers reconstruct
    /// the full key against the leaf's lower fence.
    pub fn decode(
        buf: &[u8],
        record_len: usize,
        key_type: &KeyType,
        is_unique: bool,
        n_stripped_columns: usize,
    ) -> Self {
        let (_, rflags, _) = Oid::decode(&buf[0..8]);
        let is_fence = rflags & record_flags::FENCE != 0;
        let overflow_oids = rflags & record_flags::OVERFLOW_OIDS != 0;
        let overflow_key = rflags & record_flags::OVERFLOW_KEY != 0;
        let first_has_class_oid = rflags & record_flags::CLASS_OID != 0;

        let (first_obj, _, first_len) = ObjectInfo::decode(buf, first_has_class_oid);
        let key_start = first_len;
        let key_len = if overflow_key {
            OVERFLOW_KEY_PLACEHOLDER_LEN
        } else if is_fence {
            // Fences carry a full, self-contained key copy; the caller
            // supplies the exact record_len so the remainder (minus
            // alignment padding) is the key.
            record_len - key_start
        } else {
            key_type_len_at(key_type, &buf[key_start..], n_stripped_columns)
        };
        let key = buf[key_start..key_start + key_len].to_vec();
        let mut off = key_start + align4(key_len);

        let tail_len = if overflow_oids { 8 } else { 0 };
        let objects_end = record_len - tail_len;

        let mut objects = vec![first_obj];
        while off < objects_end {
            let (obj, _, consumed) = ObjectInfo::decode(&buf[off..], is_unique);
            objects.push(obj);
            off += consumed;
        }

        let overflow_oids_link = if overflow_oids {
            Some(read_vpid6_aligned(&buf[objects_end..record_len]))
        } else {
            None
        };

        LeafRecord {
            objects,
            key,
            is_fence,
            overflow_key,
            overflow_oids_link,
        }
    }

    pub fn change_first_object(&mut self, new_first: ObjectInfo) -> RedoDelta {
        let old = self.encode();
        self.objects[0] = new_first;
        let new = self.encode();
        RedoDelta::update_all(0, old.len(), new)
    }

    pub fn append_object_at_end(&mut self, object: ObjectInfo) -> RedoDelta {
        let old_len = self.encode().len();
        // insertion point is right before the optional overflow link tail
        let insert_off = old_len - if self.overflow_oids_link.is_some() { 8 } else { 0 };
        self.objects.push(object);
        let mut bytes = Vec::new();
        object.encode(&mut bytes, 0);
        RedoDelta::Insert {
            offset: insert_off,
            bytes,
        }
    }

    pub fn insert_object_sorted_by_oid(&mut self, object: ObjectInfo) -> RedoDelta {
        let mut pos = 1;
        let mut byte_off = {
            let mut out = Vec::new();
            self.objects[0].encode(&mut out, self.first_extra_flags());
            let key_start = out.len();
            align4(key_start + self.key.len())
        };
        for (i, o) in self.objects.iter().enumerate().skip(1) {
            if o.oid > object.oid {
                pos = i;
                break;
            }
            let mut tmp = Vec::new();
            o.encode(&mut tmp, 0);
            byte_off += tmp.len();
            pos = i + 1;
        }
        self.objects.insert(pos, object);
        let mut bytes = Vec::new();
        object.encode(&mut bytes, 0);
        RedoDelta::Insert {
            offset: byte_off,
            bytes,
        }
    }

    pub fn remove_object_at(&mut self, index: usize) -> Result<RedoDelta, BtreeError> {
        if index >= self.objects.len() {
            return Err(BtreeError::OidNotFound(Oid::NULL));
        }
        let byte_off = self.object_byte_offset(index);
        let mut removed_bytes = Vec::new();
        self.objects[index].encode(&mut removed_bytes, if index == 0 { self.first_extra_flags() } else { 0 });
        self.objects.remove(index);
        Ok(RedoDelta::Delete {
            offset: byte_off,
            len: removed_bytes.len(),
        })
    }

    pub fn set_overflow_link(&mut self, new_vpid: Option<u64>) -> RedoDelta {
        let old_len = self.encode().len();
        let old_had = self.overflow_oids_link.is_some();
        self.overflow_oids_link = new_vpid;
        match (old_had, new_vpid.is_some()) {
            (false, true) => RedoDelta::Insert {
                offset: old_len,
                bytes: {
                    let mut b = Vec::new();
                    write_vpid6_aligned(&mut b, new_vpid.unwrap());
                    b
                },
            },
            (true, false) => RedoDelta::Delete {
                offset: old_len - 8,
                len: 8,
            },
            (true, true) => RedoDelta::update_all(old_len - 8, 8, {
                let mut b = Vec::new();
                write_vpid6_aligned(&mut b, new_vpid.unwrap());
                b
            }),
            (false, false) => RedoDelta::None,
        }
    }

    pub fn set_first_object_fixed_size(&mut self) -> RedoDelta {
        let old = self.encode();
        self.objects[0] = self.objects[0].to_fixed_size();
        let new = self.encode();
        RedoDelta::update_all(0, old.len(), new)
    }

    fn object_byte_offset(&self, index: usize) -> usize {
        let mut out = Vec::new();
        self.objects[0].encode(&mut out, self.first_extra_flags());
        let mut off = align4(out.len() + self.key.len());
        if index == 0 {
            return 0;
        }
        for o in &self.objects[1..index] {
            let mut tmp = Vec::new();
            o.encode(&mut tmp, 0);
            off += tmp.len();
        }
        off
    }

    pub fn n_objects(&self) -> usize {
        self.objects.len()
    }
}

fn key_type_len_at(key_type: &KeyType, bytes: &[u8], skip_columns: usize) -> usize {
    let mut off = 0;
    for col in key_type.columns.iter().skip(skip_columns) {
        match col.fixed_width() {
            Some(w) => off += w,
            None => {
                let len = LittleEndian::read_u16(&bytes[off..off + 2]) as usize;
                off += 2 + len;
            }
        }
    }
    off
}

fn write_vpid6_aligned(out: &mut Vec<u8>, vpid: u64) {
    let full = vpid.to_le_bytes();
    out.extend_from_slice(&full[0..6]);
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn read_vpid6_aligned(bytes: &[u8]) -> u64 {
    let mut full = [0u8; 8];
    full[0..6].copy_from_slice(&bytes[0..6]);
    u64::from_le_bytes(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::MvccId;

    #[test]
    fn leaf_record_roundtrip_single_object() {
        let kt = KeyType::int32();
        let key = KeyType::encode_i32(42).0;
        let first = ObjectInfo::with_mvcc(Oid::new(1, 1, 1), MvccId(100), MvccId::NULL_MVCCID);
        let rec = LeafRecord::new(key.clone(), first);
        let bytes = rec.encode();
        let decoded = LeafRecord::decode(&bytes, bytes.len(), &kt, false, 0);
        assert_eq!(decoded.key, key);
        assert_eq!(decoded.objects.len(), 1);
        assert_eq!(decoded.objects[0].oid, Oid::new(1, 1, 1));
    }

    #[test]
    fn leaf_record_append_and_remove() {
        let kt = KeyType::int32();
        let key = KeyType::encode_i32(7).0;
        let first = ObjectInfo::new(Oid::new(1, 1, 1));
        let mut rec = LeafRecord::new(key.clone(), first);
        rec.append_object_at_end(ObjectInfo::new(Oid::new(1, 1, 2)));
        let bytes = rec.encode();
        let mut decoded = LeafRecord::decode(&bytes, bytes.len(), &kt, false, 0);
        assert_eq!(decoded.n_objects(), 2);
        decoded.remove_object_at(1).unwrap();
        assert_eq!(decoded.n_objects(), 1);
    }

    #[test]
    fn leaf_record_overflow_link_roundtrip() {
        let kt = KeyType::int32();
        let key = KeyType::encode_i32(9).0;
        let first =
            ObjectInfo::with_mvcc(Oid::new(1, 1, 1), MvccId(1), MvccId::NULL_MVCCID).to_fixed_size();
        let mut rec = LeafRecord::new(key, first);
        rec.set_overflow_link(Some(777));
        let bytes = rec.encode();
        let decoded = LeafRecord::decode(&bytes, bytes.len(), &kt, false, 0);
        assert_eq!(decoded.overflow_oids_link, Some(777));
    }
}
