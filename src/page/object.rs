//! Object encoding within a leaf or overflow record (§3.2).
//!
//! `[OID: 8] [class-OID: 8]? [insert-MVCCID: 8]? [delete-MVCCID: 8]?`
//!
//! The OID's overlay bits (see `oid::record_flags`/`oid::mvcc_flags`)
//! decide which of the optional fields are present. "Fixed size"
//! encoding forces both MVCCID fields present, which is mandatory for
//! every object in an overflow page and for select leaf-record objects
//! per §3.2.

use byteorder::{ByteOrder, LittleEndian};

use crate::mvcc::MvccId;
use crate::oid::{mvcc_flags, record_flags, Oid, OID_ENCODED_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    pub oid: Oid,
    pub class_oid: Option<Oid>,
    pub ins_id: Option<MvccId>,
    pub del_id: Option<MvccId>,
}

impl ObjectInfo {
    pub fn new(oid: Oid) -> Self {
        ObjectInfo {
            oid,
            class_oid: None,
            ins_id: None,
            del_id: None,
        }
    }

    pub fn with_mvcc(oid: Oid, ins_id: MvccId, del_id: MvccId) -> Self {
        ObjectInfo {
            oid,
            class_oid: None,
            ins_id: Some(ins_id),
            del_id: Some(del_id),
        }
    }

    pub fn record_flags(&self) -> u16 {
        let mut f = 0u16;
        if self.class_oid.is_some() {
            f |= record_flags::CLASS_OID;
        }
        f
    }

    pub fn mvcc_flags(&self) -> u16 {
        let mut f = 0u16;
        if self.ins_id.is_some() {
            f |= mvcc_flags::HAS_MVCC_INSID;
        }
        if self.del_id.is_some() {
            f |= mvcc_flags::HAS_MVCC_DELID;
        }
        f
    }

    /// Force both MVCC slots present, substituting the sentinels per
    /// §3.2's "fixed-size encoding" rule.
    pub fn to_fixed_size(&self) -> Self {
        ObjectInfo {
            oid: self.oid,
            class_oid: self.class_oid,
            ins_id: Some(self.ins_id.unwrap_or(MvccId::ALL_VISIBLE)),
            del_id: Some(self.del_id.unwrap_or(MvccId::NULL_MVCCID)),
        }
    }

    pub fn is_fixed_size(&self) -> bool {
        self.ins_id.is_some() && self.del_id.is_some()
    }

    /// Encoded length of this object, additional record flag bits
    /// (e.g. FENCE, OVERFLOW_OIDS) are ORed in by the record layer.
    pub fn encoded_len(&self) -> usize {
        OID_ENCODED_LEN
            + if self.class_oid.is_some() { 8 } else { 0 }
            + if self.ins_id.is_some() { 8 } else { 0 }
            + if self.del_id.is_some() { 8 } else { 0 }
    }

    /// Encode at `out[0..]`, with `extra_record_flags` ORed into the
    /// OID's slot-id overlay (used for FENCE/OVERFLOW_OIDS/OVERFLOW_KEY
    /// on the first object of a record). Returns bytes written.
    pub fn encode(&self, out: &mut Vec<u8>, extra_record_flags: u16) -> usize {
        let start = out.len();
        let rflags = self.record_flags() | extra_record_flags;
        let mflags = self.mvcc_flags();
        out.extend_from_slice(&self.oid.encode(rflags, mflags));
        if let Some(c) = self.class_oid {
            out.extend_from_slice(&c.encode(0, 0));
        }
        if let Some(i) = self.ins_id {
            let mut b = [0u8; 8];
            LittleEndian::write_u64(&mut b, i.0);
            out.extend_from_slice(&b);
        }
        if let Some(d) = self.del_id {
            let mut b = [0u8; 8];
            LittleEndian::write_u64(&mut b, d.0);
            out.extend_from_slice(&b);
        }
        out.len() - start
    }

    /// Decode one object starting at `buf[0..]`. `has_class_oid` tells
    /// the decoder whether a class-OID column is present per §3.2's
    /// rule (unique index AND (not first-object OR CLASS_OID flag
    /// set)) — the caller resolves that rule since it depends on record
    /// position, not just the flag bits.
    pub fn decode(buf: &[u8], has_class_oid: bool) -> (Self, u16, usize) {
        let (oid, rflags, mflags) = Oid::decode(&buf[0..OID_ENCODED_LEN]);
        let mut off = OID_ENCODED_LEN;
        let class_oid = if has_class_oid {
            let (c, _, _) = Oid::decode(&buf[off..off + OID_ENCODED_LEN]);
            off += OID_ENCODED_LEN;
            Some(c)
        } else {
            None
        };
        let ins_id = if mflags & mvcc_flags::HAS_MVCC_INSID != 0 {
            let v = LittleEndian::read_u64(&buf[off..off + 8]);
            off += 8;
            Some(MvccId(v))
        } else {
            None
        };
        let del_id = if mflags & mvcc_flags::HAS_MVCC_DELID != 0 {
            let v = LittleEndian::read_u64(&buf[off..off + 8]);
            off += 8;
            Some(MvccId(v))
        } else {
            None
        };
        (
            ObjectInfo {
                oid,
                class_oid,
                ins_id,
                del_id,
            },
            rflags,
            off,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_roundtrip_minimal() {
        let obj = ObjectInfo::new(Oid::new(1, 2, 3));
        let mut buf = Vec::new();
        obj.encode(&mut buf, record_flags::FENCE);
        let (dec, rflags, len) = ObjectInfo::decode(&buf, false);
        assert_eq!(dec, obj);
        assert_eq!(rflags, record_flags::FENCE);
        assert_eq!(len, buf.len());
    }

    #[test]
    fn object_roundtrip_fixed_size_with_class_oid() {
        let mut obj = ObjectInfo::new(Oid::new(4, 5, 6));
        obj.class_oid = Some(Oid::new(9, 9, 9));
        let obj = obj.to_fixed_size();
        let mut buf = Vec::new();
        obj.encode(&mut buf, record_flags::CLASS_OID);
        let (dec, rflags, _len) = ObjectInfo::decode(&buf, true);
        assert_eq!(dec, obj);
        assert_eq!(rflags, record_flags::CLASS_OID);
        assert!(dec.is_fixed_size());
    }
}
