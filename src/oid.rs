//! Object identifier (§3.1): triple (volume-id, page-id, slot-id) packed
//! into 8 bytes, with the top bits of volume-id/slot-id overloaded as
//! record/MVCC flags. Clearing the flag bits yields the canonical OID.
//!
//! Byte layout (little-endian, matching the rest of the on-disk
//! subsystem): [volume_id: i16][page_id: i32][slot_id: i16].

use byteorder::{ByteOrder, LittleEndian};

/// Record flags, only meaningful on the first object of a leaf record.
/// Packed into the top 4 bits of the slot-id field.
pub mod record_flags {
    pub const FENCE: u16 = 0x1;
    pub const OVERFLOW_OIDS: u16 = 0x2;
    pub const OVERFLOW_KEY: u16 = 0x4;
    pub const CLASS_OID: u16 = 0x8;
    pub const MASK: u16 = 0xF;
    pub const SHIFT: u32 = 12;
}

/// MVCC flags, present on every object. Packed into the top 2 bits of
/// the volume-id field.
pub mod mvcc_flags {
    pub const HAS_MVCC_INSID: u16 = 0x1;
    pub const HAS_MVCC_DELID: u16 = 0x2;
    pub const MASK: u16 = 0x3;
    pub const SHIFT: u32 = 14;
}

pub const OID_ENCODED_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid {
    pub volume_id: i16,
    pub page_id: i32,
    pub slot_id: i16,
}

impl Oid {
    pub fn new(volume_id: i16, page_id: i32, slot_id: i16) -> Self {
        Self {
            volume_id,
            page_id,
            slot_id,
        }
    }

    /// Encode the canonical OID plus overlay flags into 8 bytes.
    pub fn encode(&self, record_flags: u16, mvcc_flags: u16) -> [u8; OID_ENCODED_LEN] {
        let mut buf = [0u8; OID_ENCODED_LEN];
        let vol_raw = (self.volume_id as u16 & !(self::mvcc_flags::MASK << self::mvcc_flags::SHIFT))
            | ((mvcc_flags & self::mvcc_flags::MASK) << self::mvcc_flags::SHIFT);
        let slot_raw = (self.slot_id as u16 & !(self::record_flags::MASK << self::record_flags::SHIFT))
            | ((record_flags & self::record_flags::MASK) << self::record_flags::SHIFT);
        LittleEndian::write_i16(&mut buf[0..2], vol_raw as i16);
        LittleEndian::write_i32(&mut buf[2..6], self.page_id);
        LittleEndian::write_i16(&mut buf[6..8], slot_raw as i16);
        buf
    }

    /// Decode canonical OID and overlay flags from 8 bytes.
    pub fn decode(buf: &[u8]) -> (Self, u16, u16) {
        debug_assert!(buf.len() >= OID_ENCODED_LEN);
        let vol_raw = LittleEndian::read_i16(&buf[0..2]) as u16;
        let page_id = LittleEndian::read_i32(&buf[2..6]);
        let slot_raw = LittleEndian::read_i16(&buf[6..8]) as u16;

        let mvcc = (vol_raw >> self::mvcc_flags::SHIFT) & self::mvcc_flags::MASK;
        let rflags = (slot_raw >> self::record_flags::SHIFT) & self::record_flags::MASK;

        let volume_id = (vol_raw & !(self::mvcc_flags::MASK << self::mvcc_flags::SHIFT)) as i16;
        let slot_id = (slot_raw & !(self::record_flags::MASK << self::record_flags::SHIFT)) as i16;

        (
            Oid {
                volume_id,
                page_id,
                slot_id,
            },
            rflags,
            mvcc,
        )
    }

    pub const NULL: Oid = Oid {
        volume_id: 0,
        page_id: 0,
        slot_id: 0,
    };

    pub fn is_null(&self) -> bool {
        self.volume_id == 0 && self.page_id == 0 && self.slot_id == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassOid(pub Oid);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_flag_roundtrip() {
        let o = Oid::new(3, 12345, 7);
        let enc = o.encode(
            record_flags::FENCE | record_flags::CLASS_OID,
            mvcc_flags::HAS_MVCC_INSID,
        );
        let (dec, rflags, mvcc) = Oid::decode(&enc);
        assert_eq!(dec, o);
        assert_eq!(rflags, record_flags::FENCE | record_flags::CLASS_OID);
        assert_eq!(mvcc, mvcc_flags::HAS_MVCC_INSID);
    }

    #[test]
    fn oid_no_flags_roundtrip() {
        // volume_id/slot_id must leave the overlaid flag bits clear for a
        // faithful roundtrip; page_id is untouched by the overlay so it
        // can be anything, including negative.
        let o = Oid::new(100, -2, 200);
        let enc = o.encode(0, 0);
        let (dec, rflags, mvcc) = Oid::decode(&enc);
        assert_eq!(dec, o);
        assert_eq!(rflags, 0);
        assert_eq!(mvcc, 0);
    }
}
