//! Non-leaf record layout and record codec (§3.4).
//!
//! `[child page id: 6 aligned to 4][key length: 2][packed key]`
//!
//! `key length == -1` (stored as `0xFFFF`) means the packed key area
//! holds an 8-byte overflow-key-file page id instead of key bytes. The
//! leftmost record in a non-leaf node carries a dummy "negative
//! infinity" key that anchors the leftmost child and is never compared.

use byteorder::{ByteOrder, LittleEndian};

use crate::page::redo::RedoDelta;

pub const OVERFLOW_KEY_LEN_MARKER: u16 = 0xFFFF;
const CHILD_PID_FIELD_LEN: usize = 8; // 6-byte vpid, padded to 4-byte alignment

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonLeafRecord {
    pub child_page_id: u64,
    /// `None` marks the leftmost "negative infinity" dummy separator.
    pub key: Option<Vec<u8>>,
    pub key_in_overflow_file: bool,
}

impl NonLeafRecord {
    pub fn dummy_leftmost(child_page_id: u64) -> Self {
        NonLeafRecord {
            child_page_id,
            key: None,
            key_in_overflow_file: false,
        }
    }

    pub fn new(child_page_id: u64, key: Vec<u8>) -> Self {
        NonLeafRecord {
            child_page_id,
            key: Some(key),
            key_in_overflow_file: false,
        }
    }

    pub fn new_overflow_key(child_page_id: u64, overflow_file_vpid: u64) -> Self {
        NonLeafRecord {
            child_page_id,
            key: Some(overflow_file_vpid.to_le_bytes().to_vec()),
            key_in_overflow_file: true,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        let full = self.child_page_id.to_le_bytes();
        out.extend_from_slice(&full[0..6]);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        debug_assert_eq!(out.len(), CHILD_PID_FIELD_LEN);

        match (&self.key, self.key_in_overflow_file) {
            (None, _) => {
                let mut len_buf = [0u8; 2];
                LittleEndian::write_u16(&mut len_buf, 0);
                out.extend_from_slice(&len_buf);
            }
            (Some(k), true) => {
                let mut len_buf = [0u8; 2];
                LittleEndian::write_u16(&mut len_buf, OVERFLOW_KEY_LEN_MARKER);
                out.extend_from_slice(&len_buf);
                out.extend_from_slice(k);
            }
            (Some(k), false) => {
                let mut len_buf = [0u8; 2];
                LittleEndian::write_u16(&mut len_buf, k.len() as u16);
                out.extend_from_slice(&len_buf);
                out.extend_from_slice(k);
            }
        }
        out
    }

    pub fn decode(buf: &[u8], is_leftmost: bool) -> Self {
        let mut full = [0u8; 8];
        full[0..6].copy_from_slice(&buf[0..6]);
        let child_page_id = u64::from_le_bytes(full);
        let len = LittleEndian::read_u16(&buf[CHILD_PID_FIELD_LEN..CHILD_PID_FIELD_LEN + 2]);
        let key_start = CHILD_PID_FIELD_LEN + 2;

        if is_leftmost && len == 0 {
            return NonLeafRecord::dummy_leftmost(child_page_id);
        }
        if len == OVERFLOW_KEY_LEN_MARKER {
            let vpid = u64::from_le_bytes(buf[key_start..key_start + 8].try_into().unwrap());
            NonLeafRecord::new_overflow_key(child_page_id, vpid)
        } else {
            let key = buf[key_start..key_start + len as usize].to_vec();
            NonLeafRecord::new(child_page_id, key)
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.encode().len()
    }

    /// Redo delta for replacing the child pointer only (used when a
    /// split/merge relinks a separator without changing its key).
    pub fn set_child_page_id(&mut self, new_child: u64) -> RedoDelta {
        self.child_page_id = new_child;
        RedoDelta::update_all(0, CHILD_PID_FIELD_LEN, {
            let mut b = Vec::new();
            let full = new_child.to_le_bytes();
            b.extend_from_slice(&full[0..6]);
            while b.len() % 4 != 0 {
                b.push(0);
            }
            b
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonleaf_record_roundtrip() {
        let rec = NonLeafRecord::new(12345, vec![1, 2, 3, 4]);
        let bytes = rec.encode();
        let decoded = NonLeafRecord::decode(&bytes, false);
        assert_eq!(decoded, rec);
    }

    #[test]
    fn nonleaf_dummy_leftmost_roundtrip() {
        let rec = NonLeafRecord::dummy_leftmost(99);
        let bytes = rec.encode();
        let decoded = NonLeafRecord::decode(&bytes, true);
        assert_eq!(decoded, rec);
    }

    #[test]
    fn nonleaf_overflow_key_roundtrip() {
        let rec = NonLeafRecord::new_overflow_key(55, 0xdeadbeef);
        let bytes = rec.encode();
        let decoded = NonLeafRecord::decode(&bytes, false);
        assert_eq!(decoded, rec);
    }
}
