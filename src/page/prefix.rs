//! Common page-kind prefix (§3.7), present at the start of every page
//! regardless of leaf/non-leaf/overflow kind:
//! `[magic: 4][version: u8][page_type: u8][reserved: u16][page_id: u64]`.

use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{
    OFF_MAGIC, OFF_PAGE_ID, OFF_PAGE_TYPE, OFF_RESERVED, OFF_VERSION, PAGE_MAGIC, PAGE_VERSION,
};
use crate::error::BtreeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePrefix {
    pub page_type: u8,
    pub page_id: u64,
}

impl PagePrefix {
    pub fn init(buf: &mut [u8], page_type: u8, page_id: u64) {
        buf[OFF_MAGIC..OFF_MAGIC + 4].copy_from_slice(PAGE_MAGIC);
        buf[OFF_VERSION] = PAGE_VERSION;
        buf[OFF_PAGE_TYPE] = page_type;
        LittleEndian::write_u16(&mut buf[OFF_RESERVED..OFF_RESERVED + 2], 0);
        LittleEndian::write_u64(&mut buf[OFF_PAGE_ID..OFF_PAGE_ID + 8], page_id);
    }

    pub fn read(buf: &[u8]) -> Result<Self, BtreeError> {
        if &buf[OFF_MAGIC..OFF_MAGIC + 4] != PAGE_MAGIC {
            return Err(BtreeError::CorruptLayout("bad page magic".into()));
        }
        if buf[OFF_VERSION] != PAGE_VERSION {
            return Err(BtreeError::CorruptLayout(format!(
                "unsupported page version {}",
                buf[OFF_VERSION]
            )));
        }
        Ok(PagePrefix {
            page_type: buf[OFF_PAGE_TYPE],
            page_id: LittleEndian::read_u64(&buf[OFF_PAGE_ID..OFF_PAGE_ID + 8]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::PAGE_TYPE_LEAF;

    #[test]
    fn prefix_roundtrip() {
        let mut buf = vec![0u8; 64];
        PagePrefix::init(&mut buf, PAGE_TYPE_LEAF, 17);
        let p = PagePrefix::read(&buf).unwrap();
        assert_eq!(p.page_type, PAGE_TYPE_LEAF);
        assert_eq!(p.page_id, 17);
    }
}
