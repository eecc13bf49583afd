//! On-disk page types (§3): a fixed common prefix (magic/version/kind/
//! page_id), a node header shared by leaf and non-leaf pages (§3.7),
//! and three page-kind codecs (leaf records, non-leaf records, the
//! overflow-OID chain), plus the fence-key prefix-compression helpers
//! (§3.9) and the checksum+LSN trailer (§3.7/§6.3).

pub mod checksum;
pub mod fence;
pub mod header;
pub mod leaf;
pub mod nonleaf;
pub mod object;
pub mod ovf;
pub mod prefix;
pub mod redo;
pub mod slotted;

pub use checksum::{page_lsn, set_page_lsn, update_checksum, verify_checksum};
pub use header::{NodeHeader, RootExtra, NODE_HDR_OFFSET, ROOT_EXTRA_OFFSET};
pub use leaf::LeafRecord;
pub use nonleaf::NonLeafRecord;
pub use object::ObjectInfo;
pub use ovf::{OvfHeader, OvfRecord};
pub use prefix::PagePrefix;
pub use redo::{PartialUpdate, RedoDelta};

use crate::consts::{
    COMMON_HDR_LEN, OFF_MAGIC, OFF_PAGE_ID, OFF_PAGE_TYPE, OFF_RESERVED, OFF_VERSION, PAGE_MAGIC,
    PAGE_TYPE_LEAF, PAGE_TYPE_NONLEAF, PAGE_TYPE_OVERFLOW, PAGE_VERSION,
};
use byteorder::{ByteOrder, LittleEndian};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Leaf,
    NonLeaf,
    Overflow,
}

impl PageKind {
    pub fn tag(self) -> u8 {
        match self {
            PageKind::Leaf => PAGE_TYPE_LEAF,
            PageKind::NonLeaf => PAGE_TYPE_NONLEAF,
            PageKind::Overflow => PAGE_TYPE_OVERFLOW,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            PAGE_TYPE_LEAF => Some(PageKind::Leaf),
            PAGE_TYPE_NONLEAF => Some(PageKind::NonLeaf),
            PAGE_TYPE_OVERFLOW => Some(PageKind::Overflow),
            _ => None,
        }
    }
}

/// Stamp the common page-kind prefix on a freshly allocated page
/// buffer; callers then write the kind-specific header after it.
pub fn init_common_header(page: &mut [u8], kind: PageKind, page_id: u64) {
    page[OFF_MAGIC..OFF_MAGIC + 4].copy_from_slice(PAGE_MAGIC);
    page[OFF_VERSION] = PAGE_VERSION;
    page[OFF_PAGE_TYPE] = kind.tag();
    LittleEndian::write_u16(&mut page[OFF_RESERVED..OFF_RESERVED + 2], 0);
    LittleEndian::write_u64(&mut page[OFF_PAGE_ID..OFF_PAGE_ID + 8], page_id);
}

pub fn page_id_of(page: &[u8]) -> u64 {
    LittleEndian::read_u64(&page[OFF_PAGE_ID..OFF_PAGE_ID + 8])
}

pub fn page_kind_of(page: &[u8]) -> Option<PageKind> {
    PageKind::from_tag(page[OFF_PAGE_TYPE])
}

pub fn is_valid_magic(page: &[u8]) -> bool {
    page.len() >= COMMON_HDR_LEN && &page[OFF_MAGIC..OFF_MAGIC + 4] == PAGE_MAGIC
}
