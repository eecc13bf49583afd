//! Bridges the pager's raw page bytes to the leaf/non-leaf/overflow
//! record codecs (§3.3, §3.4, §3.8) through the slotted-page body
//! layer (`page::slotted`).
//!
//! Every write goes through `SystemOp::apply_new_page`: the whole page
//! image is rebuilt in memory and logged as one whole-page replace.
//! That is idempotent on replay regardless of the page's prior
//! contents, so it works equally for a brand-new page and for an
//! in-place rewrite — see DESIGN.md for why this crate does not track
//! byte-exact record deltas at the page level.

use anyhow::Result;

use crate::btree::types::{BtreeContext, ROOT_PAGE_ID};
use crate::error::BtreeError;
use crate::page::fence;
use crate::page::header::{NodeHeader, RootExtra};
use crate::page::leaf::LeafRecord;
use crate::page::nonleaf::NonLeafRecord;
use crate::page::ovf::{OvfHeader, OvfRecord, OVF_RECORD_OFFSET};
use crate::page::prefix::PagePrefix;
use crate::page::{init_common_header, page_kind_of, slotted, PageKind};
use crate::pager::commit::SystemOp;

pub fn is_root(page_id: u64) -> bool {
    page_id == ROOT_PAGE_ID
}

pub struct LeafNode {
    pub page_id: u64,
    pub header: NodeHeader,
    pub root_extra: Option<RootExtra>,
    pub records: Vec<LeafRecord>,
}

pub struct NonLeafNode {
    pub page_id: u64,
    pub header: NodeHeader,
    pub root_extra: Option<RootExtra>,
    pub records: Vec<NonLeafRecord>,
}

pub fn page_kind(ctx: &BtreeContext, page_id: u64) -> Result<PageKind> {
    let page = ctx.pager.read_page(page_id)?;
    page_kind_of(&page)
        .ok_or_else(|| BtreeError::CorruptLayout(format!("page {} has unknown kind", page_id)).into())
}

pub fn read_leaf(ctx: &BtreeContext, page_id: u64) -> Result<LeafNode> {
    let page = ctx.pager.read_page(page_id)?;
    let prefix = PagePrefix::read(&page)?;
    if prefix.page_type != PageKind::Leaf.tag() {
        return Err(BtreeError::CorruptLayout(format!("page {} is not a leaf", page_id)).into());
    }
    let header = NodeHeader::read(&page);
    let root = is_root(page_id);
    let root_extra = root.then(|| RootExtra::read(&page));
    let n_stripped = header.common_prefix_count as usize;
    let mut records: Vec<LeafRecord> = slotted::all_record_bytes(&page, root)
        .iter()
        .map(|bytes| LeafRecord::decode(bytes, bytes.len(), &ctx.key_type, ctx.is_unique, n_stripped))
        .collect();
    if n_stripped > 0 {
        let lower_fence = records.first().filter(|r| r.is_fence).map(|r| r.key.clone());
        if let Some(lower) = lower_fence {
            for r in records.iter_mut() {
                if !r.is_fence && !r.overflow_key {
                    r.key = fence::reconstruct_key(&ctx.key_type, &lower, &r.key, n_stripped);
                }
            }
        }
    }
    Ok(LeafNode {
        page_id,
        header,
        root_extra,
        records,
    })
}

pub fn read_nonleaf(ctx: &BtreeContext, page_id: u64) -> Result<NonLeafNode> {
    let page = ctx.pager.read_page(page_id)?;
    let prefix = PagePrefix::read(&page)?;
    if prefix.page_type != PageKind::NonLeaf.tag() {
        return Err(BtreeError::CorruptLayout(format!("page {} is not a non-leaf", page_id)).into());
    }
    let header = NodeHeader::read(&page);
    let root = is_root(page_id);
    let root_extra = root.then(|| RootExtra::read(&page));
    let raws = slotted::all_record_bytes(&page, root);
    let records = raws
        .iter()
        .enumerate()
        .map(|(i, bytes)| NonLeafRecord::decode(bytes, i == 0))
        .collect();
    Ok(NonLeafNode {
        page_id,
        header,
        root_extra,
        records,
    })
}

impl LeafNode {
    pub fn new_empty(page_id: u64, root_extra: Option<RootExtra>) -> Self {
        LeafNode {
            page_id,
            header: NodeHeader::new_leaf(),
            root_extra,
            records: Vec::new(),
        }
    }

    pub fn total_record_bytes(&self) -> usize {
        self.records.iter().map(|r| r.encode().len()).sum()
    }

    pub fn fits(&self, page_size: usize) -> bool {
        slotted::fits(page_size, is_root(self.page_id), self.records.len(), self.total_record_bytes())
    }

    pub fn write(&self, ctx: &BtreeContext, op: &mut SystemOp) -> Result<()> {
        let page_size = ctx.pager.page_size();
        let root = is_root(self.page_id);
        let n_stripped = self.header.common_prefix_count as usize;
        let records: Vec<Vec<u8>> = self
            .records
            .iter()
            .map(|r| r.encode_with_prefix(&ctx.key_type, n_stripped))
            .collect();
        let mut page = slotted::rebuild(
            page_size,
            PageKind::Leaf,
            self.page_id,
            root,
            &self.header,
            self.root_extra.as_ref(),
            &records,
        );
        op.apply_new_page(self.page_id, &mut page)
    }
}

impl NonLeafNode {
    pub fn new_empty(page_id: u64, child_level: u16, root_extra: Option<RootExtra>) -> Self {
        NonLeafNode {
            page_id,
            header: NodeHeader::new_nonleaf(child_level),
            root_extra,
            records: Vec::new(),
        }
    }

    pub fn total_record_bytes(&self) -> usize {
        self.records.iter().map(|r| r.encoded_len()).sum()
    }

    pub fn fits(&self, page_size: usize) -> bool {
        slotted::fits(page_size, is_root(self.page_id), self.records.len(), self.total_record_bytes())
    }

    pub fn write(&self, ctx: &BtreeContext, op: &mut SystemOp) -> Result<()> {
        let page_size = ctx.pager.page_size();
        let root = is_root(self.page_id);
        let records: Vec<Vec<u8>> = self.records.iter().map(|r| r.encode()).collect();
        let mut page = slotted::rebuild(
            page_size,
            PageKind::NonLeaf,
            self.page_id,
            root,
            &self.header,
            self.root_extra.as_ref(),
            &records,
        );
        op.apply_new_page(self.page_id, &mut page)
    }
}

/// Overflow pages (§3.8) hold one dense record with no slot directory;
/// a tree-layer-only `u32` length prefix (right after the fixed
/// header) marks where the packed object array ends, since
/// `OvfRecord::decode` otherwise has no way to distinguish real objects
/// from the page's trailing zero padding.
pub fn read_overflow(ctx: &BtreeContext, page_id: u64) -> Result<(OvfHeader, OvfRecord)> {
    let page = ctx.pager.read_page(page_id)?;
    let prefix = PagePrefix::read(&page)?;
    if prefix.page_type != PageKind::Overflow.tag() {
        return Err(BtreeError::CorruptLayout(format!("page {} is not overflow", page_id)).into());
    }
    let header = OvfHeader::read(&page);
    let len = u32::from_le_bytes(page[OVF_RECORD_OFFSET..OVF_RECORD_OFFSET + 4].try_into().unwrap()) as usize;
    let start = OVF_RECORD_OFFSET + 4;
    let record = OvfRecord::decode(&page[start..start + len]);
    Ok((header, record))
}

pub fn write_overflow(ctx: &BtreeContext, op: &mut SystemOp, page_id: u64, header: &OvfHeader, record: &OvfRecord) -> Result<()> {
    let page_size = ctx.pager.page_size();
    let mut page = vec![0u8; page_size];
    init_common_header(&mut page, PageKind::Overflow, page_id);
    header.write(&mut page);
    let bytes = record.encode();
    let start = OVF_RECORD_OFFSET + 4;
    page[OVF_RECORD_OFFSET..start].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
    page[start..start + bytes.len()].copy_from_slice(&bytes);
    op.apply_new_page(page_id, &mut page)
}

pub fn usable_body_size(ctx: &BtreeContext, page_id: u64) -> usize {
    slotted::usable_body_size(ctx.pager.page_size(), is_root(page_id))
}
