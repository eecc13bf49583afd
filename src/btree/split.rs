//! Split & root-split (§4.4): a node that no longer fits a mutation is
//! partitioned at a pivot derived from its running split-pivot average
//! (clamped to [20%, 80%] so neither half starves), the right half
//! moves to a freshly allocated sibling page, and the separator key is
//! pushed up to the parent — recursing (and, at the top, growing the
//! tree by one level) if the parent itself overflows.

use anyhow::Result;

use crate::btree::node_io::{self, LeafNode, NonLeafNode};
use crate::btree::types::{BtreeContext, ROOT_PAGE_ID};
use crate::consts::NO_PAGE;
use crate::page::fence;
use crate::page::header::{NodeHeader, RootExtra};
use crate::page::leaf::LeafRecord;
use crate::page::nonleaf::NonLeafRecord;
use crate::pager::commit::SystemOp;

fn split_pivot_index(pivot: f32, n: usize) -> usize {
    let clamped = pivot.clamp(0.2, 0.8);
    let raw = (clamped * n as f32).round() as usize;
    raw.clamp(1, n.saturating_sub(1).max(1))
}

/// Partition a leaf's records at the pivot, skipping any existing fence
/// records (§3.5) from the pivot math, and install fresh fence records
/// at the new left/right boundary. Existing outer fences (if any) stay
/// with the half that already owned them.
fn partition_leaf(node: &LeafNode) -> (Vec<LeafRecord>, Vec<LeafRecord>, Vec<u8>) {
    let (start, end) = fence::non_fence_bounds(&node.records);
    let existing_lower = (start == 1).then(|| node.records[0].clone());
    let existing_upper = (end < node.records.len()).then(|| node.records[node.records.len() - 1].clone());
    let mid = &node.records[start..end];

    let n = mid.len();
    let pivot = split_pivot_index(node.header.split_pivot, n);
    let left_mid = mid[0..pivot].to_vec();
    let right_mid = mid[pivot..].to_vec();
    let sep_key = right_mid[0].key.clone();

    let mut left = Vec::with_capacity(left_mid.len() + 2);
    if let Some(lf) = existing_lower {
        left.push(lf);
    }
    left.extend(left_mid);
    left.push(LeafRecord::fence(sep_key.clone()));

    let mut right = Vec::with_capacity(right_mid.len() + 2);
    right.push(LeafRecord::fence(sep_key.clone()));
    right.extend(right_mid);
    if let Some(uf) = existing_upper {
        right.push(uf);
    }

    (left, right, sep_key)
}

fn partition_nonleaf(node: &NonLeafNode) -> (Vec<NonLeafRecord>, Vec<NonLeafRecord>, Vec<u8>) {
    let n_real = node.records.len() - 1;
    let pivot = split_pivot_index(node.header.split_pivot, n_real);
    let left = node.records[0..=pivot].to_vec();
    let mut right_src = node.records[pivot + 1..].to_vec();
    let sep_key = right_src[0]
        .key
        .clone()
        .expect("a non-leftmost separator always carries a key");
    let mut right = Vec::with_capacity(right_src.len());
    right.push(NonLeafRecord::dummy_leftmost(right_src[0].child_page_id));
    right.extend(right_src.drain(1..));
    (left, right, sep_key)
}

/// Entry point: `full` is a leaf that, after the mutation that
/// triggered this split, no longer fits on one page. `path` is the
/// chain of non-leaf ancestors returned by `traversal::descend_to_leaf`.
pub fn split_leaf(ctx: &BtreeContext, full: LeafNode, path: Vec<u64>) -> Result<()> {
    let (left_recs, right_recs, sep_key) = partition_leaf(&full);

    if node_io::is_root(full.page_id) {
        return grow_root_from_leaf(ctx, full.root_extra, left_recs, right_recs, sep_key);
    }

    let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
    let right_id = ctx.pager.allocate_one_page(&ctx.free)?;

    let mut left_header = full.header;
    let old_next = left_header.next_vpid;
    left_header.next_vpid = right_id;
    left_header.common_prefix_count = fence::leaf_common_prefix(&ctx.key_type, &left_recs) as u16;
    for r in &left_recs {
        left_header.bump_max_key_len(r.key.len() as u16);
    }

    let mut right_header = NodeHeader::new_leaf();
    right_header.prev_vpid = full.page_id;
    right_header.next_vpid = old_next;
    right_header.common_prefix_count = fence::leaf_common_prefix(&ctx.key_type, &right_recs) as u16;
    for r in &right_recs {
        right_header.bump_max_key_len(r.key.len() as u16);
    }

    if old_next != NO_PAGE {
        if let Ok(mut far) = node_io::read_leaf(ctx, old_next) {
            far.header.prev_vpid = right_id;
            far.write(ctx, &mut op)?;
        }
    }

    LeafNode {
        page_id: full.page_id,
        header: left_header,
        root_extra: full.root_extra,
        records: left_recs,
    }
    .write(ctx, &mut op)?;
    LeafNode {
        page_id: right_id,
        header: right_header,
        root_extra: None,
        records: right_recs,
    }
    .write(ctx, &mut op)?;
    op.commit()?;

    propagate_separator(ctx, path, right_id, sep_key)
}

fn propagate_separator(ctx: &BtreeContext, mut path: Vec<u64>, new_child: u64, sep_key: Vec<u8>) -> Result<()> {
    let parent_id = path.pop().expect("a non-root split always has a parent on the path");
    let mut parent = node_io::read_nonleaf(ctx, parent_id)?;

    let pos = parent
        .records
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, r)| {
            ctx.key_type.compare(r.key.as_ref().expect("separator key"), &sep_key) == std::cmp::Ordering::Greater
        })
        .map(|(i, _)| i)
        .unwrap_or(parent.records.len());
    parent.records.insert(pos, NonLeafRecord::new(new_child, sep_key.clone()));
    parent.header.bump_max_key_len(sep_key.len() as u16);

    if parent.fits(ctx.pager.page_size()) {
        let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
        parent.write(ctx, &mut op)?;
        op.commit()?;
        Ok(())
    } else {
        split_nonleaf(ctx, parent, path)
    }
}

fn split_nonleaf(ctx: &BtreeContext, full: NonLeafNode, path: Vec<u64>) -> Result<()> {
    let (left_recs, right_recs, sep_key) = partition_nonleaf(&full);

    if node_io::is_root(full.page_id) {
        return grow_root_from_nonleaf(ctx, full.header, full.root_extra, left_recs, right_recs, sep_key);
    }

    let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
    let right_id = ctx.pager.allocate_one_page(&ctx.free)?;

    let child_level = full.header.node_level;
    let mut right_header = NodeHeader::new_nonleaf(child_level - 1);
    for r in &right_recs {
        if let Some(k) = &r.key {
            right_header.bump_max_key_len(k.len() as u16);
        }
    }

    NonLeafNode {
        page_id: full.page_id,
        header: full.header,
        root_extra: full.root_extra,
        records: left_recs,
    }
    .write(ctx, &mut op)?;
    NonLeafNode {
        page_id: right_id,
        header: right_header,
        root_extra: None,
        records: right_recs,
    }
    .write(ctx, &mut op)?;
    op.commit()?;

    propagate_separator(ctx, path, right_id, sep_key)
}

fn grow_root_from_leaf(
    ctx: &BtreeContext,
    root_extra: Option<RootExtra>,
    left_recs: Vec<LeafRecord>,
    right_recs: Vec<LeafRecord>,
    sep_key: Vec<u8>,
) -> Result<()> {
    let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
    let left_id = ctx.pager.allocate_one_page(&ctx.free)?;
    let right_id = ctx.pager.allocate_one_page(&ctx.free)?;

    let mut left_header = NodeHeader::new_leaf();
    left_header.next_vpid = right_id;
    left_header.common_prefix_count = fence::leaf_common_prefix(&ctx.key_type, &left_recs) as u16;
    let mut right_header = NodeHeader::new_leaf();
    right_header.prev_vpid = left_id;
    right_header.common_prefix_count = fence::leaf_common_prefix(&ctx.key_type, &right_recs) as u16;
    for r in &left_recs {
        left_header.bump_max_key_len(r.key.len() as u16);
    }
    for r in &right_recs {
        right_header.bump_max_key_len(r.key.len() as u16);
    }

    LeafNode {
        page_id: left_id,
        header: left_header,
        root_extra: None,
        records: left_recs,
    }
    .write(ctx, &mut op)?;
    LeafNode {
        page_id: right_id,
        header: right_header,
        root_extra: None,
        records: right_recs,
    }
    .write(ctx, &mut op)?;

    let new_root_extra = root_extra.unwrap_or_else(|| RootExtra::new(0, ctx.is_unique, false));
    let mut root_node = NonLeafNode::new_empty(ROOT_PAGE_ID, 1, Some(new_root_extra));
    root_node.header.bump_max_key_len(sep_key.len() as u16);
    root_node.records.push(NonLeafRecord::dummy_leftmost(left_id));
    root_node.records.push(NonLeafRecord::new(right_id, sep_key));
    root_node.write(ctx, &mut op)?;
    op.commit()?;
    Ok(())
}

fn grow_root_from_nonleaf(
    ctx: &BtreeContext,
    old_header: NodeHeader,
    root_extra: Option<RootExtra>,
    left_recs: Vec<NonLeafRecord>,
    right_recs: Vec<NonLeafRecord>,
    sep_key: Vec<u8>,
) -> Result<()> {
    let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
    let left_id = ctx.pager.allocate_one_page(&ctx.free)?;
    let right_id = ctx.pager.allocate_one_page(&ctx.free)?;

    let mut left_header = NodeHeader::new_nonleaf(old_header.node_level - 1);
    let mut right_header = NodeHeader::new_nonleaf(old_header.node_level - 1);
    for r in &left_recs {
        if let Some(k) = &r.key {
            left_header.bump_max_key_len(k.len() as u16);
        }
    }
    for r in &right_recs {
        if let Some(k) = &r.key {
            right_header.bump_max_key_len(k.len() as u16);
        }
    }

    NonLeafNode {
        page_id: left_id,
        header: left_header,
        root_extra: None,
        records: left_recs,
    }
    .write(ctx, &mut op)?;
    NonLeafNode {
        page_id: right_id,
        header: right_header,
        root_extra: None,
        records: right_recs,
    }
    .write(ctx, &mut op)?;

    let new_root_extra = root_extra.unwrap_or_else(|| RootExtra::new(0, ctx.is_unique, false));
    let mut root_node = NonLeafNode::new_empty(ROOT_PAGE_ID, old_header.node_level, Some(new_root_extra));
    root_node.header.bump_max_key_len(sep_key.len() as u16);
    root_node.records.push(NonLeafRecord::dummy_leftmost(left_id));
    root_node.records.push(NonLeafRecord::new(right_id, sep_key));
    root_node.write(ctx, &mut op)?;
    op.commit()?;
    Ok(())
}
