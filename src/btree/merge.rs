//! Merge (§4.5): a leaf or non-leaf node whose load factor drops below
//! `merge_force_threshold` is combined with an adjacent sibling when
//! the result still fits one page without wasting more than
//! `maxmerge_align_waste` page-widths of alignment padding. Losing a
//! child collapses the parent's separator for the freed sibling, which
//! can itself drop below threshold and cascade — up to, at the root,
//! shrinking the tree by one level.

use anyhow::Result;

use crate::btree::node_io::{self, LeafNode, NonLeafNode};
use crate::btree::types::{BtreeContext, ROOT_PAGE_ID};
use crate::consts::NO_PAGE;
use crate::page::fence;
use crate::page::header::RootExtra;
use crate::page::slotted;
use crate::page::PageKind;
use crate::pager::commit::SystemOp;

fn leaf_load_factor(ctx: &BtreeContext, node: &LeafNode) -> f32 {
    let usable = slotted::usable_body_size(ctx.pager.page_size(), node_io::is_root(node.page_id));
    if usable == 0 {
        return 1.0;
    }
    node.total_record_bytes() as f32 / usable as f32
}

fn nonleaf_load_factor(ctx: &BtreeContext, node: &NonLeafNode) -> f32 {
    let usable = slotted::usable_body_size(ctx.pager.page_size(), node_io::is_root(node.page_id));
    if usable == 0 {
        return 1.0;
    }
    node.total_record_bytes() as f32 / usable as f32
}

fn combined_fits(ctx: &BtreeContext, is_root: bool, n: usize, bytes: usize) -> bool {
    let page_size = ctx.pager.page_size();
    let usable = slotted::usable_body_size(page_size, is_root) as f32;
    if bytes as f32 > usable * ctx.cfg.maxmerge_align_waste {
        return false;
    }
    slotted::fits(page_size, is_root, n, bytes)
}

/// Entry point after a delete leaves `leaf` underfull. `path` is the
/// ancestor chain from `traversal::descend_to_leaf`.
pub fn maybe_merge_leaf(ctx: &BtreeContext, leaf: LeafNode, path: Vec<u64>) -> Result<()> {
    if node_io::is_root(leaf.page_id) {
        return Ok(());
    }
    if leaf_load_factor(ctx, &leaf) >= ctx.cfg.merge_force_threshold {
        return Ok(());
    }
    let mut path = path;
    let parent_id = match path.pop() {
        Some(id) => id,
        None => return Ok(()),
    };
    let parent = node_io::read_nonleaf(ctx, parent_id)?;
    let idx = match parent.records.iter().position(|r| r.child_page_id == leaf.page_id) {
        Some(i) => i,
        None => return Ok(()),
    };

    if idx > 0 {
        let left_id = parent.records[idx - 1].child_page_id;
        if let Ok(left) = node_io::read_leaf(ctx, left_id) {
            let n = left.records.len() + leaf.records.len();
            let bytes = left.total_record_bytes() + leaf.total_record_bytes();
            if combined_fits(ctx, node_io::is_root(left.page_id), n, bytes) {
                return merge_leaf_pair(ctx, left, leaf, parent, idx, path);
            }
        }
    }
    if idx + 1 < parent.records.len() {
        let right_id = parent.records[idx + 1].child_page_id;
        if let Ok(right) = node_io::read_leaf(ctx, right_id) {
            let n = leaf.records.len() + right.records.len();
            let bytes = leaf.total_record_bytes() + right.total_record_bytes();
            if combined_fits(ctx, node_io::is_root(leaf.page_id), n, bytes) {
                return merge_leaf_pair(ctx, leaf, right, parent, idx + 1, path);
            }
        }
    }
    Ok(())
}

fn merge_leaf_pair(
    ctx: &BtreeContext,
    left: LeafNode,
    right: LeafNode,
    mut parent: NonLeafNode,
    right_idx: usize,
    path: Vec<u64>,
) -> Result<()> {
    let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;

    let right_id = right.page_id;
    let mut merged_header = left.header;
    merged_header.next_vpid = right.header.next_vpid;

    // The junction between `left` and `right` is an internal boundary
    // that no longer exists once merged: left's upper fence and right's
    // lower fence coincided at the old separator, so both are dropped
    // rather than carried into the merged leaf (§3.5/§4.5). Only the
    // outer fences (left's own lower fence, right's own upper fence, if
    // either sibling had one) survive.
    let (left_start, left_end) = fence::non_fence_bounds(&left.records);
    let (right_start, right_end) = fence::non_fence_bounds(&right.records);
    let mut merged_records: Vec<_> = Vec::with_capacity(left.records.len() + right.records.len());
    if left_start == 1 {
        merged_records.push(left.records[0].clone());
    }
    merged_records.extend_from_slice(&left.records[left_start..left_end]);
    merged_records.extend_from_slice(&right.records[right_start..right_end]);
    if right_end < right.records.len() {
        merged_records.push(right.records[right.records.len() - 1].clone());
    }

    merged_header.common_prefix_count = fence::leaf_common_prefix(&ctx.key_type, &merged_records) as u16;
    for r in &merged_records {
        merged_header.bump_max_key_len(r.key.len() as u16);
    }

    if merged_header.next_vpid != NO_PAGE {
        if let Ok(mut far) = node_io::read_leaf(ctx, merged_header.next_vpid) {
            far.header.prev_vpid = left.page_id;
            far.write(ctx, &mut op)?;
        }
    }

    let merged = LeafNode {
        page_id: left.page_id,
        header: merged_header,
        root_extra: left.root_extra,
        records: merged_records,
    };
    merged.write(ctx, &mut op)?;

    parent.records.remove(right_idx);
    parent.write(ctx, &mut op)?;
    op.commit()?;

    ctx.pager.free_page(&ctx.free, right_id)?;

    finish_parent(ctx, parent, path)
}

/// Entry point after a non-leaf node drops a child and becomes
/// underfull itself, or (at the root) holds a single child.
pub fn maybe_merge_nonleaf(ctx: &BtreeContext, node: NonLeafNode, path: Vec<u64>) -> Result<()> {
    if node_io::is_root(node.page_id) {
        if node.records.len() == 1 {
            return collapse_root(ctx, node);
        }
        return Ok(());
    }
    if nonleaf_load_factor(ctx, &node) >= ctx.cfg.merge_force_threshold {
        return Ok(());
    }
    let mut path = path;
    let parent_id = match path.pop() {
        Some(id) => id,
        None => return Ok(()),
    };
    let parent = node_io::read_nonleaf(ctx, parent_id)?;
    let idx = match parent.records.iter().position(|r| r.child_page_id == node.page_id) {
        Some(i) => i,
        None => return Ok(()),
    };

    if idx > 0 {
        let left_id = parent.records[idx - 1].child_page_id;
        if let Ok(left) = node_io::read_nonleaf(ctx, left_id) {
            let n = left.records.len() + node.records.len();
            let bytes = left.total_record_bytes() + node.total_record_bytes();
            if combined_fits(ctx, node_io::is_root(left.page_id), n, bytes) {
                return merge_nonleaf_pair(ctx, left, node, parent, idx, path);
            }
        }
    }
    if idx + 1 < parent.records.len() {
        let right_id = parent.records[idx + 1].child_page_id;
        if let Ok(right) = node_io::read_nonleaf(ctx, right_id) {
            let n = node.records.len() + right.records.len();
            let bytes = node.total_record_bytes() + right.total_record_bytes();
            if combined_fits(ctx, node_io::is_root(node.page_id), n, bytes) {
                return merge_nonleaf_pair(ctx, node, right, parent, idx + 1, path);
            }
        }
    }
    Ok(())
}

fn merge_nonleaf_pair(
    ctx: &BtreeContext,
    left: NonLeafNode,
    right: NonLeafNode,
    mut parent: NonLeafNode,
    right_idx: usize,
    path: Vec<u64>,
) -> Result<()> {
    let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;

    let right_id = right.page_id;
    // the separator that anchored `right` in the parent becomes the
    // real key for what was right's dummy leftmost child.
    let sep_key = parent.records[right_idx]
        .key
        .clone()
        .expect("right sibling's separator always carries a key");
    let mut merged_header = left.header;
    merged_header.bump_max_key_len(sep_key.len() as u16);
    for r in &right.records {
        if let Some(k) = &r.key {
            merged_header.bump_max_key_len(k.len() as u16);
        }
    }

    let mut merged_records = left.records;
    let mut right_records = right.records;
    let reanchored = crate::page::nonleaf::NonLeafRecord::new(right_records[0].child_page_id, sep_key);
    merged_records.push(reanchored);
    merged_records.extend(right_records.drain(1..));

    let merged = NonLeafNode {
        page_id: left.page_id,
        header: merged_header,
        root_extra: left.root_extra,
        records: merged_records,
    };
    merged.write(ctx, &mut op)?;

    parent.records.remove(right_idx);
    parent.write(ctx, &mut op)?;
    op.commit()?;

    ctx.pager.free_page(&ctx.free, right_id)?;

    finish_parent(ctx, parent, path)
}

fn finish_parent(ctx: &BtreeContext, parent: NonLeafNode, path: Vec<u64>) -> Result<()> {
    if node_io::is_root(parent.page_id) {
        if parent.records.len() == 1 {
            collapse_root(ctx, parent)
        } else {
            Ok(())
        }
    } else {
        maybe_merge_nonleaf(ctx, parent, path)
    }
}

/// Root has a single surviving child: shrink the tree by copying that
/// child's content into page 0 and freeing the child page.
fn collapse_root(ctx: &BtreeContext, root: NonLeafNode) -> Result<()> {
    let child_id = root.records[0].child_page_id;
    let root_extra = root.root_extra.unwrap_or_else(|| RootExtra::new(0, ctx.is_unique, false));

    match node_io::page_kind(ctx, child_id)? {
        PageKind::Leaf => {
            let child = node_io::read_leaf(ctx, child_id)?;
            let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
            let new_root = LeafNode {
                page_id: ROOT_PAGE_ID,
                header: child.header,
                root_extra: Some(root_extra),
                records: child.records,
            };
            new_root.write(ctx, &mut op)?;
            op.commit()?;
            ctx.pager.free_page(&ctx.free, child_id)
        }
        PageKind::NonLeaf => {
            let child = node_io::read_nonleaf(ctx, child_id)?;
            let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
            let new_root = NonLeafNode {
                page_id: ROOT_PAGE_ID,
                header: child.header,
                root_extra: Some(root_extra),
                records: child.records,
            };
            new_root.write(ctx, &mut op)?;
            op.commit()?;
            ctx.pager.free_page(&ctx.free, child_id)
        }
        PageKind::Overflow => unreachable!("a non-leaf child is never an overflow page"),
    }
}
