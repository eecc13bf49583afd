//! Top-down descent framework (§4.3): walk non-leaf separators from
//! the root to the target leaf for a given key, handing back the
//! chain of ancestor non-leaf page ids so a split/merge can propagate
//! a new separator upward without a second root-to-leaf pass.
//!
//! This crate serializes every mutating step behind a single
//! `SystemOp`/WAL-writer mutex (§5), so the full shared/exclusive
//! latch-coupling protocol the specification describes collapses to
//! plain read-then-mutate: a reader never needs to promote a latch
//! mid-descent because no other mutator can be interleaved inside one
//! `BTreeIndex` call. `pager::latch`'s shared/exclusive/promote
//! machinery remains in place for true multi-threaded readers running
//! concurrently with index mutation and is exercised directly by
//! `pager`'s own unit tests.

use std::cmp::Ordering;

use anyhow::Result;

use crate::btree::node_io::{self, NonLeafNode};
use crate::btree::types::{BtreeContext, ROOT_PAGE_ID};
use crate::page::PageKind;

/// The leaf a key descends to, plus the path of non-leaf ancestors
/// visited on the way down (root first, immediate parent last).
pub struct Descent {
    pub leaf_page_id: u64,
    pub path: Vec<u64>,
}

pub fn descend_to_leaf(ctx: &BtreeContext, key: &[u8]) -> Result<Descent> {
    let mut path = Vec::new();
    let mut page_id = ROOT_PAGE_ID;
    loop {
        match node_io::page_kind(ctx, page_id)? {
            PageKind::Leaf => return Ok(Descent { leaf_page_id: page_id, path }),
            PageKind::NonLeaf => {
                let node = node_io::read_nonleaf(ctx, page_id)?;
                let next = choose_child(ctx, &node, key);
                path.push(page_id);
                page_id = next;
            }
            PageKind::Overflow => {
                return Err(crate::error::BtreeError::CorruptLayout(format!(
                    "traversal reached an overflow page {}",
                    page_id
                ))
                .into());
            }
        }
    }
}

/// Pick the rightmost child whose separator key is `<= key` (the
/// leftmost dummy separator, at slot 0, anchors everything smaller
/// than the first real separator).
fn choose_child(ctx: &BtreeContext, node: &NonLeafNode, key: &[u8]) -> u64 {
    let mut chosen = node.records[0].child_page_id;
    for rec in &node.records[1..] {
        let rkey = rec
            .key
            .as_ref()
            .expect("non-leftmost non-leaf record must carry a separator key");
        if ctx.key_type.compare(rkey.as_slice(), key) != Ordering::Greater {
            chosen = rec.child_page_id;
        } else {
            break;
        }
    }
    chosen
}
