//! Unique lookup and range scan (§4.8): `find_unique` resolves a single
//! key to its (possibly overflow-chained) object list; `range_scan`
//! walks the leaf level's doubly linked list in either direction,
//! expanding `OVERFLOW_OIDS` records as it goes. Both filter objects
//! through a `Snapshot` so callers never see rows their transaction
//! shouldn't.

use std::cmp::Ordering;

use anyhow::Result;

use crate::btree::node_io::{self, LeafNode};
use crate::btree::types::{BtreeContext, ROOT_PAGE_ID};
use crate::btree::{overflow, traversal};
use crate::consts::NO_PAGE;
use crate::mvcc::{MvccId, MvccStamp, Snapshot, Visibility};
use crate::oid::Oid;
use crate::page::object::ObjectInfo;
use crate::page::PageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

fn stamp_of(obj: &ObjectInfo) -> MvccStamp {
    MvccStamp {
        ins_id: obj.ins_id.unwrap_or(MvccId::ALL_VISIBLE),
        del_id: obj.del_id.unwrap_or(MvccId::NULL_MVCCID),
    }
}

fn is_visible(snapshot: &dyn Snapshot, obj: &ObjectInfo) -> bool {
    matches!(snapshot.satisfies(stamp_of(obj)), Visibility::CanDelete)
}

fn expand_record_objects(ctx: &BtreeContext, record: &crate::page::leaf::LeafRecord) -> Result<Vec<ObjectInfo>> {
    let mut out = record.objects.clone();
    if let Some(head) = record.overflow_oids_link {
        out.extend(overflow::collect_chain(ctx, head)?);
    }
    Ok(out)
}

/// Every visible object stored under `key` in a unique (or non-unique)
/// index, including ones spilled into the overflow-OID chain.
pub fn find_unique(ctx: &BtreeContext, key: &[u8], snapshot: &dyn Snapshot) -> Result<Vec<Oid>> {
    let descent = traversal::descend_to_leaf(ctx, key)?;
    let leaf = node_io::read_leaf(ctx, descent.leaf_page_id)?;
    let idx = leaf
        .records
        .iter()
        .position(|r| !r.is_fence && ctx.key_type.compare(&r.key, key) == Ordering::Equal);
    let Some(idx) = idx else {
        return Ok(Vec::new());
    };
    let objects = expand_record_objects(ctx, &leaf.records[idx])?;
    Ok(objects
        .into_iter()
        .filter(|o| is_visible(snapshot, o))
        .map(|o| o.oid)
        .collect())
}

fn leftmost_leaf(ctx: &BtreeContext) -> Result<u64> {
    let mut page_id = ROOT_PAGE_ID;
    loop {
        match node_io::page_kind(ctx, page_id)? {
            PageKind::Leaf => return Ok(page_id),
            PageKind::NonLeaf => {
                let node = node_io::read_nonleaf(ctx, page_id)?;
                page_id = node.records[0].child_page_id;
            }
            PageKind::Overflow => unreachable!("descent never reaches an overflow page"),
        }
    }
}

fn rightmost_leaf(ctx: &BtreeContext) -> Result<u64> {
    let mut page_id = ROOT_PAGE_ID;
    loop {
        match node_io::page_kind(ctx, page_id)? {
            PageKind::Leaf => return Ok(page_id),
            PageKind::NonLeaf => {
                let node = node_io::read_nonleaf(ctx, page_id)?;
                page_id = node.records.last().expect("non-leaf always has a leftmost child").child_page_id;
            }
            PageKind::Overflow => unreachable!("descent never reaches an overflow page"),
        }
    }
}

fn within_bounds(ctx: &BtreeContext, key: &[u8], start: Option<&[u8]>, end: Option<&[u8]>) -> (bool, bool) {
    let after_start = start.map(|s| ctx.key_type.compare(key, s) != Ordering::Less).unwrap_or(true);
    let before_end = end.map(|e| ctx.key_type.compare(key, e) != Ordering::Greater).unwrap_or(true);
    (after_start, before_end)
}

/// Scan `[start, end]` (either bound `None` for open-ended) in the
/// given direction, returning every visible `(key, oid)` pair in leaf
/// order.
pub fn range_scan(
    ctx: &BtreeContext,
    start: Option<&[u8]>,
    end: Option<&[u8]>,
    direction: Direction,
    snapshot: &dyn Snapshot,
) -> Result<Vec<(Vec<u8>, Oid)>> {
    let mut out = Vec::new();
    let mut page_id = match direction {
        Direction::Forward => match start {
            Some(k) => traversal::descend_to_leaf(ctx, k)?.leaf_page_id,
            None => leftmost_leaf(ctx)?,
        },
        Direction::Backward => match end {
            Some(k) => traversal::descend_to_leaf(ctx, k)?.leaf_page_id,
            None => rightmost_leaf(ctx)?,
        },
    };

    'pages: loop {
        let leaf: LeafNode = node_io::read_leaf(ctx, page_id)?;
        let mut records: Vec<&crate::page::leaf::LeafRecord> = leaf.records.iter().filter(|r| !r.is_fence).collect();
        if direction == Direction::Backward {
            records.reverse();
        }

        for record in records {
            let (after_start, before_end) = within_bounds(ctx, &record.key, start, end);
            match direction {
                Direction::Forward => {
                    if !before_end {
                        break 'pages;
                    }
                    if !after_start {
                        continue;
                    }
                }
                Direction::Backward => {
                    if !after_start {
                        break 'pages;
                    }
                    if !before_end {
                        continue;
                    }
                }
            }
            for obj in expand_record_objects(ctx, record)? {
                if is_visible(snapshot, &obj) {
                    out.push((record.key.clone(), obj.oid));
                }
            }
        }

        page_id = match direction {
            Direction::Forward => leaf.header.next_vpid,
            Direction::Backward => leaf.header.prev_vpid,
        };
        if page_id == NO_PAGE {
            break;
        }
    }

    Ok(out)
}
