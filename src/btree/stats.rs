//! Unique-index bookkeeping counters (§3.7's root-only `num_nulls`,
//! `num_oids`, `num_keys`). Maintained by `NEW_OBJECT`/`OBJECT_PHYSICAL`
//! inserts and physical deletes of a still-live object, and by
//! `MVCC_DELID` (logical delete) per §4.6, since that is the point a
//! key's sole visible object actually disappears. `UNDO_INSERT_DELID`,
//! `VACUUM_OBJECT`, `VACUUM_INSID` and `UNDO_INSERT` leave them
//! untouched: the former because §4.7 doesn't reverse the MVCC_DELID
//! bookkeeping on abort, the latter two because the object they act on
//! was already excluded from the counts (see DESIGN.md).

use anyhow::Result;

use crate::btree::node_io::{self};
use crate::btree::types::{BtreeContext, ROOT_PAGE_ID};
use crate::page::PageKind;
use crate::pager::commit::SystemOp;

/// Apply `(delta_keys, delta_oids)` to the root page's unique-stat
/// counters. Counters are `u64` and saturate rather than wrap on an
/// (unexpected) negative delta past zero.
pub fn adjust(ctx: &BtreeContext, delta_keys: i64, delta_oids: i64) -> Result<()> {
    if delta_keys == 0 && delta_oids == 0 {
        return Ok(());
    }
    let kind = node_io::page_kind(ctx, ROOT_PAGE_ID)?;
    let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
    match kind {
        PageKind::Leaf => {
            let mut root = node_io::read_leaf(ctx, ROOT_PAGE_ID)?;
            if let Some(extra) = root.root_extra.as_mut() {
                apply_delta(extra, delta_keys, delta_oids);
            }
            root.write(ctx, &mut op)?;
        }
        PageKind::NonLeaf => {
            let mut root = node_io::read_nonleaf(ctx, ROOT_PAGE_ID)?;
            if let Some(extra) = root.root_extra.as_mut() {
                apply_delta(extra, delta_keys, delta_oids);
            }
            root.write(ctx, &mut op)?;
        }
        PageKind::Overflow => unreachable!("root page is never an overflow page"),
    }
    op.commit()?;
    Ok(())
}

fn apply_delta(extra: &mut crate::page::header::RootExtra, delta_keys: i64, delta_oids: i64) {
    extra.num_keys = saturating_add(extra.num_keys, delta_keys);
    extra.num_oids = saturating_add(extra.num_oids, delta_oids);
    extra.revision = extra.revision.wrapping_add(1);
}

fn saturating_add(base: u64, delta: i64) -> u64 {
    if delta >= 0 {
        base.saturating_add(delta as u64)
    } else {
        base.saturating_sub((-delta) as u64)
    }
}
