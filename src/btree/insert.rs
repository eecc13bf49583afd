//! Insert flows (§4.6): NEW_OBJECT (a fresh row), and the
//! UNDO_PHYSICAL_DELETE/MVCC_DELID variants that re-run the same
//! forward logic without the uniqueness recheck, since they restore an
//! object this index already validated once (§5's "undo re-invokes the
//! forward flow" decision, see DESIGN.md).

use std::cmp::Ordering;

use anyhow::Result;

use crate::btree::node_io::{self, LeafNode};
use crate::btree::types::{BtreeContext, Purpose};
use crate::btree::{overflow, split, stats, traversal};
use crate::error::BtreeError;
use crate::lockmgr::LockMode;
use crate::mvcc::MvccId;
use crate::oid::{ClassOid, Oid};
use crate::page::fence;
use crate::page::leaf::LeafRecord;
use crate::page::object::ObjectInfo;
use crate::pager::commit::SystemOp;

/// Insert `oid` under `key`, stamped with `txn` as its insert-MVCCID.
/// `purpose` selects whether a live duplicate under a unique index is
/// rejected (`NewObject`) or tolerated because this call is replaying
/// an already-validated forward flow (`UndoPhysicalDelete`).
pub fn insert(
    ctx: &BtreeContext,
    class_oid: ClassOid,
    key: Vec<u8>,
    oid: Oid,
    txn: MvccId,
    purpose: Purpose,
) -> Result<()> {
    let _struct_guard = ctx.struct_lock.lock().unwrap();
    ctx.lockmgr.acquire(class_oid, oid, txn.0, LockMode::Exclusive);
    let result = insert_locked(ctx, key, oid, txn, purpose);
    ctx.lockmgr.release(class_oid, oid, txn.0);
    result
}

fn insert_locked(ctx: &BtreeContext, key: Vec<u8>, oid: Oid, txn: MvccId, purpose: Purpose) -> Result<()> {
    let descent = traversal::descend_to_leaf(ctx, &key)?;
    let mut leaf = node_io::read_leaf(ctx, descent.leaf_page_id)?;

    let existing_idx = leaf
        .records
        .iter()
        .position(|r| !r.is_fence && ctx.key_type.compare(&r.key, &key) == Ordering::Equal);

    let new_object = ObjectInfo::with_mvcc(oid, txn, MvccId::NULL_MVCCID).to_fixed_size();

    let had_live_before = ctx.is_unique
        && existing_idx
            .map(|idx| {
                leaf.records[idx]
                    .objects
                    .iter()
                    .any(|o| o.del_id.map(|d| d == MvccId::NULL_MVCCID).unwrap_or(true))
            })
            .unwrap_or(false);
    let is_new_key = existing_idx.is_none() || (ctx.is_unique && !had_live_before);
    let touched_idx = match existing_idx {
        Some(idx) => {
            if ctx.is_unique {
                if purpose == Purpose::NewObject && had_live_before {
                    return Err(BtreeError::unique_violation_with_key(format!("{:?}", key)).into());
                }
                // §4.6.2: the newly visible object must become the first
                // object of the record; whatever was first is relocated
                // to a non-unique-style tail slot.
                let old_first = leaf.records[idx].objects[0];
                leaf.records[idx].change_first_object(new_object);
                leaf.records[idx].append_object_at_end(old_first);
            } else {
                leaf.records[idx].insert_object_sorted_by_oid(new_object);
            }
            idx
        }
        None => {
            let (start, end) = fence::non_fence_bounds(&leaf.records);
            let insert_at = leaf.records[start..end]
                .iter()
                .position(|r| ctx.key_type.compare(&r.key, &key) == Ordering::Greater)
                .map(|i| start + i)
                .unwrap_or(end);
            leaf.records.insert(insert_at, LeafRecord::new(key.clone(), new_object));
            insert_at
        }
    };

    leaf.header.bump_max_key_len(key.len() as u16);
    leaf.header.update_split_pivot(touched_idx, leaf.records.len());
    enforce_oid_limit(ctx, &mut leaf, touched_idx)?;

    if leaf.fits(ctx.pager.page_size()) {
        let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
        leaf.write(ctx, &mut op)?;
        op.commit()?;
    } else {
        split::split_leaf(ctx, leaf, descent.path)?;
    }

    if purpose == Purpose::NewObject {
        stats::adjust(ctx, if is_new_key { 1 } else { 0 }, 1)?;
    }
    Ok(())
}

/// Spill a record's tail into the overflow-OID chain (§4.9) once its
/// inline object count crosses `btree_max_oidlen_inpage`.
fn enforce_oid_limit(ctx: &BtreeContext, leaf: &mut LeafNode, idx: usize) -> Result<()> {
    if leaf.records[idx].n_objects() <= ctx.cfg.btree_max_oidlen_inpage {
        return Ok(());
    }
    let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
    while leaf.records[idx].n_objects() > ctx.cfg.btree_max_oidlen_inpage {
        let last = leaf.records[idx].n_objects() - 1;
        let spilled = leaf.records[idx].objects[last].to_fixed_size();
        leaf.records[idx].remove_object_at(last)?;
        let head = leaf.records[idx].overflow_oids_link;
        let new_head = overflow::insert_into_chain(ctx, &mut op, head, spilled)?;
        leaf.records[idx].set_overflow_link(Some(new_head));
        leaf.records[idx].set_first_object_fixed_size();
    }
    op.commit()?;
    Ok(())
}
