//! Delete flows (§4.7): logical (MVCC) delete stamps `del_id` without
//! removing anything; physical delete removes an object outright,
//! possibly reaching into its overflow-OID chain, and can trigger a
//! merge; vacuum flows reclaim bookkeeping once no live snapshot can
//! still need it. UNDO_INSERT reuses `physical_delete`'s machinery
//! directly (an aborted insert is undone by physically removing what
//! it added) but skips the unique-stat update, since the original
//! insert's stat bump is the thing being unwound; UNDO_INSERT_DELID
//! clears a `del_id` stamp the same way a logical delete set it.

use std::cmp::Ordering;

use anyhow::Result;

use crate::btree::node_io::{self, LeafNode};
use crate::btree::types::{BtreeContext, Purpose};
use crate::btree::{merge, overflow, stats, traversal};
use crate::error::BtreeError;
use crate::lockmgr::LockMode;
use crate::mvcc::MvccId;
use crate::oid::{ClassOid, Oid};
use crate::pager::commit::SystemOp;

fn find_record(ctx: &BtreeContext, leaf: &LeafNode, key: &[u8]) -> Result<usize> {
    leaf.records
        .iter()
        .position(|r| !r.is_fence && ctx.key_type.compare(&r.key, key) == Ordering::Equal)
        .ok_or_else(|| BtreeError::KeyNotFound.into())
}

/// Stamp `oid`'s delete-MVCCID with `txn` (§4.7 logical delete). The
/// object stays in place, visible to snapshots taken before `txn`.
pub fn mvcc_delete(ctx: &BtreeContext, class_oid: ClassOid, key: Vec<u8>, oid: Oid, txn: MvccId) -> Result<()> {
    let _struct_guard = ctx.struct_lock.lock().unwrap();
    ctx.lockmgr.acquire(class_oid, oid, txn.0, LockMode::Exclusive);
    let result = stamp_del_id(ctx, &key, oid, Some(txn));
    ctx.lockmgr.release(class_oid, oid, txn.0);
    result
}

/// Clear a delete stamp (UNDO_INSERT_DELID: the transaction that
/// logically deleted `oid` aborted).
pub fn undo_mvcc_delete(ctx: &BtreeContext, class_oid: ClassOid, key: Vec<u8>, oid: Oid, txn: MvccId) -> Result<()> {
    let _struct_guard = ctx.struct_lock.lock().unwrap();
    ctx.lockmgr.acquire(class_oid, oid, txn.0, LockMode::Exclusive);
    let result = stamp_del_id(ctx, &key, oid, None);
    ctx.lockmgr.release(class_oid, oid, txn.0);
    result
}

fn stamp_del_id(ctx: &BtreeContext, key: &[u8], oid: Oid, del_id: Option<MvccId>) -> Result<()> {
    let descent = traversal::descend_to_leaf(ctx, key)?;
    let mut leaf = node_io::read_leaf(ctx, descent.leaf_page_id)?;
    let idx = find_record(ctx, &leaf, key)?;
    leaf.header.update_split_pivot(idx, leaf.records.len());

    let stamped = match leaf.records[idx].objects.iter().position(|o| o.oid == oid) {
        Some(obj_idx) => {
            leaf.records[idx].objects[obj_idx].del_id = Some(del_id.unwrap_or(MvccId::NULL_MVCCID));
            true
        }
        None => false,
    };

    if !stamped {
        // Not one of the inline objects; the record's tail may be
        // spilled into the overflow-OID chain (§4.9).
        let head = leaf.records[idx]
            .overflow_oids_link
            .ok_or(BtreeError::OidNotFound(oid))?;
        let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
        overflow::stamp_del_id_in_chain(ctx, &mut op, head, oid, del_id.unwrap_or(MvccId::NULL_MVCCID))?;
        op.commit()?;
        if ctx.is_unique && del_id.is_some() {
            stats::adjust(ctx, -1, -1)?;
        }
        return Ok(());
    }

    let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
    leaf.write(ctx, &mut op)?;
    op.commit()?;

    // §4.6 MVCC_DELID: a unique index has at most one visible object
    // per key, so stamping it dead always takes the key from one
    // visible object to none. UNDO_INSERT_DELID (`del_id: None`, a
    // clear rather than a stamp) leaves counters untouched per §4.7.
    if ctx.is_unique && del_id.is_some() {
        stats::adjust(ctx, -1, -1)?;
    }
    Ok(())
}

/// Physically remove `oid` from its record (§4.7 OBJECT_PHYSICAL /
/// UNDO_INSERT / VACUUM_OBJECT), reaching into the overflow-OID chain
/// if the object isn't one of the inline ones. Drops the whole record
/// once its last object is gone, and checks the leaf for a merge.
/// Only `Purpose::PhysicalDelete` adjusts the root's unique-stat
/// counters (§4.7); `UndoInsert`/`VacuumObject` leave them alone.
pub fn physical_delete(
    ctx: &BtreeContext,
    class_oid: ClassOid,
    key: Vec<u8>,
    oid: Oid,
    txn: MvccId,
    purpose: Purpose,
) -> Result<()> {
    let _struct_guard = ctx.struct_lock.lock().unwrap();
    ctx.lockmgr.acquire(class_oid, oid, txn.0, LockMode::Exclusive);
    let result = physical_delete_locked(ctx, &key, oid, purpose);
    ctx.lockmgr.release(class_oid, oid, txn.0);
    result
}

/// Undo a previously-applied insert (§4.7's reuse of `physical_delete`
/// for `UNDO_INSERT`): same removal logic, no unique-stat update.
pub fn undo_insert(ctx: &BtreeContext, class_oid: ClassOid, key: Vec<u8>, oid: Oid, txn: MvccId) -> Result<()> {
    physical_delete(ctx, class_oid, key, oid, txn, Purpose::UndoInsert)
}

fn physical_delete_locked(ctx: &BtreeContext, key: &[u8], oid: Oid, purpose: Purpose) -> Result<()> {
    let descent = traversal::descend_to_leaf(ctx, key)?;
    let mut leaf = node_io::read_leaf(ctx, descent.leaf_page_id)?;
    let idx = find_record(ctx, &leaf, key)?;
    leaf.header.update_split_pivot(idx, leaf.records.len());

    let inline_idx = leaf.records[idx].objects.iter().position(|o| o.oid == oid);
    if inline_idx.is_none() {
        if let Some(head) = leaf.records[idx].overflow_oids_link {
            let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
            let new_head = overflow::remove_from_chain(ctx, &mut op, head, oid)?;
            leaf.records[idx].set_overflow_link(new_head);
            leaf.write(ctx, &mut op)?;
            op.commit()?;
            if purpose == Purpose::PhysicalDelete {
                stats::adjust(ctx, 0, -1)?;
            }
            return Ok(());
        }
        return Err(BtreeError::OidNotFound(oid).into());
    }
    let inline_idx = inline_idx.unwrap();
    let n_inline = leaf.records[idx].n_objects();

    let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;

    if inline_idx == 0 && n_inline > 1 {
        // §4.7.1: removing the first-but-not-only inline object moves
        // the record's last object into the first slot and truncates
        // the tail, rather than shifting the rest down.
        let last = n_inline - 1;
        let replacement = leaf.records[idx].objects[last];
        leaf.records[idx].remove_object_at(last)?;
        leaf.records[idx].change_first_object(replacement);
    } else {
        leaf.records[idx].remove_object_at(inline_idx)?;
    }

    if leaf.records[idx].n_objects() == 0 {
        if let Some(head) = leaf.records[idx].overflow_oids_link {
            // §4.7.1: the record still has overflow objects — swap the
            // chain's highest-OID object into the now-empty first slot
            // and deallocate the overflow page once it empties out.
            let (replacement, new_head) = overflow::pop_largest_from_chain(ctx, &mut op, head)?;
            leaf.records[idx].objects.push(replacement);
            leaf.records[idx].set_overflow_link(new_head);
        }
    }

    let record_dropped = leaf.records[idx].n_objects() == 0 && leaf.records[idx].overflow_oids_link.is_none();
    if record_dropped {
        leaf.records.remove(idx);
    }

    leaf.write(ctx, &mut op)?;
    op.commit()?;

    if purpose == Purpose::PhysicalDelete {
        stats::adjust(ctx, if record_dropped { -1 } else { 0 }, -1)?;
    }

    merge::maybe_merge_leaf(ctx, leaf, descent.path)
}

/// Normalize an object's insert-MVCCID to `ALL_VISIBLE` once no
/// snapshot predating it remains active (§4.7 VACUUM_INSID).
pub fn vacuum_insid(ctx: &BtreeContext, key: Vec<u8>, oid: Oid) -> Result<()> {
    let _struct_guard = ctx.struct_lock.lock().unwrap();
    let descent = traversal::descend_to_leaf(ctx, &key)?;
    let mut leaf = node_io::read_leaf(ctx, descent.leaf_page_id)?;
    let idx = find_record(ctx, &leaf, &key)?;
    leaf.header.update_split_pivot(idx, leaf.records.len());
    match leaf.records[idx].objects.iter().position(|o| o.oid == oid) {
        Some(obj_idx) => {
            leaf.records[idx].objects[obj_idx].ins_id = Some(MvccId::ALL_VISIBLE);
            let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
            leaf.write(ctx, &mut op)?;
            op.commit()?;
            Ok(())
        }
        None => {
            let head = leaf.records[idx]
                .overflow_oids_link
                .ok_or(BtreeError::OidNotFound(oid))?;
            let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
            overflow::stamp_ins_id_in_chain(ctx, &mut op, head, oid, MvccId::ALL_VISIBLE)?;
            op.commit()?;
            Ok(())
        }
    }
}

/// Physically reclaim an object whose delete is visible to every
/// active snapshot (§4.7 VACUUM_OBJECT). Does not touch unique-stat
/// counters: they were already adjusted when the delete that made
/// this object reclaimable was originally applied.
pub fn vacuum_object(ctx: &BtreeContext, class_oid: ClassOid, key: Vec<u8>, oid: Oid) -> Result<()> {
    physical_delete(ctx, class_oid, key, oid, MvccId::ALL_VISIBLE, Purpose::VacuumObject)
}
