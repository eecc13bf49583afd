//! Overflow-OID chain management (§4.9): when a leaf record's inline
//! object count would cross `btree_max_oidlen_inpage`, later objects
//! move into a singly linked chain of dedicated overflow pages instead
//! of growing the leaf record further. New objects are inserted into
//! the first page in the chain with room; a page that empties out is
//! unlinked and freed. Both operations are logged inside the caller's
//! `SystemOp` so the leaf record's link update and the chain edit
//! commit as one unit.

use anyhow::Result;

use crate::btree::node_io;
use crate::btree::types::BtreeContext;
use crate::consts::{COMMON_HDR_LEN, NO_PAGE, TRAILER_LEN};
use crate::error::BtreeError;
use crate::oid::Oid;
use crate::page::object::ObjectInfo;
use crate::page::ovf::{OvfHeader, OvfRecord, OVF_HDR_LEN};
use crate::pager::commit::SystemOp;

fn overflow_usable(ctx: &BtreeContext) -> usize {
    ctx.pager
        .page_size()
        .saturating_sub(COMMON_HDR_LEN + OVF_HDR_LEN + 4 + TRAILER_LEN)
}

fn fits_one_more(ctx: &BtreeContext, record: &OvfRecord) -> bool {
    record.encode().len() + OvfRecord::fixed_object_size(false) <= overflow_usable(ctx)
}

/// Insert `object` into the chain rooted at `head` (`None` if the
/// record has no overflow chain yet), returning the chain's (possibly
/// new) head page id.
pub fn insert_into_chain(
    ctx: &BtreeContext,
    op: &mut SystemOp,
    head: Option<u64>,
    object: ObjectInfo,
) -> Result<u64> {
    let mut cur = head;
    while let Some(page_id) = cur {
        let (header, mut record) = node_io::read_overflow(ctx, page_id)?;
        if fits_one_more(ctx, &record) {
            record.insert_sorted(object);
            node_io::write_overflow(ctx, op, page_id, &header, &record)?;
            return Ok(head.unwrap());
        }
        cur = if header.next_overflow_vpid == NO_PAGE {
            None
        } else {
            Some(header.next_overflow_vpid)
        };
    }

    let new_id = ctx.pager.allocate_one_page(&ctx.free)?;
    let mut record = OvfRecord::default();
    record.insert_sorted(object);
    let header = OvfHeader {
        next_overflow_vpid: head.unwrap_or(NO_PAGE),
    };
    node_io::write_overflow(ctx, op, new_id, &header, &record)?;
    Ok(new_id)
}

/// Remove `oid` from the chain rooted at `head`. Returns the chain's
/// new head (`None` if the chain is now empty).
pub fn remove_from_chain(ctx: &BtreeContext, op: &mut SystemOp, head: u64, oid: Oid) -> Result<Option<u64>> {
    let mut prev: Option<u64> = None;
    let mut cur = head;
    loop {
        let (header, mut record) = node_io::read_overflow(ctx, cur)?;
        match record.remove_by_oid(oid) {
            Ok(_) => {
                if record.is_empty() {
                    let next = header.next_overflow_vpid;
                    if let Some(prev_id) = prev {
                        let (mut prev_header, prev_record) = node_io::read_overflow(ctx, prev_id)?;
                        prev_header.next_overflow_vpid = next;
                        node_io::write_overflow(ctx, op, prev_id, &prev_header, &prev_record)?;
                        ctx.pager.free_page(&ctx.free, cur)?;
                        return Ok(Some(head));
                    }
                    ctx.pager.free_page(&ctx.free, cur)?;
                    return Ok(if next == NO_PAGE { None } else { Some(next) });
                }
                node_io::write_overflow(ctx, op, cur, &header, &record)?;
                return Ok(Some(head));
            }
            Err(_) => {
                if header.next_overflow_vpid == NO_PAGE {
                    return Err(BtreeError::OidNotFound(oid).into());
                }
                prev = Some(cur);
                cur = header.next_overflow_vpid;
            }
        }
    }
}

/// Remove and return the chain's highest-OID object (§4.7.1's "swap the
/// last overflow object into the first slot"), along with the chain's
/// new head. Each page's objects are individually OID-sorted (I3) but
/// pages aren't globally ordered relative to each other, so this scans
/// every page for the true maximum before delegating the actual removal
/// to `remove_from_chain`.
pub fn pop_largest_from_chain(
    ctx: &BtreeContext,
    op: &mut SystemOp,
    head: u64,
) -> Result<(ObjectInfo, Option<u64>)> {
    let mut max_obj: Option<ObjectInfo> = None;
    let mut cur = head;
    loop {
        let (header, record) = node_io::read_overflow(ctx, cur)?;
        if let Some(last) = record.objects.last() {
            if max_obj.map(|m| last.oid > m.oid).unwrap_or(true) {
                max_obj = Some(*last);
            }
        }
        if header.next_overflow_vpid == NO_PAGE {
            break;
        }
        cur = header.next_overflow_vpid;
    }
    let obj = max_obj.ok_or_else(|| BtreeError::CorruptLayout("empty overflow chain".into()))?;
    let new_head = remove_from_chain(ctx, op, head, obj.oid)?;
    Ok((obj, new_head))
}

/// Stamp `oid`'s delete-MVCCID somewhere in the chain rooted at
/// `head` (§4.7 logical delete / UNDO_INSERT_DELID reaching into a
/// spilled record's tail).
pub fn stamp_del_id_in_chain(ctx: &BtreeContext, op: &mut SystemOp, head: u64, oid: Oid, del_id: crate::mvcc::MvccId) -> Result<()> {
    let mut cur = head;
    loop {
        let (header, mut record) = node_io::read_overflow(ctx, cur)?;
        if let Some(obj_idx) = record.objects.iter().position(|o| o.oid == oid) {
            record.objects[obj_idx].del_id = Some(del_id);
            node_io::write_overflow(ctx, op, cur, &header, &record)?;
            return Ok(());
        }
        if header.next_overflow_vpid == NO_PAGE {
            return Err(BtreeError::OidNotFound(oid).into());
        }
        cur = header.next_overflow_vpid;
    }
}

/// Stamp `oid`'s insert-MVCCID somewhere in the chain rooted at
/// `head` (§4.7 VACUUM_INSID reaching into a spilled record's tail).
pub fn stamp_ins_id_in_chain(ctx: &BtreeContext, op: &mut SystemOp, head: u64, oid: Oid, ins_id: crate::mvcc::MvccId) -> Result<()> {
    let mut cur = head;
    loop {
        let (header, mut record) = node_io::read_overflow(ctx, cur)?;
        if let Some(obj_idx) = record.objects.iter().position(|o| o.oid == oid) {
            record.objects[obj_idx].ins_id = Some(ins_id);
            node_io::write_overflow(ctx, op, cur, &header, &record)?;
            return Ok(());
        }
        if header.next_overflow_vpid == NO_PAGE {
            return Err(BtreeError::OidNotFound(oid).into());
        }
        cur = header.next_overflow_vpid;
    }
}

/// Walk the whole chain collecting every object, for range-scan
/// expansion of a record flagged `OVERFLOW_OIDS`.
pub fn collect_chain(ctx: &BtreeContext, head: u64) -> Result<Vec<ObjectInfo>> {
    let mut out = Vec::new();
    let mut cur = head;
    loop {
        let (header, record) = node_io::read_overflow(ctx, cur)?;
        out.extend(record.objects);
        if header.next_overflow_vpid == NO_PAGE {
            return Ok(out);
        }
        cur = header.next_overflow_vpid;
    }
}
