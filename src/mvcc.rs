//! Minimal MVCC/transaction-table stand-in (§A.5).
//!
//! The full transaction manager is out of scope; this module provides
//! just enough surface for the core to decide object visibility: an
//! `MvccId` type, a generator, and a `Snapshot` trait the core consults
//! at the points the specification names (unique-find, range scan,
//! logical delete).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MvccId(pub u64);

impl MvccId {
    /// Sentinel insert-id meaning "visible to everyone, always was".
    pub const ALL_VISIBLE: MvccId = MvccId(0);
    /// Sentinel delete-id meaning "never deleted".
    pub const NULL_MVCCID: MvccId = MvccId(u64::MAX);
}

pub struct AtomicMvccIdGenerator {
    next: AtomicU64,
}

impl AtomicMvccIdGenerator {
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start.max(1)),
        }
    }

    pub fn next(&self) -> MvccId {
        MvccId(self.next.fetch_add(1, Ordering::SeqCst))
    }

    pub fn current(&self) -> MvccId {
        MvccId(self.next.load(Ordering::SeqCst))
    }
}

impl Default for AtomicMvccIdGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Outcome of checking one object's (ins_id, del_id) pair against a
/// snapshot, per the visibility rules the delete/vacuum flows (§4.7)
/// and find flows (§4.6) branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Object is visible and not deleted; safe to physically remove once
    /// no snapshot can still need it.
    CanDelete,
    /// The object's inserter is still in-flight relative to this snapshot.
    InProgress,
    /// Deleted by a transaction that is visible to this snapshot.
    Deleted,
    /// Deleted by the same transaction that is evaluating the snapshot.
    SelfDeleted,
    /// Not yet visible (inserted after the snapshot was taken).
    Invisible,
}

/// Per-object MVCC stamp pair, as stored in an on-page object record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MvccStamp {
    pub ins_id: MvccId,
    pub del_id: MvccId,
}

impl MvccStamp {
    pub fn live(ins_id: MvccId) -> Self {
        MvccStamp {
            ins_id,
            del_id: MvccId::NULL_MVCCID,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.del_id != MvccId::NULL_MVCCID
    }
}

/// Consulted by find/scan/delete flows to decide whether a given object
/// is visible. Implementations hide whatever in-flight-transaction
/// bookkeeping a real engine would need; this crate only ships a
/// snapshot that compares `MvccId`s numerically.
pub trait Snapshot {
    /// The transaction id this snapshot is being evaluated on behalf of,
    /// used to distinguish self-deletes from deletes by others.
    fn self_txn(&self) -> MvccId;

    fn satisfies(&self, stamp: MvccStamp) -> Visibility;
}

/// A snapshot that treats every `MvccId` strictly less than `as_of` as
/// committed-and-visible, with no concept of concurrently-active
/// transactions. Sufficient for the single-writer/point-in-time
/// semantics this crate's collaborators (lock manager, WAL) provide.
#[derive(Debug, Clone, Copy)]
pub struct SimpleSnapshot {
    pub as_of: MvccId,
    pub self_txn: MvccId,
}

impl SimpleSnapshot {
    pub fn new(as_of: MvccId, self_txn: MvccId) -> Self {
        SimpleSnapshot { as_of, self_txn }
    }
}

impl Snapshot for SimpleSnapshot {
    fn self_txn(&self) -> MvccId {
        self.self_txn
    }

    fn satisfies(&self, stamp: MvccStamp) -> Visibility {
        if stamp.ins_id != MvccId::ALL_VISIBLE && stamp.ins_id >= self.as_of {
            if stamp.ins_id == self.self_txn {
                // own insert within this transaction; fall through to
                // check delete status below
            } else {
                return Visibility::Invisible;
            }
        }

        if stamp.is_deleted() {
            if stamp.del_id == self.self_txn {
                Visibility::SelfDeleted
            } else if stamp.del_id < self.as_of {
                Visibility::Deleted
            } else {
                Visibility::CanDelete
            }
        } else {
            Visibility::CanDelete
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_monotonic() {
        let gen = AtomicMvccIdGenerator::new(1);
        let a = gen.next();
        let b = gen.next();
        assert!(b.0 > a.0);
    }

    #[test]
    fn simple_snapshot_visibility() {
        let snap = SimpleSnapshot::new(MvccId(10), MvccId(5));
        assert_eq!(
            snap.satisfies(MvccStamp::live(MvccId(3))),
            Visibility::CanDelete
        );
        assert_eq!(
            snap.satisfies(MvccStamp::live(MvccId(20))),
            Visibility::Invisible
        );
        let deleted_by_other = MvccStamp {
            ins_id: MvccId(1),
            del_id: MvccId(4),
        };
        assert_eq!(snap.satisfies(deleted_by_other), Visibility::Deleted);
        let deleted_by_self = MvccStamp {
            ins_id: MvccId(1),
            del_id: MvccId(5),
        };
        assert_eq!(snap.satisfies(deleted_by_self), Visibility::SelfDeleted);
    }
}
