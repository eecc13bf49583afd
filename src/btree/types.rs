//! Shared context and small value types threaded through the B-tree
//! operation flows (§4).

use std::sync::{Arc, Mutex};

use crate::config::BtreeConfig;
use crate::free::FreeList;
use crate::keytype::KeyType;
use crate::lockmgr::LockManager;
use crate::mvcc::AtomicMvccIdGenerator;
use crate::pager::Pager;
use crate::wal::writer::WalWriter;

/// Root page is pinned at id 0 for the lifetime of the index; growth
/// happens in place (§4.4's root split rewrites page 0 as a fresh
/// non-leaf holding the old root's contents as two children).
pub const ROOT_PAGE_ID: u64 = 0;

/// The collaborators every traversal/insert/delete/scan step needs:
/// the pager/WAL/free-list (§A.7, §4.10), the lock manager stand-in
/// (§A.6), the MVCCID generator (§A.5), and the index's own key-type
/// and uniqueness, which are fixed for the life of the index.
pub struct BtreeContext {
    pub pager: Arc<Pager>,
    pub wal: Arc<WalWriter>,
    pub free: Arc<FreeList>,
    pub lockmgr: Arc<LockManager>,
    pub mvcc_gen: Arc<AtomicMvccIdGenerator>,
    pub key_type: KeyType,
    pub is_unique: bool,
    pub cfg: BtreeConfig,
    /// Serializes structural mutation (insert/delete/split/merge): with
    /// this held, a descent never needs to promote a page latch
    /// mid-traversal, since no other mutator can be interleaved. Reads
    /// (find/scan) do not take it and rely on per-page checksums plus
    /// MVCC visibility instead.
    pub struct_lock: Mutex<()>,
}

/// Which forward flow produced a given mutation (§4.6, §4.7). Kept
/// mostly for logging: this crate's unit of atomicity is one
/// `SystemOp` per call rather than a long-running user transaction, so
/// "undo" purposes are realized by the caller re-invoking the matching
/// forward flow rather than by a separate compensation record type —
/// see DESIGN.md's open-question decision.
///
/// `NewObject`/`PhysicalDelete` are the only purposes that adjust the
/// root's unique-stat counters (§4.6's insert_new_key /
/// append_object_unique and §4.7's OBJECT_PHYSICAL); every undo and
/// vacuum purpose leaves them untouched (§4.7: "Update unique counters
/// for OBJECT_PHYSICAL only; UNDO and VACUUM do not touch counters").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    NewObject,
    UndoPhysicalDelete,
    MvccDelete,
    PhysicalDelete,
    UndoInsert,
    VacuumInsId,
    VacuumObject,
}
