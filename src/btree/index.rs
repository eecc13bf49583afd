//! `BtreeIndex` (§6.1): the public entry point wiring the pager, WAL,
//! free list, lock manager and MVCCID generator into one
//! `BtreeContext` and exposing the operation flows as inherent
//! methods, the way the teacher's `Db` wires pager+WAL+directory
//! behind `Db::open`/`Db::create`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::info;

use crate::btree::node_io::LeafNode;
use crate::btree::types::{BtreeContext, Purpose, ROOT_PAGE_ID};
use crate::btree::{delete, insert, scan};
use crate::config::{BtreeConfig, BtreeIndexBuilder};
use crate::free::FreeList;
use crate::keytype::KeyType;
use crate::lock::{self, LockGuard};
use crate::lockmgr::LockManager;
use crate::mvcc::{AtomicMvccIdGenerator, MvccId, Snapshot};
use crate::oid::{ClassOid, Oid};
use crate::page::header::RootExtra;
use crate::pager::commit::SystemOp;
use crate::pager::replay;
use crate::pager::Pager;
use crate::wal::writer::WalWriter;

pub use crate::btree::scan::Direction;

/// An open B+-tree index: one key-type, one uniqueness setting, one
/// directory on disk. Holds an exclusive file lock (`lock::LockGuard`)
/// for its whole lifetime, so only one process may have a given index
/// directory open at a time (§5's single-writer simplification, see
/// DESIGN.md).
pub struct BtreeIndex {
    ctx: BtreeContext,
    _dir_lock: LockGuard,
    root: PathBuf,
}

impl BtreeIndex {
    /// Initialize a brand-new index directory: meta, free list, WAL,
    /// and an empty root leaf page (§3.7's root extra carries the
    /// key-type tag and uniqueness flag from here on).
    pub fn create(root: &Path, key_type: KeyType, is_unique: bool, builder: BtreeIndexBuilder) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir_lock = lock::acquire_exclusive_lock(root)?;

        let (cfg, page_size) = builder.build_config();
        let pager = Pager::create(root, page_size, &cfg)?;
        let free = FreeList::create(root)?;
        let wal = WalWriter::create(root)?;

        let ctx = BtreeContext {
            pager: Arc::new(pager),
            wal: Arc::new(wal),
            free: Arc::new(free),
            lockmgr: Arc::new(LockManager::new()),
            mvcc_gen: Arc::new(AtomicMvccIdGenerator::new(1)),
            key_type,
            is_unique,
            cfg,
            struct_lock: Mutex::new(()),
        };

        let root_extra = RootExtra::new(0, is_unique, false);
        ctx.pager.allocate_pages(1)?;
        let root_node = LeafNode::new_empty(ROOT_PAGE_ID, Some(root_extra));
        let mut op = SystemOp::begin(&ctx.pager, &ctx.wal)?;
        root_node.write(&ctx, &mut op)?;
        op.commit()?;
        ctx.pager.mark_dirty()?;

        info!("btree index created at {}", root.display());
        Ok(BtreeIndex {
            ctx,
            _dir_lock: dir_lock,
            root: root.to_path_buf(),
        })
    }

    /// Open an existing index directory, replaying any WAL tail left
    /// by an unclean shutdown before serving the first request.
    pub fn open(root: &Path, key_type: KeyType, is_unique: bool, builder: BtreeIndexBuilder) -> Result<Self> {
        let dir_lock = lock::acquire_exclusive_lock(root)?;
        let (cfg, _page_size) = builder.build_config();

        let pager = Pager::open(root, &cfg)?;
        if !pager.clean_shutdown() {
            info!("btree index at {} was not cleanly shut down, replaying WAL", root.display());
        }
        let next_lsn = replay::recover(&pager)?;
        let free = FreeList::open(root)?;
        let wal = WalWriter::open(root, next_lsn + 1)?;
        pager.mark_dirty()?;

        let ctx = BtreeContext {
            pager: Arc::new(pager),
            wal: Arc::new(wal),
            free: Arc::new(free),
            lockmgr: Arc::new(LockManager::new()),
            mvcc_gen: Arc::new(AtomicMvccIdGenerator::new(1)),
            key_type,
            is_unique,
            cfg,
            struct_lock: Mutex::new(()),
        };

        Ok(BtreeIndex {
            ctx,
            _dir_lock: dir_lock,
            root: root.to_path_buf(),
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Flush the meta file and mark the directory cleanly closed.
    /// Idempotent; also run from `Drop` as a best-effort fallback.
    pub fn close(&self) -> Result<()> {
        self.ctx.pager.flush_meta()?;
        self.ctx.pager.mark_clean_shutdown()
    }

    pub fn next_mvcc_id(&self) -> MvccId {
        self.ctx.mvcc_gen.next()
    }

    // -- §4.6 insert flows -------------------------------------------------

    /// NEW_OBJECT (§4.6.1/.2): insert `oid` under `key`, enforcing the
    /// unique constraint when this index `is_unique`.
    pub fn insert(&self, class_oid: ClassOid, key: Vec<u8>, oid: Oid, txn: MvccId) -> Result<()> {
        insert::insert(&self.ctx, class_oid, key, oid, txn, Purpose::NewObject)
    }

    /// UNDO_PHYSICAL_DELETE (§4.6.4): re-run the insert the caller is
    /// unwinding a physical delete of, without re-checking uniqueness
    /// or re-bumping the root's unique-stat counters.
    pub fn undo_physical_delete(&self, class_oid: ClassOid, key: Vec<u8>, oid: Oid, txn: MvccId) -> Result<()> {
        insert::insert(&self.ctx, class_oid, key, oid, txn, Purpose::UndoPhysicalDelete)
    }

    // -- §4.7 delete/vacuum/undo flows --------------------------------------

    /// Logical (MVCC) delete: stamp `oid`'s delete-MVCCID with `txn`.
    pub fn mvcc_delete(&self, class_oid: ClassOid, key: Vec<u8>, oid: Oid, txn: MvccId) -> Result<()> {
        delete::mvcc_delete(&self.ctx, class_oid, key, oid, txn)
    }

    /// UNDO_INSERT_DELID: clear a delete-MVCCID stamp set by an
    /// aborted `mvcc_delete`.
    pub fn undo_mvcc_delete(&self, class_oid: ClassOid, key: Vec<u8>, oid: Oid, txn: MvccId) -> Result<()> {
        delete::undo_mvcc_delete(&self.ctx, class_oid, key, oid, txn)
    }

    /// OBJECT_PHYSICAL: physically remove `oid`, adjusting unique-stat
    /// counters and merging the leaf if it drops below threshold.
    pub fn physical_delete(&self, class_oid: ClassOid, key: Vec<u8>, oid: Oid, txn: MvccId) -> Result<()> {
        delete::physical_delete(&self.ctx, class_oid, key, oid, txn, Purpose::PhysicalDelete)
    }

    /// UNDO_INSERT: undo a previously-applied insert via the same
    /// removal logic as `physical_delete`, without touching counters.
    pub fn undo_insert(&self, class_oid: ClassOid, key: Vec<u8>, oid: Oid, txn: MvccId) -> Result<()> {
        delete::undo_insert(&self.ctx, class_oid, key, oid, txn)
    }

    /// VACUUM_INSID: normalize `oid`'s insert-MVCCID to `ALL_VISIBLE`.
    pub fn vacuum_insert_mvccid(&self, key: Vec<u8>, oid: Oid) -> Result<()> {
        delete::vacuum_insid(&self.ctx, key, oid)
    }

    /// VACUUM_OBJECT: physically reclaim an object whose delete is
    /// visible to every active snapshot.
    pub fn vacuum_object(&self, class_oid: ClassOid, key: Vec<u8>, oid: Oid) -> Result<()> {
        delete::vacuum_object(&self.ctx, class_oid, key, oid)
    }

    // -- §4.8 find/scan flows ------------------------------------------------

    /// Every visible object under `key`, including overflow-chained
    /// ones, filtered through `snapshot`.
    pub fn find_unique(&self, key: &[u8], snapshot: &dyn Snapshot) -> Result<Vec<Oid>> {
        scan::find_unique(&self.ctx, key, snapshot)
    }

    /// `find_unique` over several keys in one call (§6.1
    /// `find_multi_uniques`, restricted here to one index rather than
    /// the full cross-index pruning scan a query executor drives).
    pub fn find_multi_uniques(&self, keys: &[Vec<u8>], snapshot: &dyn Snapshot) -> Result<Vec<Vec<Oid>>> {
        keys.iter().map(|k| self.find_unique(k, snapshot)).collect()
    }

    /// Scan `[start, end]` in `direction`, returning every visible
    /// `(key, oid)` pair in leaf order.
    pub fn range_scan(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        direction: Direction,
        snapshot: &dyn Snapshot,
    ) -> Result<Vec<(Vec<u8>, Oid)>> {
        scan::range_scan(&self.ctx, start, end, direction, snapshot)
    }

    /// `keyval_search` (§6.1): drive a `range_scan` through a
    /// per-key/oid `filter` predicate, returning the surviving count
    /// rather than a materialized vector — the query executor's
    /// counting-scan surface.
    pub fn keyval_search(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        direction: Direction,
        snapshot: &dyn Snapshot,
        mut filter: impl FnMut(&[u8], Oid) -> bool,
    ) -> Result<usize> {
        let hits = self.range_scan(start, end, direction, snapshot)?;
        Ok(hits.into_iter().filter(|(k, o)| filter(k, *o)).count())
    }
}

impl Drop for BtreeIndex {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
