//! In-process object lock manager (§5, §A.6): coarse-grained S/X/IS/IX
//! locking keyed on `(ClassOid, Oid)`, held for the duration of a
//! caller's transaction rather than a single page latch's lifetime.
//! Distinct from `pager::latch`, which only ever protects one page
//! buffer for the duration of a traversal step.
//!
//! This is a stand-in for the full lock manager/deadlock detector a
//! real transaction subsystem would own (§1, out of scope); it
//! provides just enough surface — conditional and unconditional
//! acquisition, compatible-mode stacking, release-by-holder — for the
//! B-tree core to serialize concurrent mutators of the same object.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};

use crate::oid::{ClassOid, Oid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    IntentShared,
    IntentExclusive,
    Shared,
    Exclusive,
}

impl LockMode {
    /// Lock-compatibility matrix: can `self` be held while `other` is
    /// also held by a different transaction?
    fn compatible_with(self, other: LockMode) -> bool {
        use LockMode::*;
        match (self, other) {
            (IntentShared, IntentShared)
            | (IntentShared, IntentExclusive)
            | (IntentExclusive, IntentShared)
            | (IntentShared, Shared)
            | (Shared, IntentShared)
            | (IntentExclusive, IntentExclusive)
            | (Shared, Shared) => true,
            _ => false,
        }
    }
}

#[derive(Default)]
struct KeyState {
    /// transaction id -> mode held
    holders: HashMap<u64, LockMode>,
}

impl KeyState {
    fn compatible(&self, txn: u64, mode: LockMode) -> bool {
        self.holders
            .iter()
            .all(|(&h, &m)| h == txn || mode.compatible_with(m))
    }
}

pub struct LockManager {
    table: Mutex<HashMap<(ClassOid, Oid), KeyState>>,
    cond: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        LockManager {
            table: Mutex::new(HashMap::new()),
            cond: Condvar::new(),
        }
    }

    /// Block until `(class_oid, oid)` can be locked in `mode` by
    /// `txn`, per the traversal framework's "unconditional acquire"
    /// calls used on the found leaf record before mutating it.
    pub fn acquire(&self, class_oid: ClassOid, oid: Oid, txn: u64, mode: LockMode) {
        let mut table = self.table.lock().unwrap();
        loop {
            let state = table.entry((class_oid, oid)).or_default();
            if state.compatible(txn, mode) {
                state.holders.insert(txn, mode);
                return;
            }
            table = self.cond.wait(table).unwrap();
        }
    }

    /// Non-blocking variant used where a lock conflict should abort
    /// the current traversal step and retry top-down rather than
    /// block holding page latches (the "conditional acquire" calls in
    /// the insert/delete flows).
    pub fn try_acquire(&self, class_oid: ClassOid, oid: Oid, txn: u64, mode: LockMode) -> bool {
        let mut table = self.table.lock().unwrap();
        let state = table.entry((class_oid, oid)).or_default();
        if state.compatible(txn, mode) {
            state.holders.insert(txn, mode);
            true
        } else {
            false
        }
    }

    pub fn release(&self, class_oid: ClassOid, oid: Oid, txn: u64) {
        let mut table = self.table.lock().unwrap();
        if let Some(state) = table.get_mut(&(class_oid, oid)) {
            state.holders.remove(&txn);
            if state.holders.is_empty() {
                table.remove(&(class_oid, oid));
            }
        }
        self.cond.notify_all();
    }

    pub fn release_all(&self, txn: u64) {
        let mut table = self.table.lock().unwrap();
        table.retain(|_, state| {
            state.holders.remove(&txn);
            !state.holders.is_empty()
        });
        self.cond.notify_all();
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_locks_stack_exclusive_excludes() {
        let lm = LockManager::new();
        let oid = Oid::new(1, 1, 1);
        let class = ClassOid(Oid::NULL);
        assert!(lm.try_acquire(class, oid, 1, LockMode::Shared));
        assert!(lm.try_acquire(class, oid, 2, LockMode::Shared));
        assert!(!lm.try_acquire(class, oid, 3, LockMode::Exclusive));
        lm.release(class, oid, 1);
        lm.release(class, oid, 2);
        assert!(lm.try_acquire(class, oid, 3, LockMode::Exclusive));
    }

    #[test]
    fn intent_locks_compose() {
        let lm = LockManager::new();
        let oid = Oid::new(2, 2, 2);
        let class = ClassOid(Oid::NULL);
        assert!(lm.try_acquire(class, oid, 1, LockMode::IntentExclusive));
        assert!(lm.try_acquire(class, oid, 2, LockMode::IntentExclusive));
        assert!(!lm.try_acquire(class, oid, 3, LockMode::Exclusive));
    }
}
