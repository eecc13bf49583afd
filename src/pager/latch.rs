//! Per-page latch table backing the traversal framework's latch
//! promotion protocol (§4.3, §5). A latch is a short-lived,
//! non-reentrant mutual-exclusion primitive over one page's in-memory
//! buffer, distinct from the long-held, transaction-scoped object locks
//! in `lockmgr`.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchMode {
    Shared,
    Exclusive,
}

struct LatchState {
    mode: Option<LatchMode>,
    shared_count: u32,
    exclusive_waiters: u32,
}

/// A single page's latch. Readers may stack (`shared_count > 1`);
/// writers are exclusive. `try_promote` implements the "promote in
/// place" half of the traversal protocol: it only succeeds when this
/// caller is the sole shared holder ("shared-reader-promote"); a
/// caller that already knows it is the only reader of a page (e.g. one
/// that took the page exclusively from the start, "single-reader-
/// promote") can call it trivially since `shared_count` is then 1.
pub struct PageLatch {
    state: Mutex<LatchState>,
    cond: Condvar,
}

impl PageLatch {
    pub fn new() -> Self {
        PageLatch {
            state: Mutex::new(LatchState {
                mode: None,
                shared_count: 0,
                exclusive_waiters: 0,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn lock_shared(&self) {
        let mut st = self.state.lock().unwrap();
        loop {
            let blocked = matches!(st.mode, Some(LatchMode::Exclusive)) || st.exclusive_waiters > 0;
            if !blocked {
                st.mode = Some(LatchMode::Shared);
                st.shared_count += 1;
                return;
            }
            st = self.cond.wait(st).unwrap();
        }
    }

    pub fn try_lock_shared(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        let blocked = matches!(st.mode, Some(LatchMode::Exclusive)) || st.exclusive_waiters > 0;
        if blocked {
            return false;
        }
        st.mode = Some(LatchMode::Shared);
        st.shared_count += 1;
        true
    }

    pub fn unlock_shared(&self) {
        let mut st = self.state.lock().unwrap();
        debug_assert_eq!(st.mode, Some(LatchMode::Shared));
        st.shared_count -= 1;
        if st.shared_count == 0 {
            st.mode = None;
        }
        self.cond.notify_all();
    }

    pub fn lock_exclusive(&self) {
        let mut st = self.state.lock().unwrap();
        st.exclusive_waiters += 1;
        while st.mode.is_some() {
            st = self.cond.wait(st).unwrap();
        }
        st.exclusive_waiters -= 1;
        st.mode = Some(LatchMode::Exclusive);
    }

    pub fn try_lock_exclusive(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        if st.mode.is_some() {
            return false;
        }
        st.mode = Some(LatchMode::Exclusive);
        true
    }

    pub fn unlock_exclusive(&self) {
        let mut st = self.state.lock().unwrap();
        debug_assert_eq!(st.mode, Some(LatchMode::Exclusive));
        st.mode = None;
        self.cond.notify_all();
    }

    /// Attempt to upgrade a held shared latch to exclusive without
    /// releasing it. Fails (returns `false`, caller must restart the
    /// traversal step per §4.3) if another reader also holds the page.
    pub fn try_promote(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        debug_assert_eq!(st.mode, Some(LatchMode::Shared));
        if st.shared_count == 1 {
            st.mode = Some(LatchMode::Exclusive);
            st.shared_count = 0;
            true
        } else {
            false
        }
    }
}

impl Default for PageLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Table mapping page id to its latch, lazily populated and never
/// shrunk: latches are cheap and the table's lifetime is the pager's.
#[derive(Default)]
pub struct LatchTable {
    inner: Mutex<HashMap<u64, Arc<PageLatch>>>,
}

impl LatchTable {
    pub fn new() -> Self {
        LatchTable {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, page_id: u64) -> Arc<PageLatch> {
        let mut map = self.inner.lock().unwrap();
        map.entry(page_id)
            .or_insert_with(|| Arc::new(PageLatch::new()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn shared_readers_stack_then_release() {
        let latch = Arc::new(PageLatch::new());
        latch.lock_shared();
        assert!(latch.try_lock_shared());
        assert!(!latch.try_promote());
        latch.unlock_shared();
        assert!(latch.try_promote());
        latch.unlock_exclusive();
    }

    #[test]
    fn sole_shared_reader_can_promote() {
        let latch = PageLatch::new();
        latch.lock_shared();
        assert!(latch.try_promote());
        latch.unlock_exclusive();
    }

    #[test]
    fn exclusive_excludes_everything() {
        let latch = Arc::new(PageLatch::new());
        latch.lock_exclusive();
        assert!(!latch.try_lock_shared());
        let l2 = latch.clone();
        let handle = thread::spawn(move || {
            l2.lock_shared();
            l2.unlock_shared();
        });
        latch.unlock_exclusive();
        handle.join().unwrap();
    }
}
