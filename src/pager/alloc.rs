//! Page allocation: pop a recycled page id from the free list before
//! reaching for a fresh one off the end of the file.

use anyhow::Result;

use crate::free::FreeList;
use crate::pager::core::Pager;

impl Pager {
    /// Allocate `count` contiguous fresh page ids, extending segments
    /// as needed. Used for bulk allocation (e.g. an overflow-OID chain
    /// extension); most callers want `allocate_one_page`.
    pub fn allocate_pages(&self, count: u64) -> Result<u64> {
        let mut next = self.next_page_id.lock().unwrap();
        let first = *next;
        for pid in first..first + count {
            self.ensure_allocated(pid)?;
        }
        *next = first + count;
        Ok(first)
    }

    /// Allocate one page id, preferring a recycled id from the free
    /// list (§4.9's overflow-chain unlink feeds this list) over
    /// extending the file.
    pub fn allocate_one_page(&self, free: &FreeList) -> Result<u64> {
        if let Some(pid) = free.pop()? {
            return Ok(pid);
        }
        self.allocate_pages(1)
    }

    pub fn free_page(&self, free: &FreeList, page_id: u64) -> Result<()> {
        free.push(page_id)
    }
}
