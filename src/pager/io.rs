//! Low-level page I/O: allocation-aware reads/writes through the page
//! cache, and the page-buffer latch handles the B+-tree traversal
//! layer fixes/unfixes pages with (§4.3, §5).

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::page::checksum::{update_checksum, verify_checksum};
use crate::pager::core::Pager;
use crate::pager::latch::{LatchMode, PageLatch};

/// An acquired page latch, released on drop. Distinct from pinning the
/// page's bytes: callers read/write the actual bytes via
/// `Pager::read_page`/`write_page_raw` while holding this.
pub struct PageLatchGuard {
    latch: Arc<PageLatch>,
    mode: LatchMode,
    pub page_id: u64,
}

impl PageLatchGuard {
    /// Attempt "promote in place" (§4.3). On success this guard now
    /// holds the page exclusively; on failure the caller must release
    /// and restart the traversal step from the parent per the
    /// "shared-reader-promote"/"single-reader-promote" protocol.
    pub fn try_promote(&mut self) -> bool {
        if self.mode == LatchMode::Exclusive {
            return true;
        }
        if self.latch.try_promote() {
            self.mode = LatchMode::Exclusive;
            true
        } else {
            false
        }
    }

    pub fn mode(&self) -> LatchMode {
        self.mode
    }
}

impl Drop for PageLatchGuard {
    fn drop(&mut self) {
        match self.mode {
            LatchMode::Shared => self.latch.unlock_shared(),
            LatchMode::Exclusive => self.latch.unlock_exclusive(),
        }
    }
}

impl Pager {
    pub fn latch_shared(&self, page_id: u64) -> PageLatchGuard {
        let latch = self.latches.get(page_id);
        latch.lock_shared();
        PageLatchGuard {
            latch,
            mode: LatchMode::Shared,
            page_id,
        }
    }

    pub fn try_latch_shared(&self, page_id: u64) -> Option<PageLatchGuard> {
        let latch = self.latches.get(page_id);
        if latch.try_lock_shared() {
            Some(PageLatchGuard {
                latch,
                mode: LatchMode::Shared,
                page_id,
            })
        } else {
            None
        }
    }

    pub fn latch_exclusive(&self, page_id: u64) -> PageLatchGuard {
        let latch = self.latches.get(page_id);
        latch.lock_exclusive();
        PageLatchGuard {
            latch,
            mode: LatchMode::Exclusive,
            page_id,
        }
    }

    /// Extend the backing segment (if needed) so `page_id` is
    /// addressable. Does not touch the next-page-id watermark: callers
    /// that allocate fresh ids (`Pager::allocate_pages`) already hold
    /// that lock themselves and bump it once for the whole batch.
    pub(crate) fn ensure_allocated(&self, page_id: u64) -> Result<()> {
        let (seg, _) = self.locate(page_id);
        self.ensure_segment(seg)
    }

    /// Read one page's raw bytes, cache-first, verifying its checksum.
    pub fn read_page(&self, page_id: u64) -> Result<Vec<u8>> {
        let page_size = self.page_size();
        {
            let mut cache = self.cache.lock().unwrap();
            let mut buf = vec![0u8; page_size];
            if cache.get_mut(page_id, &mut buf) {
                return Ok(buf);
            }
        }
        let (seg, off) = self.locate(page_id);
        let mut f = self.open_seg_rw(seg)?;
        f.seek(SeekFrom::Start(off))?;
        let mut buf = vec![0u8; page_size];
        f.read_exact(&mut buf)
            .map_err(|e| anyhow!("read page {}: {}", page_id, e))?;
        if !verify_checksum(&buf) {
            return Err(anyhow!("checksum mismatch reading page {}", page_id));
        }
        self.cache.lock().unwrap().put(page_id, &buf);
        Ok(buf)
    }

    /// Write a page's full bytes to its segment, updating the trailer
    /// checksum first. Does not touch the WAL — callers that need
    /// durability go through `pager::commit`.
    pub fn write_page_raw(&self, page_id: u64, page: &mut [u8]) -> Result<()> {
        update_checksum(page);
        let (seg, off) = self.locate(page_id);
        self.ensure_segment(seg)?;
        let mut f = self.open_seg_rw(seg)?;
        f.seek(SeekFrom::Start(off))?;
        f.write_all(page)?;
        if self.data_fsync {
            f.sync_data()?;
        }
        self.cache.lock().unwrap().put(page_id, page);
        Ok(())
    }
}
