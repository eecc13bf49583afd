//! System operations (§5, §6.2): a `SystemOp` brackets one or more
//! page mutations between a WAL BEGIN and COMMIT, applying each
//! mutation's `RedoDelta` to both the durable page bytes and the WAL
//! in lockstep, and fsyncing once at the end (group commit). This is
//! the unit of atomicity an SMO (split/merge) nests its sub-steps
//! inside, per the "nested atomic sub-transaction" model.

use anyhow::Result;

use crate::page::checksum::set_page_lsn;
use crate::page::redo::RedoDelta;
use crate::pager::core::Pager;
use crate::wal::encode::apply_delta;
use crate::wal::writer::WalWriter;

pub struct SystemOp<'a> {
    pager: &'a Pager,
    wal: &'a WalWriter,
    last_lsn: u64,
}

impl<'a> SystemOp<'a> {
    pub fn begin(pager: &'a Pager, wal: &'a WalWriter) -> Result<Self> {
        let lsn = wal.start_system_op()?;
        Ok(SystemOp {
            pager,
            wal,
            last_lsn: lsn,
        })
    }

    /// Apply one page's redo delta: logs it, then patches the page's
    /// live bytes and rewrites it to disk with the record's LSN
    /// stamped into the trailer.
    pub fn apply(&mut self, page_id: u64, page: &mut Vec<u8>, flags: u8, delta: &RedoDelta) -> Result<()> {
        if let Some(lsn) = self.wal.append_delta(page_id, flags, delta)? {
            apply_delta(page, delta);
            page.resize(self.pager.page_size(), 0);
            set_page_lsn(page, lsn);
            self.pager.write_page_raw(page_id, page)?;
            self.last_lsn = lsn;
        }
        Ok(())
    }

    /// Write a brand-new page's full image as a whole-page
    /// UPDATE_ALL delta, used when a mutation allocates a page (a
    /// split's new sibling, a fresh overflow page). Idempotent on
    /// replay regardless of the page's prior on-disk contents, since
    /// it replaces the full `[0, page_size)` range.
    pub fn apply_new_page(&mut self, page_id: u64, page: &mut Vec<u8>) -> Result<()> {
        let full = page.clone();
        let delta = RedoDelta::UpdateAll {
            offset: 0,
            old_len: full.len(),
            new_bytes: full,
        };
        if let Some(lsn) = self.wal.append_delta(page_id, 0, &delta)? {
            set_page_lsn(page, lsn);
            self.pager.write_page_raw(page_id, page)?;
            self.last_lsn = lsn;
        }
        Ok(())
    }

    pub fn commit(self) -> Result<u64> {
        let lsn = self.wal.end_system_op()?;
        self.pager.set_last_lsn(lsn);
        Ok(lsn)
    }
}
