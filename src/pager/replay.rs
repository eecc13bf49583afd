//! Thin wrapper running the WAL redo pass against an already-open
//! pager, called once at `BTreeIndex::open` time.

use anyhow::Result;

use crate::pager::core::Pager;
use crate::wal::replay::replay_into;

pub fn recover(pager: &Pager) -> Result<u64> {
    replay_into(pager, pager.root())
}
