//! Append-only WAL writer. One file per index (`wal-000001.log`),
//! written under a single mutex since every mutation appends at least
//! one BEGIN/COMMIT-bracketed group of diff records (§5's "system
//! operation").

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::Result;

use crate::consts::{WAL_HDR_SIZE, WAL_MAGIC, WAL_REC_BEGIN, WAL_REC_COMMIT, WAL_REC_TRUNCATE};
use crate::page::redo::RedoDelta;
use crate::wal::encode::{encode_delta, write_record};
use crate::wal::wal_path;

struct Inner {
    file: std::fs::File,
    pos: u64,
}

pub struct WalWriter {
    inner: Mutex<Inner>,
    next_lsn: AtomicU64,
}

impl WalWriter {
    pub fn create(root: &Path) -> Result<Self> {
        let path = wal_path(root);
        let mut f = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        f.write_all(WAL_MAGIC)?;
        f.write_all(&[0u8; WAL_HDR_SIZE - 8])?;
        f.sync_all()?;
        Ok(WalWriter {
            inner: Mutex::new(Inner {
                file: f,
                pos: WAL_HDR_SIZE as u64,
            }),
            next_lsn: AtomicU64::new(1),
        })
    }

    pub fn open(root: &Path, next_lsn: u64) -> Result<Self> {
        let path = wal_path(root);
        let f = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = f.metadata()?.len();
        Ok(WalWriter {
            inner: Mutex::new(Inner {
                file: f,
                pos: len.max(WAL_HDR_SIZE as u64),
            }),
            next_lsn: AtomicU64::new(next_lsn.max(1)),
        })
    }

    fn append(&self, rec_type: u8, flags: u8, page_id: u64, payload: &[u8]) -> Result<u64> {
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        let pos = inner.pos;
        inner.file.seek(SeekFrom::Start(pos))?;
        write_record(&mut inner.file, rec_type, flags, lsn, page_id, payload)?;
        inner.pos = pos + crate::consts::WAL_REC_HDR_SIZE as u64 + payload.len() as u64;
        Ok(lsn)
    }

    fn fsync(&self) -> Result<()> {
        self.inner.lock().unwrap().file.sync_data()?;
        Ok(())
    }

    /// Open a system operation (§5): brackets a group of page diffs
    /// that must be replayed all-or-nothing.
    pub fn start_system_op(&self) -> Result<u64> {
        self.append(WAL_REC_BEGIN, 0, 0, &[])
    }

    /// Close the system operation; fsyncs once so the whole group
    /// becomes durable with a single disk flush (group commit).
    pub fn end_system_op(&self) -> Result<u64> {
        let lsn = self.append(WAL_REC_COMMIT, 0, 0, &[])?;
        self.fsync()?;
        Ok(lsn)
    }

    pub fn append_delta(&self, page_id: u64, flags: u8, delta: &RedoDelta) -> Result<Option<u64>> {
        match encode_delta(delta) {
            None => Ok(None),
            Some((rec_type, payload)) => {
                Ok(Some(self.append(rec_type, flags, page_id, &payload)?))
            }
        }
    }

    pub fn truncate_marker(&self) -> Result<u64> {
        let lsn = self.append(WAL_REC_TRUNCATE, 0, 0, &[])?;
        self.fsync()?;
        Ok(lsn)
    }

    pub fn peek_next_lsn(&self) -> u64 {
        self.next_lsn.load(Ordering::SeqCst)
    }
}
