//! `Pager`: owns the directory of segment files, the meta header, the
//! page cache, and the latch table. All page I/O goes through here
//! (§5, §A.7 "page buffer").

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::config::BtreeConfig;
use crate::consts::{DATA_SEG_EXT, DATA_SEG_PREFIX, SEGMENT_SIZE};
use crate::meta::MetaHeader;
use crate::pager::cache::PageCache;
use crate::pager::latch::LatchTable;

pub struct Pager {
    pub(crate) root: PathBuf,
    pub(crate) meta: Mutex<MetaHeader>,
    pub(crate) data_fsync: bool,
    pub(crate) cache: Mutex<PageCache>,
    pub(crate) latches: LatchTable,
    pub(crate) next_page_id: Mutex<u64>,
}

impl Pager {
    /// Open an existing pager directory, reading and validating its
    /// meta file.
    pub fn open(root: &Path, cfg: &BtreeConfig) -> Result<Self> {
        let meta = MetaHeader::read(root)?;
        let page_size = meta.page_size as usize;
        let next_page_id = meta.next_page_id;
        Ok(Pager {
            root: root.to_path_buf(),
            meta: Mutex::new(meta),
            data_fsync: cfg.data_fsync,
            cache: Mutex::new(PageCache::new(cfg.page_cache_pages, page_size)),
            latches: LatchTable::new(),
            next_page_id: Mutex::new(next_page_id),
        })
    }

    /// Initialize a brand-new pager directory: write the meta file and
    /// create the first (empty) data segment.
    pub fn create(root: &Path, page_size: u32, cfg: &BtreeConfig) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("create dir {}", root.display()))?;
        let meta = MetaHeader::init(page_size)?;
        meta.write_new(root)?;
        let pager = Pager {
            root: root.to_path_buf(),
            meta: Mutex::new(meta),
            data_fsync: cfg.data_fsync,
            cache: Mutex::new(PageCache::new(cfg.page_cache_pages, page_size as usize)),
            latches: LatchTable::new(),
            next_page_id: Mutex::new(0),
        };
        pager.ensure_segment(0)?;
        Ok(pager)
    }

    pub fn page_size(&self) -> usize {
        self.meta.lock().unwrap().page_size as usize
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn last_lsn(&self) -> u64 {
        self.meta.lock().unwrap().last_lsn
    }

    pub fn set_last_lsn(&self, lsn: u64) {
        let mut m = self.meta.lock().unwrap();
        if lsn > m.last_lsn {
            m.last_lsn = lsn;
        }
    }

    pub(crate) fn pages_per_seg(&self) -> u64 {
        (SEGMENT_SIZE / self.page_size() as u64).max(1)
    }

    /// Locate a page's segment index and byte offset within it.
    pub(crate) fn locate(&self, page_id: u64) -> (u64, u64) {
        let per_seg = self.pages_per_seg();
        let seg = page_id / per_seg;
        let off = (page_id % per_seg) * self.page_size() as u64;
        (seg, off)
    }

    pub(crate) fn seg_path(&self, seg_idx: u64) -> PathBuf {
        self.root
            .join(format!("{}{:06}.{}", DATA_SEG_PREFIX, seg_idx, DATA_SEG_EXT))
    }

    pub(crate) fn open_seg_rw(&self, seg_idx: u64) -> Result<File> {
        let path = self.seg_path(seg_idx);
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("open segment {}", path.display()))
    }

    /// Create an empty segment file of `SEGMENT_SIZE` bytes if it does
    /// not already exist.
    pub(crate) fn ensure_segment(&self, seg_idx: u64) -> Result<()> {
        let path = self.seg_path(seg_idx);
        if path.exists() {
            return Ok(());
        }
        let f = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("create segment {}", path.display()))?;
        f.set_len(SEGMENT_SIZE)?;
        Ok(())
    }

    pub fn flush_meta(&self) -> Result<()> {
        let meta = self.meta.lock().unwrap();
        meta.write_overwrite(&self.root)
    }

    pub fn clean_shutdown(&self) -> bool {
        self.meta.lock().unwrap().clean_shutdown
    }

    /// Mark the directory dirty for the duration of this open handle;
    /// cleared again by `mark_clean_shutdown` on an orderly close. A
    /// meta file still flagged dirty on the next `open` means the
    /// previous process crashed mid-session and WAL replay is needed.
    pub fn mark_dirty(&self) -> Result<()> {
        {
            let mut m = self.meta.lock().unwrap();
            m.clean_shutdown = false;
        }
        self.flush_meta()
    }

    pub fn mark_clean_shutdown(&self) -> Result<()> {
        {
            let mut m = self.meta.lock().unwrap();
            m.clean_shutdown = true;
        }
        self.flush_meta()
    }
}
