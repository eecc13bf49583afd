//! `<root>/meta`: the index directory's fixed-size header file.
//!
//! Layout (LE), tmp+rename on every write for crash-atomicity:
//!
//! ```text
//! magic8 = "BTM_META"
//! u32    version       (== META_VERSION)
//! u32    page_size
//! u64    next_page_id
//! u64    last_lsn
//! u8     clean_shutdown (1 = clean, 0 = unclean)
//! ```

use anyhow::{anyhow, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, OpenOptions};
#[cfg(unix)]
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::consts::{
    MAX_PAGE_SIZE, META_FILE, META_MAGIC, META_VERSION, MIN_PAGE_SIZE,
};

#[derive(Debug, Clone)]
pub struct MetaHeader {
    pub version: u32,
    pub page_size: u32,
    pub next_page_id: u64,
    pub last_lsn: u64,
    pub clean_shutdown: bool,
}

impl MetaHeader {
    pub fn init(page_size: u32) -> Result<Self> {
        validate_page_size(page_size)?;
        Ok(MetaHeader {
            version: META_VERSION,
            page_size,
            next_page_id: 0,
            last_lsn: 0,
            clean_shutdown: true,
        })
    }

    pub fn read(root: &Path) -> Result<Self> {
        let path = meta_path(root);
        let mut f = OpenOptions::new()
            .read(true)
            .open(&path)
            .with_context(|| format!("open meta {}", path.display()))?;

        let mut magic = [0u8; 8];
        f.read_exact(&mut magic)?;
        if &magic != META_MAGIC {
            return Err(anyhow!("bad meta magic at {}", path.display()));
        }
        let version = f.read_u32::<LittleEndian>()?;
        if version != META_VERSION {
            return Err(anyhow!(
                "unsupported meta version {} at {} (expected {})",
                version,
                path.display(),
                META_VERSION
            ));
        }
        let page_size = f.read_u32::<LittleEndian>()?;
        let next_page_id = f.read_u64::<LittleEndian>()?;
        let last_lsn = f.read_u64::<LittleEndian>()?;
        let clean_shutdown = f.read_u8()? != 0;

        Ok(MetaHeader {
            version,
            page_size,
            next_page_id,
            last_lsn,
            clean_shutdown,
        })
    }

    pub fn write_new(&self, root: &Path) -> Result<()> {
        let path = meta_path(root);
        if path.exists() {
            return Err(anyhow!("meta already exists at {}", path.display()));
        }
        self.write_via_tmp(root, &path)
    }

    pub fn write_overwrite(&self, root: &Path) -> Result<()> {
        let path = meta_path(root);
        self.write_via_tmp(root, &path)
    }

    fn write_via_tmp(&self, root: &Path, path: &Path) -> Result<()> {
        validate_page_size(self.page_size)?;
        let tmp = root.join(format!("{}.tmp", META_FILE));
        let _ = fs::remove_file(&tmp);

        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .with_context(|| format!("open meta tmp {}", tmp.display()))?;

        f.seek(SeekFrom::Start(0))?;
        f.write_all(META_MAGIC)?;
        f.write_u32::<LittleEndian>(self.version)?;
        f.write_u32::<LittleEndian>(self.page_size)?;
        f.write_u64::<LittleEndian>(self.next_page_id)?;
        f.write_u64::<LittleEndian>(self.last_lsn)?;
        f.write_u8(if self.clean_shutdown { 1 } else { 0 })?;
        f.sync_all()?;

        fs::rename(&tmp, path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        let _ = fsync_dir(path);
        Ok(())
    }
}

fn meta_path(root: &Path) -> PathBuf {
    root.join(META_FILE)
}

#[cfg(unix)]
fn fsync_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}
#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

pub fn validate_page_size(page_size: u32) -> Result<()> {
    if page_size < MIN_PAGE_SIZE || page_size > MAX_PAGE_SIZE || (page_size & (page_size - 1)) != 0
    {
        return Err(anyhow!(
            "page_size must be a power of two in [{} .. {}], got {}",
            MIN_PAGE_SIZE,
            MAX_PAGE_SIZE,
            page_size
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_roundtrip() {
        let root = std::env::temp_dir().join(format!(
            "btreeidx-meta-{}-{}",
            std::process::id(),
            nanos_for_test()
        ));
        fs::create_dir_all(&root).unwrap();

        let mut m0 = MetaHeader::init(16384).unwrap();
        m0.next_page_id = 123;
        m0.last_lsn = 456;
        m0.clean_shutdown = false;
        m0.write_new(&root).unwrap();

        let m1 = MetaHeader::read(&root).unwrap();
        assert_eq!(m1.page_size, 16384);
        assert_eq!(m1.next_page_id, 123);
        assert_eq!(m1.last_lsn, 456);
        assert!(!m1.clean_shutdown);

        let mut m2 = m1.clone();
        m2.last_lsn = 999;
        m2.clean_shutdown = true;
        m2.write_overwrite(&root).unwrap();
        let m3 = MetaHeader::read(&root).unwrap();
        assert_eq!(m3.last_lsn, 999);
        assert!(m3.clean_shutdown);

        fs::remove_dir_all(&root).unwrap();
    }

    fn nanos_for_test() -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    }
}
