//! Startup redo pass (§4.10, §5): replays complete BEGIN..COMMIT
//! groups of diff records against their target pages, skipping any
//! record whose page already carries an LSN at or past it (idempotent
//! given the page's stored LSN and the diff).

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{anyhow, Result};
use log::{info, warn};

use crate::consts::{WAL_HDR_SIZE, WAL_MAGIC, WAL_REC_BEGIN, WAL_REC_COMMIT, WAL_REC_TRUNCATE};
use crate::page::checksum::{page_lsn, set_page_lsn};
use crate::pager::core::Pager;
use crate::wal::encode::{apply_delta, decode_delta};
use crate::wal::reader::{read_next, WalRecord};
use crate::wal::wal_path;

/// Replay every complete system operation recorded in the WAL onto
/// `pager`'s pages, then report the highest LSN observed so the
/// caller can resume LSN allocation past it.
pub fn replay_into(pager: &Pager, root: &Path) -> Result<u64> {
    let path = wal_path(root);
    if !path.exists() {
        return Ok(pager.last_lsn());
    }
    let mut f = OpenOptions::new().read(true).write(true).open(&path)?;
    let file_len = f.metadata()?.len();
    if file_len < WAL_HDR_SIZE as u64 {
        return Ok(pager.last_lsn());
    }

    {
        use std::io::{Read, Seek, SeekFrom};
        let mut magic = [0u8; 8];
        f.seek(SeekFrom::Start(0))?;
        f.read_exact(&mut magic)?;
        if &magic != WAL_MAGIC {
            return Err(anyhow!("bad WAL magic in {}", path.display()));
        }
    }

    let mut pos = WAL_HDR_SIZE as u64;
    let mut pending: Vec<WalRecord> = Vec::new();
    let mut max_lsn = pager.last_lsn();
    let mut applied_groups = 0u64;

    loop {
        let next = read_next(&mut f, pos, file_len)?;
        let (rec, next_pos) = match next {
            Some(v) => v,
            None => break,
        };
        pos = next_pos;
        max_lsn = max_lsn.max(rec.lsn);

        match rec.rec_type {
            WAL_REC_BEGIN => {
                pending.clear();
            }
            WAL_REC_COMMIT => {
                apply_group(pager, &pending)?;
                applied_groups += 1;
                pending.clear();
            }
            WAL_REC_TRUNCATE => {
                pending.clear();
            }
            _ => {
                pending.push(rec);
            }
        }
    }
    if !pending.is_empty() {
        warn!(
            "wal replay: discarding {} record(s) from an incomplete trailing group",
            pending.len()
        );
    }
    info!("wal replay: applied {} system operation(s)", applied_groups);
    pager.set_last_lsn(max_lsn);
    Ok(max_lsn)
}

fn apply_group(pager: &Pager, records: &[WalRecord]) -> Result<()> {
    for rec in records {
        let mut page = match pager.read_page(rec.page_id) {
            Ok(p) => p,
            Err(_) => {
                warn!(
                    "wal replay: skipping record for unreadable page {}",
                    rec.page_id
                );
                continue;
            }
        };
        if page_lsn(&page) >= rec.lsn {
            continue;
        }
        let delta = decode_delta(rec.rec_type, &rec.payload);
        let mut body = page.clone();
        apply_delta(&mut body, &delta);
        body.resize(page.len(), 0);
        page = body;
        set_page_lsn(&mut page, rec.lsn);
        pager.write_page_raw(rec.page_id, &mut page)?;
    }
    Ok(())
}
