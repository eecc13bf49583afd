//! Write-ahead log: diff-based redo records (§4.10), bracketed into
//! atomic groups by BEGIN/COMMIT pairs ("system operations", §5/§6.2).
//!
//! Submodules:
//! - `encode` — record header framing + CRC32C + per-shape payload codec.
//! - `writer` — append-only `WalWriter`, one file per index.
//! - `reader` — sequential, CRC-checked record reader.
//! - `replay` — startup redo pass, gated by each page's stored LSN.

pub mod encode;
pub mod reader;
pub mod replay;
pub mod writer;

pub use self::replay::replay_into;
pub use self::writer::WalWriter;

use std::path::{Path, PathBuf};

use crate::consts::WAL_FILE;

pub fn wal_path(root: &Path) -> PathBuf {
    root.join(WAL_FILE)
}
