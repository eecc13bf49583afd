//! Pager: fixed-size page storage over one or more append-only
//! segment files, a bounded in-memory page cache, a per-page latch
//! table, and WAL-backed durability (§5, §A.7).
//!
//! Mirrors the teacher's segmented layout (`data-NNNNNN.btseg`, each
//! `SEGMENT_SIZE` bytes) but drops its transparent-encryption and
//! hash-directory concerns entirely: this pager only ever stores
//! B+-tree leaf/non-leaf/overflow pages.

pub mod alloc;
pub mod cache;
pub mod commit;
pub mod core;
pub mod io;
pub mod latch;
pub mod replay;

pub use self::core::Pager;
pub use self::latch::LatchMode;
