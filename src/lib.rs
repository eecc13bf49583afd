//! Disk-based, transactional, MVCC-capable B+-tree index manager core
//! (§1). The on-page record layout, traversal/SMO framework, operation
//! flows, overflow-OID chain, MVCC snapshot evaluation and WAL
//! log-record shapes are implemented module-by-module below; see
//! `btree` for the public `BtreeIndex` entry point.

pub mod btree;
pub mod config;
pub mod consts;
pub mod error;
pub mod free;
pub mod keytype;
pub mod lock;
pub mod lockmgr;
pub mod meta;
pub mod mvcc;
pub mod oid;
pub mod page;
pub mod pager;
pub mod wal;

pub use btree::{BtreeIndex, Purpose};
pub use config::{BtreeConfig, BtreeIndexBuilder};
pub use error::BtreeError;
pub use keytype::{ColumnType, KeyType};
pub use mvcc::{MvccId, SimpleSnapshot, Snapshot, Visibility};
pub use oid::{ClassOid, Oid};
