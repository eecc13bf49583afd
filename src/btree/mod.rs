//! The B+-tree core (§2-§6): on-page codecs live under `crate::page`,
//! everything that drives a traversal, split/merge, or an operation
//! flow over those codecs lives here.

pub mod delete;
pub mod index;
pub mod insert;
pub mod merge;
pub mod node_io;
pub mod overflow;
pub mod scan;
pub mod split;
pub mod stats;
pub mod traversal;
pub mod types;

pub use index::BtreeIndex;
pub use scan::Direction;
pub use types::Purpose;
