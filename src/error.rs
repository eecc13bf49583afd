//! Typed error taxonomy for the B-tree core.
//!
//! `BtreeError` mirrors the error taxonomy exactly: most variants are
//! surfaced to the caller, a few are consumed internally by the
//! traversal framework (`PromoteFailed`, and the `TraversalSignal`
//! restart/stop machinery in `btree::traversal`, which are not errors
//! at all and never reach here).

use std::fmt;

use crate::oid::Oid;

#[derive(Debug, thiserror::Error)]
pub enum BtreeError {
    /// Insertion would create a second visible object for the same key.
    #[error("unique constraint violated for key{}", with_key_suffix(.key_repr))]
    UniqueViolation { key_repr: Option<String> },

    /// Expected by some deletion flows when the target key is absent.
    #[error("key not found")]
    KeyNotFound,

    /// Expected by some deletion flows when the target object is absent.
    #[error("oid not found: {0:?}")]
    OidNotFound(Oid),

    /// Internal only: shared->exclusive latch promotion failed. Never
    /// escapes the traversal framework; surfaced here only so unit
    /// tests of `lockmgr`/`pager` latch plumbing can assert on it.
    #[error("latch promotion failed")]
    PromoteFailed,

    /// The page was concurrently deallocated and reused, or a latch
    /// could not be acquired in the expected mode.
    #[error("latch conflict or invalid page")]
    LatchConflict,

    #[error("page invalid (deallocated/reused): {0}")]
    PageInvalid(u64),

    /// Propagated; may represent a deadlock-victim abort.
    #[error("lock not granted")]
    LockNotGranted,

    #[error("disk error: {0}")]
    Disk(#[from] std::io::Error),

    #[error("out of virtual memory / page space exhausted")]
    OutOfVirtualMemory,

    /// Scans return immediately; in-flight modifications cannot be
    /// cancelled once a page has been latched for write.
    #[error("operation interrupted")]
    Interrupted,

    /// Catch-all for malformed on-page layout, unknown key-type
    /// codepoints, and similar corruption detected in debug checks.
    #[error("corrupt layout: {0}")]
    CorruptLayout(String),
}

fn with_key_suffix(key_repr: &Option<String>) -> String {
    match key_repr {
        Some(k) => format!(" {}", k),
        None => String::new(),
    }
}

impl BtreeError {
    pub fn unique_violation_with_key(key_repr: impl Into<String>) -> Self {
        BtreeError::UniqueViolation {
            key_repr: Some(key_repr.into()),
        }
    }

    pub fn unique_violation() -> Self {
        BtreeError::UniqueViolation { key_repr: None }
    }
}

/// Internal traversal control-flow signal, per the redesign flag that
/// replaces boolean out-params with a typed enum. Never implements
/// `std::error::Error`: it is not an error, it is a step result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalSignal {
    Continue,
    Stop,
    Restart(RestartReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    PromoteFailed,
    LsaMismatch,
    PageInvalid,
    ForceMergeNeeded,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartReason::PromoteFailed => write!(f, "promote-failed"),
            RestartReason::LsaMismatch => write!(f, "lsa-mismatch"),
            RestartReason::PageInvalid => write!(f, "page-invalid"),
            RestartReason::ForceMergeNeeded => write!(f, "force-merge-needed"),
        }
    }
}
