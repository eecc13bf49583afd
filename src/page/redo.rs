//! Typed redo-delta sink (§4.10, §9 redesign flag: "record mutation
//! functions return a new length and emit a partial update log delta
//! through a typed redo-stream sink" instead of an untyped byte diff).
//!
//! Every record-codec mutation in `page::leaf`/`page::nonleaf`/
//! `page::ovf` returns one of these alongside the new record bytes; the
//! WAL layer (`wal::encode`) serializes it into the matching
//! `WAL_REC_RV_*` wire shape.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialUpdate {
    pub offset: usize,
    pub old_len: usize,
    pub new_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedoDelta {
    /// A byte range was physically removed from the record/page.
    Delete { offset: usize, len: usize },
    /// Bytes were newly inserted at `offset`.
    Insert { offset: usize, bytes: Vec<u8> },
    /// An existing byte range was replaced wholesale.
    UpdateAll {
        offset: usize,
        old_len: usize,
        new_bytes: Vec<u8>,
    },
    /// One or more disjoint sub-ranges were replaced in place.
    UpdatePartial { pieces: Vec<PartialUpdate> },
    /// This mutation produced no durable change (e.g. a no-op vacuum).
    None,
}

impl RedoDelta {
    pub fn update_all(offset: usize, old_len: usize, new_bytes: Vec<u8>) -> Self {
        RedoDelta::UpdateAll {
            offset,
            old_len,
            new_bytes,
        }
    }

    pub fn single_partial(offset: usize, old_len: usize, new_bytes: Vec<u8>) -> Self {
        RedoDelta::UpdatePartial {
            pieces: vec![PartialUpdate {
                offset,
                old_len,
                new_bytes,
            }],
        }
    }
}
