//! Fence keys and mid-xkey prefix compression (§3.5, §3.6).
//!
//! A leaf may carry a lower fence at slot 1 and an upper fence at the
//! last slot, each a full copy of an adjacent key. When both are
//! present, the longest column-aligned common prefix between them is
//! stripped from every non-fence key in the leaf; reads reconstruct the
//! full key by concatenating the lower fence's prefix with the stored
//! suffix.

use crate::keytype::KeyType;
use crate::page::leaf::LeafRecord;

/// Number of whole leading columns shared by `lower` and `upper`, or 0
/// if either fence is absent — computed once per split/merge/compact,
/// per §3.6.
pub fn common_prefix_count(key_type: &KeyType, lower_fence: Option<&[u8]>, upper_fence: Option<&[u8]>) -> usize {
    match (lower_fence, upper_fence) {
        (Some(l), Some(u)) => key_type.common_prefix_columns(l, u),
        _ => 0,
    }
}

/// Byte length of the first `n` columns of `key`, per the key-type
/// descriptor, used to slice out the compressible prefix.
fn prefix_byte_len(key_type: &KeyType, key: &[u8], n_columns: usize) -> usize {
    if n_columns == 0 {
        return 0;
    }
    let cols = key_type.split_columns(key);
    let mut len = 0usize;
    let mut consumed = 0usize;
    let mut off = 0usize;
    for col in &key_type.columns {
        if consumed >= n_columns {
            break;
        }
        let w = match col.fixed_width() {
            Some(w) => w,
            None => 2 + cols[consumed].len(),
        };
        off += w;
        len = off;
        consumed += 1;
    }
    len
}

/// Strip the leaf's common prefix from a full key, yielding the bytes
/// actually stored on-page for a non-fence record.
pub fn strip_prefix(key_type: &KeyType, full_key: &[u8], common_prefix_columns: usize) -> Vec<u8> {
    let plen = prefix_byte_len(key_type, full_key, common_prefix_columns);
    full_key[plen..].to_vec()
}

/// Reconstruct a full key from a leaf's lower fence and a stored,
/// prefix-stripped suffix.
pub fn reconstruct_key(key_type: &KeyType, lower_fence: &[u8], stored_suffix: &[u8], common_prefix_columns: usize) -> Vec<u8> {
    let plen = prefix_byte_len(key_type, lower_fence, common_prefix_columns);
    let mut out = Vec::with_capacity(plen + stored_suffix.len());
    out.extend_from_slice(&lower_fence[..plen]);
    out.extend_from_slice(stored_suffix);
    out
}

/// Recompute prefix compression across an entire leaf's non-fence
/// records (used after split/merge/compact per §3.6), returning the new
/// common-prefix-count and the re-stripped records.
pub fn recompress_leaf(
    key_type: &KeyType,
    lower_fence: Option<&[u8]>,
    upper_fence: Option<&[u8]>,
    full_keys: &[Vec<u8>],
) -> (usize, Vec<Vec<u8>>) {
    let n = common_prefix_count(key_type, lower_fence, upper_fence);
    let lower = lower_fence.unwrap_or(&[]);
    let stripped = full_keys
        .iter()
        .map(|k| {
            if n == 0 {
                k.clone()
            } else {
                strip_prefix(key_type, k, n.min(key_type.common_prefix_columns(lower, k)))
            }
        })
        .collect();
    (n, stripped)
}

pub fn is_fence(record: &LeafRecord) -> bool {
    record.is_fence
}

/// The lower/upper fence keys currently carried by a leaf's record list,
/// by convention the lower fence at index 0 and the upper fence at the
/// last index (§3.5).
pub fn fence_keys(records: &[LeafRecord]) -> (Option<&[u8]>, Option<&[u8]>) {
    if records.len() < 2 {
        let lower = records.first().filter(|r| r.is_fence).map(|r| r.key.as_slice());
        return (lower, None);
    }
    let lower = records.first().filter(|r| r.is_fence).map(|r| r.key.as_slice());
    let upper = records.last().filter(|r| r.is_fence).map(|r| r.key.as_slice());
    (lower, upper)
}

/// Common-prefix-count for a leaf given its current record list (§3.6),
/// 0 if the leaf carries fewer than two fences.
pub fn leaf_common_prefix(key_type: &KeyType, records: &[LeafRecord]) -> usize {
    let (lower, upper) = fence_keys(records);
    common_prefix_count(key_type, lower, upper)
}

/// Non-fence record bounds within a leaf's record list: `[start, end)`
/// skips a leading lower fence and/or a trailing upper fence.
pub fn non_fence_bounds(records: &[LeafRecord]) -> (usize, usize) {
    let (lower, upper) = fence_keys(records);
    let start = if lower.is_some() { 1 } else { 0 };
    let end = records.len() - if upper.is_some() { 1 } else { 0 };
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keytype::{ColumnType, KeyType};

    fn multi_col_key(a: i32, b: i32) -> Vec<u8> {
        let mut v = KeyType::encode_i32(a).0;
        v.extend(KeyType::encode_i32(b).0);
        v
    }

    #[test]
    fn common_prefix_and_strip_roundtrip() {
        let kt = KeyType {
            columns: vec![ColumnType::Int32, ColumnType::Int32],
        };
        let lower = multi_col_key(7, 0);
        let upper = multi_col_key(7, 999);
        let n = common_prefix_count(&kt, Some(&lower), Some(&upper));
        assert_eq!(n, 1);

        let full = multi_col_key(7, 42);
        let stripped = strip_prefix(&kt, &full, n);
        assert_eq!(stripped, KeyType::encode_i32(42).0);

        let rebuilt = reconstruct_key(&kt, &lower, &stripped, n);
        assert_eq!(rebuilt, full);
    }

    #[test]
    fn no_fences_means_no_compression() {
        let kt = KeyType::int32();
        let n = common_prefix_count(&kt, None, None);
        assert_eq!(n, 0);
    }
}
