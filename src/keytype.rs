//! Key-type descriptors and comparators (§3.4, §6.3).
//!
//! A B-tree is opened against one key-type descriptor that knows how to
//! serialize/deserialize and compare keys. Fixed-width integer keys use
//! plain little-endian encoding; multi-column keys ("mid-xkeys") are a
//! sequence of same-stream columns compared lexicographically, which is
//! what makes prefix compression (§3.6) and fence-key truncation (§3.5)
//! well-defined.

use std::cmp::Ordering;

use byteorder::{ByteOrder, LittleEndian};

/// A single logical key value, already serialized to its on-page byte
/// representation. Kept as an owned buffer so callers can pass keys
/// around without caring about the concrete key type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuf(pub Vec<u8>);

impl KeyBuf {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for KeyBuf {
    fn from(v: Vec<u8>) -> Self {
        KeyBuf(v)
    }
}

/// One column in a multi-column ("mid-xkey") key descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int32,
    Int64,
    /// Fixed-length byte column, `len` bytes, compared byte-wise.
    FixedBytes(u16),
    /// Variable-length byte column, length-prefixed (u16 LE) on the wire,
    /// compared byte-wise (so a longer common prefix sorts later, matching
    /// memcmp semantics).
    VarBytes,
}

impl ColumnType {
    /// Encoded wire width, if fixed; `None` for variable-length columns.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            ColumnType::Int32 => Some(4),
            ColumnType::Int64 => Some(8),
            ColumnType::FixedBytes(n) => Some(*n as usize),
            ColumnType::VarBytes => None,
        }
    }
}

/// Descriptor for a (possibly multi-column) key type. Columns are
/// compared in order; the first column that differs decides ordering.
#[derive(Debug, Clone)]
pub struct KeyType {
    pub columns: Vec<ColumnType>,
}

impl KeyType {
    pub fn single(col: ColumnType) -> Self {
        KeyType {
            columns: vec![col],
        }
    }

    pub fn int32() -> Self {
        Self::single(ColumnType::Int32)
    }

    pub fn int64() -> Self {
        Self::single(ColumnType::Int64)
    }

    /// Split a serialized key into its per-column byte slices.
    pub fn split_columns<'a>(&self, key: &'a [u8]) -> Vec<&'a [u8]> {
        let mut out = Vec::with_capacity(self.columns.len());
        let mut off = 0usize;
        for col in &self.columns {
            match col.fixed_width() {
                Some(w) => {
                    out.push(&key[off..off + w]);
                    off += w;
                }
                None => {
                    let len = LittleEndian::read_u16(&key[off..off + 2]) as usize;
                    out.push(&key[off + 2..off + 2 + len]);
                    off += 2 + len;
                }
            }
        }
        out
    }

    /// Lexicographic comparison across columns, per-column using the
    /// column's natural integer or byte ordering.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let cols_a = self.split_columns(a);
        let cols_b = self.split_columns(b);
        for ((col, ca), cb) in self.columns.iter().zip(cols_a.iter()).zip(cols_b.iter()) {
            let ord = match col {
                ColumnType::Int32 => {
                    LittleEndian::read_i32(ca).cmp(&LittleEndian::read_i32(cb))
                }
                ColumnType::Int64 => {
                    LittleEndian::read_i64(ca).cmp(&LittleEndian::read_i64(cb))
                }
                ColumnType::FixedBytes(_) | ColumnType::VarBytes => ca.cmp(cb),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Length, in bytes, of the longest common prefix of two whole-key
    /// byte strings, measured in whole columns (used by §3.6's mid-xkey
    /// prefix compression: a partial column prefix never counts).
    pub fn common_prefix_columns(&self, a: &[u8], b: &[u8]) -> usize {
        let cols_a = self.split_columns(a);
        let cols_b = self.split_columns(b);
        let mut n = 0;
        for (ca, cb) in cols_a.iter().zip(cols_b.iter()) {
            if ca == cb {
                n += 1;
            } else {
                break;
            }
        }
        n
    }

    pub fn encode_i32(v: i32) -> KeyBuf {
        let mut buf = [0u8; 4];
        LittleEndian::write_i32(&mut buf, v);
        KeyBuf(buf.to_vec())
    }

    pub fn encode_i64(v: i64) -> KeyBuf {
        let mut buf = [0u8; 8];
        LittleEndian::write_i64(&mut buf, v);
        KeyBuf(buf.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int32_ordering() {
        let kt = KeyType::int32();
        let a = KeyType::encode_i32(1);
        let b = KeyType::encode_i32(2);
        assert_eq!(kt.compare(a.as_bytes(), b.as_bytes()), Ordering::Less);
        assert_eq!(kt.compare(b.as_bytes(), a.as_bytes()), Ordering::Greater);
        assert_eq!(kt.compare(a.as_bytes(), a.as_bytes()), Ordering::Equal);
    }

    #[test]
    fn multi_column_prefix() {
        let kt = KeyType {
            columns: vec![ColumnType::Int32, ColumnType::Int32],
        };
        let mut a = KeyType::encode_i32(7).0;
        a.extend(KeyType::encode_i32(1).0);
        let mut b = KeyType::encode_i32(7).0;
        b.extend(KeyType::encode_i32(2).0);
        assert_eq!(kt.common_prefix_columns(&a, &b), 1);
        assert_eq!(kt.compare(&a, &b), Ordering::Less);
    }
}
