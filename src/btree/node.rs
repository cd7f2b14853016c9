//! # Node Codec
//!
//! The [`Node`] value type and its on-disk encoding. A node is a plain
//! value: the tree's parent/child/sibling "graph" exists only as offsets on
//! disk, and whoever holds a `Node` owns it transiently until it is flushed
//! back through the storage layer.
//!
//! The fixed 34-byte head of the payload (`is_active` through `parent_off`)
//! is a zerocopy wire struct; the variable tail (children, keys, values) is
//! parsed with a little-endian cursor. Decoding validates every count
//! against the remaining buffer before materializing anything, so a corrupt
//! count surfaces as [`TreeError::InvalidFormat`] instead of an allocation
//! blow-up.
//!
//! An empty payload (`data_len == 0`) decodes to the default inactive node.
//! Pool extension hands out tail offsets without writing them, so the scan
//! phase routinely reads blocks that are still all zeros; classifying them
//! as inactive is what lets the allocator reclaim them.

use eyre::Result;
use zerocopy::little_endian::I64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::TreeError;
use crate::storage::{BLOCK_SIZE, DATA_LEN_SIZE, INVALID_OFFSET};

pub(crate) const NODE_HEADER_SIZE: usize = std::mem::size_of::<NodeHeader>();

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct NodeHeader {
    is_active: u8,
    is_leaf: u8,
    self_off: I64,
    next_off: I64,
    prev_off: I64,
    parent_off: I64,
}

const _: () = assert!(std::mem::size_of::<NodeHeader>() == 34);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) is_active: bool,
    pub(crate) is_leaf: bool,
    pub(crate) self_off: i64,
    pub(crate) next_off: i64,
    pub(crate) prev_off: i64,
    pub(crate) parent_off: i64,
    pub(crate) children: Vec<i64>,
    pub(crate) keys: Vec<i64>,
    pub(crate) values: Vec<String>,
}

impl Node {
    /// A freshly allocated, active node with no links yet. Callers mark it
    /// as a leaf and populate keys before flushing.
    pub(crate) fn new(self_off: i64) -> Self {
        Self {
            is_active: true,
            is_leaf: false,
            self_off,
            next_off: INVALID_OFFSET,
            prev_off: INVALID_OFFSET,
            parent_off: INVALID_OFFSET,
            children: Vec::new(),
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    fn inactive() -> Self {
        Self {
            is_active: false,
            is_leaf: false,
            self_off: INVALID_OFFSET,
            next_off: INVALID_OFFSET,
            prev_off: INVALID_OFFSET,
            parent_off: INVALID_OFFSET,
            children: Vec::new(),
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Serializes the node to its tight payload (without the `data_len`
    /// prefix). Rejects nodes whose prefixed encoding would not fit in one
    /// block, so an oversized node can never reach the file.
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        let header = NodeHeader {
            is_active: self.is_active as u8,
            is_leaf: self.is_leaf as u8,
            self_off: I64::new(self.self_off),
            next_off: I64::new(self.next_off),
            prev_off: I64::new(self.prev_off),
            parent_off: I64::new(self.parent_off),
        };

        let value_bytes: usize = self.values.iter().map(|v| v.len()).sum();
        let cap = NODE_HEADER_SIZE
            + 8 * (3 + self.children.len() + self.keys.len() + self.values.len())
            + value_bytes;
        let mut buf = Vec::with_capacity(cap);

        buf.extend_from_slice(header.as_bytes());
        buf.extend_from_slice(&(self.children.len() as i64).to_le_bytes());
        for &child in &self.children {
            buf.extend_from_slice(&child.to_le_bytes());
        }
        buf.extend_from_slice(&(self.keys.len() as i64).to_le_bytes());
        for &key in &self.keys {
            buf.extend_from_slice(&key.to_le_bytes());
        }
        buf.extend_from_slice(&(self.values.len() as i64).to_le_bytes());
        for value in &self.values {
            buf.extend_from_slice(&(value.len() as i64).to_le_bytes());
            buf.extend_from_slice(value.as_bytes());
        }

        if DATA_LEN_SIZE + buf.len() > BLOCK_SIZE {
            return Err(TreeError::InvalidFormat(format!(
                "node at offset {} encodes to {} bytes, exceeding the {} byte block",
                self.self_off,
                DATA_LEN_SIZE + buf.len(),
                BLOCK_SIZE
            ))
            .into());
        }
        Ok(buf)
    }

    /// Parses a node from a payload previously produced by [`Node::encode`].
    /// An empty payload is a never-written block and decodes as inactive.
    pub(crate) fn decode(payload: &[u8]) -> Result<Self> {
        if payload.is_empty() {
            return Ok(Self::inactive());
        }
        if payload.len() < NODE_HEADER_SIZE {
            return Err(TreeError::InvalidFormat(format!(
                "payload of {} bytes is shorter than the {} byte node header",
                payload.len(),
                NODE_HEADER_SIZE
            ))
            .into());
        }

        let header = NodeHeader::ref_from_bytes(&payload[..NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse node header: {:?}", e))?;

        let mut node = Self {
            is_active: header.is_active != 0,
            is_leaf: header.is_leaf != 0,
            self_off: header.self_off.get(),
            next_off: header.next_off.get(),
            prev_off: header.prev_off.get(),
            parent_off: header.parent_off.get(),
            children: Vec::new(),
            keys: Vec::new(),
            values: Vec::new(),
        };

        let mut cursor = Cursor {
            buf: payload,
            pos: NODE_HEADER_SIZE,
        };

        let child_count = cursor.read_count(8, "children")?;
        node.children.reserve(child_count);
        for _ in 0..child_count {
            node.children.push(cursor.read_i64()?);
        }

        let key_count = cursor.read_count(8, "keys")?;
        node.keys.reserve(key_count);
        for _ in 0..key_count {
            node.keys.push(cursor.read_i64()?);
        }

        let value_count = cursor.read_count(8, "values")?;
        node.values.reserve(value_count);
        for _ in 0..value_count {
            let len = cursor.read_count(1, "value bytes")?;
            let bytes = cursor.read_bytes(len)?;
            let value = std::str::from_utf8(bytes).map_err(|_| {
                TreeError::InvalidFormat("value is not valid UTF-8".to_string())
            })?;
            node.values.push(value.to_string());
        }

        Ok(node)
    }

    /// Inserts `key`/`value` into this leaf at the sorted position and
    /// returns the insertion index. Fails with [`TreeError::DuplicateKey`]
    /// before any mutation when the key is already present.
    pub(crate) fn insert_key_value(&mut self, key: i64, value: &str) -> Result<usize> {
        let idx = self.keys.partition_point(|&k| k < key);
        if idx < self.keys.len() && self.keys[idx] == key {
            return Err(TreeError::DuplicateKey(key).into());
        }
        self.keys.insert(idx, key);
        self.values.insert(idx, value.to_string());
        Ok(idx)
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_i64(&mut self) -> Result<i64> {
        let bytes = self.read_bytes(8)?;
        Ok(i64::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Reads a count field and checks that `count * elem_size` elements can
    /// still fit in the remaining buffer, so a corrupt count is rejected
    /// before any allocation sized by it.
    fn read_count(&mut self, elem_size: usize, what: &str) -> Result<usize> {
        let raw = self.read_i64()?;
        if raw < 0 {
            return Err(
                TreeError::InvalidFormat(format!("negative {} count {}", what, raw)).into(),
            );
        }
        let count = raw as usize;
        if count
            .checked_mul(elem_size)
            .map_or(true, |n| n > self.remaining())
        {
            return Err(TreeError::InvalidFormat(format!(
                "{} count {} overruns the {} remaining payload bytes",
                what,
                count,
                self.remaining()
            ))
            .into());
        }
        Ok(count)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.buf.len() {
            return Err(TreeError::InvalidFormat(format!(
                "buffer underrun: need {} bytes at position {}, payload is {} bytes",
                len,
                self.pos,
                self.buf.len()
            ))
            .into());
        }
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_leaf() -> Node {
        let mut node = Node::new(4096);
        node.is_leaf = true;
        node.prev_off = 0;
        node.parent_off = 8192;
        node.keys = vec![7, 9];
        node.values = vec!["a".to_string(), "bc".to_string()];
        node
    }

    #[test]
    fn node_header_is_34_bytes() {
        assert_eq!(NODE_HEADER_SIZE, 34);
    }

    #[test]
    fn encode_decode_round_trips_leaf() {
        let node = sample_leaf();

        let decoded = Node::decode(&node.encode().unwrap()).unwrap();

        assert_eq!(decoded, node);
    }

    #[test]
    fn encode_decode_round_trips_internal_node() {
        let mut node = Node::new(0);
        node.children = vec![4096, 8192, 12288];
        node.keys = vec![10, 20, 30];

        let decoded = Node::decode(&node.encode().unwrap()).unwrap();

        assert_eq!(decoded, node);
        assert!(decoded.values.is_empty());
    }

    #[test]
    fn encode_decode_round_trips_unicode_and_empty_values() {
        let mut node = Node::new(0);
        node.is_leaf = true;
        node.keys = vec![-5, 0, 3];
        node.values = vec!["".to_string(), "héllo".to_string(), "日本語".to_string()];

        let decoded = Node::decode(&node.encode().unwrap()).unwrap();

        assert_eq!(decoded, node);
    }

    #[test]
    fn encode_layout_is_bit_exact() {
        let payload = sample_leaf().encode().unwrap();

        assert_eq!(payload[0], 1);
        assert_eq!(payload[1], 1);
        assert_eq!(&payload[2..10], &4096i64.to_le_bytes());
        assert_eq!(&payload[10..18], &INVALID_OFFSET.to_le_bytes());
        assert_eq!(&payload[18..26], &0i64.to_le_bytes());
        assert_eq!(&payload[26..34], &8192i64.to_le_bytes());
        assert_eq!(&payload[34..42], &0i64.to_le_bytes());
        assert_eq!(&payload[42..50], &2i64.to_le_bytes());
        assert_eq!(&payload[50..58], &7i64.to_le_bytes());
        assert_eq!(&payload[58..66], &9i64.to_le_bytes());
        assert_eq!(&payload[66..74], &2i64.to_le_bytes());
        assert_eq!(&payload[74..82], &1i64.to_le_bytes());
        assert_eq!(&payload[82..83], b"a");
        assert_eq!(&payload[83..91], &2i64.to_le_bytes());
        assert_eq!(&payload[91..93], b"bc");
        assert_eq!(payload.len(), 93);
    }

    #[test]
    fn decode_empty_payload_is_inactive() {
        let node = Node::decode(&[]).unwrap();

        assert!(!node.is_active);
        assert_eq!(node.self_off, INVALID_OFFSET);
        assert_eq!(node.parent_off, INVALID_OFFSET);
    }

    #[test]
    fn decode_truncated_header_fails() {
        let err = Node::decode(&[1, 1, 0]).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TreeError>(),
            Some(TreeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn decode_negative_count_fails() {
        let mut payload = sample_leaf().encode().unwrap();
        payload[34..42].copy_from_slice(&(-1i64).to_le_bytes());

        let err = Node::decode(&payload).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TreeError>(),
            Some(TreeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn decode_overrunning_count_fails() {
        let mut payload = sample_leaf().encode().unwrap();
        payload[42..50].copy_from_slice(&i64::MAX.to_le_bytes());

        let err = Node::decode(&payload).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TreeError>(),
            Some(TreeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn decode_invalid_utf8_value_fails() {
        let mut node = Node::new(0);
        node.is_leaf = true;
        node.keys = vec![1];
        node.values = vec!["ab".to_string()];
        let mut payload = node.encode().unwrap();
        let len = payload.len();
        payload[len - 2] = 0xFF;
        payload[len - 1] = 0xFE;

        let err = Node::decode(&payload).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TreeError>(),
            Some(TreeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn encode_rejects_node_larger_than_block() {
        let mut node = Node::new(0);
        node.is_leaf = true;
        node.keys = vec![1];
        node.values = vec!["x".repeat(BLOCK_SIZE)];

        let err = node.encode().unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TreeError>(),
            Some(TreeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn insert_key_value_keeps_keys_sorted() {
        let mut node = Node::new(0);
        node.is_leaf = true;

        assert_eq!(node.insert_key_value(5, "e").unwrap(), 0);
        assert_eq!(node.insert_key_value(1, "a").unwrap(), 0);
        assert_eq!(node.insert_key_value(3, "c").unwrap(), 1);
        assert_eq!(node.insert_key_value(9, "i").unwrap(), 3);

        assert_eq!(node.keys, vec![1, 3, 5, 9]);
        assert_eq!(node.values, vec!["a", "c", "e", "i"]);
    }

    #[test]
    fn insert_key_value_rejects_duplicate_without_mutation() {
        let mut node = Node::new(0);
        node.is_leaf = true;
        node.insert_key_value(1, "a").unwrap();
        node.insert_key_value(2, "b").unwrap();
        let before = node.clone();

        let err = node.insert_key_value(2, "x").unwrap_err();

        assert_eq!(
            err.downcast_ref::<TreeError>(),
            Some(&TreeError::DuplicateKey(2))
        );
        assert_eq!(node, before);
    }
}
