//! # B+ Tree Engine
//!
//! This module implements BirchDB's on-disk B+ tree: the node codec, the
//! insert/split/promote engine, and open-time root recovery.
//!
//! ## Node Wire Format
//!
//! Every node serializes to a length-prefixed payload stored at its block
//! offset. All integers are 64-bit little-endian signed; both flags are
//! exactly one byte:
//!
//! ```text
//! offset+0:  data_len            i64   bytes of everything after the prefix
//! offset+8:  is_active           u8    0 marks a free/garbage block
//!            is_leaf             u8
//!            self_off            i64   the block's own offset
//!            next_off            i64   right sibling, INVALID_OFFSET = none
//!            prev_off            i64   left sibling
//!            parent_off          i64   INVALID_OFFSET iff root
//!            child_count         i64
//!            child_off × count   i64   internal nodes only
//!            key_count           i64
//!            key × count         i64   strictly ascending
//!            value_count         i64   zero on internal nodes
//!            per value:          i64 str_len + raw UTF-8 bytes
//! ```
//!
//! ## Parent Keys Are Subtree Maxima
//!
//! For an internal node with children `C0..Ck`, `keys[i]` is the largest
//! key in the subtree rooted at `C_i`, not a separator. Two consequences
//! shape the engine:
//!
//! - descent must fall back to the rightmost child when the probe key
//!   exceeds every stored maximum (the key will become a new maximum);
//! - inserting a new maximum into a leaf walks the ancestor chain and
//!   overwrites each stale maximum until the updated slot is no longer the
//!   ancestor's last slot.
//!
//! ## Splits
//!
//! A node may hold at most [`ORDER`] keys. An insert that pushes a node to
//! `ORDER + 1` keys splits it at `(ORDER + 1) / 2`: the right sibling takes
//! the upper entries, the sibling chain is rewired through the old right
//! neighbor, and the split is reported to the parent, recursively. When the
//! root itself splits, a fresh internal root is allocated and adopts the two
//! halves.
//!
//! ## Recovery
//!
//! The file carries no superblock. `recovery` scans block offsets from zero
//! for the first active node and follows `parent_off` links to the top;
//! every node stores its own offset and parent, so the root is reachable
//! from any live block.

mod node;
mod recovery;
mod tree;

pub use node::Node;
pub use tree::Tree;

/// Maximum number of keys a node may hold before it must split. A constant
/// of the on-disk format, not per-tree configuration.
pub const ORDER: usize = 4;
