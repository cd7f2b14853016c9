//! # Storage Module
//!
//! The foundational storage layer for BirchDB: a single file treated as a
//! sequence of fixed-size blocks, plus an in-memory pool of free block
//! offsets that absorbs allocations.
//!
//! ## Block-Oriented Single File
//!
//! The database is one file with no header, footer, or checksums. Every
//! block is exactly [`BLOCK_SIZE`] bytes and holds at most one node:
//!
//! ```text
//! +----------------------------+
//! | data_len (8 bytes, i64 LE) |  length of the payload that follows
//! +----------------------------+
//! | node payload (data_len)    |  see btree::node for the field layout
//! +----------------------------+
//! | zero padding               |  up to the 4096-byte block boundary
//! +----------------------------+
//! ```
//!
//! The length prefix tells the decoder where the node ends without scanning
//! padding, since a block is typically larger than the node it holds.
//!
//! ## Positioned I/O
//!
//! [`BlockFile`] performs all access as positioned reads and writes
//! (seek + exact-length transfer) against offsets handed around by the tree
//! engine. Writes cover the whole block, zero-padded, so the file is a whole
//! number of blocks at all times and scans never short-read a trailing
//! fragment. Writes are not synchronous; crash consistency is out of scope.
//!
//! ## Free-Block Pool
//!
//! [`Freelist`] tracks block offsets available for allocation, rebuilt from
//! the file on every open and replenished in two phases whenever it runs
//! dry:
//!
//! 1. *Scan*: every block offset in `[0, file_size)` whose block is
//!    inactive (including all-zero, never-written blocks) joins the pool.
//! 2. *Extend*: the logical file size is rounded up to a block boundary and
//!    fresh tail offsets are appended until the pool holds at least
//!    [`MAX_FREE_BLOCKS`] entries.
//!
//! Extension is purely logical: nothing is written until a node is flushed
//! to the new offset. The pool itself is never persisted.
//!
//! ## Thread Safety
//!
//! `BlockFile` is single-threaded by design; the engine above it is
//! non-reentrant and callers must serialize access externally.

mod file;
mod freelist;

pub use file::BlockFile;
pub use freelist::Freelist;

/// Size of one block; also the unit the file grows by. Baked into the
/// on-disk format, so it is a constant rather than per-tree configuration.
pub const BLOCK_SIZE: usize = 4096;

/// Sentinel offset meaning "no link". A node whose `parent_off` equals this
/// value is the root.
pub const INVALID_OFFSET: i64 = 0xDEAD_BEEF;

/// Target size of the free-block pool after replenishment.
pub const MAX_FREE_BLOCKS: usize = 100;

/// Width of the `data_len` prefix at the start of every block.
pub const DATA_LEN_SIZE: usize = 8;
