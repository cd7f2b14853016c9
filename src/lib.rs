//! # BirchDB - Single-File Disk-Backed B+ Tree
//!
//! BirchDB persists an ordered map from 64-bit signed integer keys to
//! variable-length string payloads as a sequence of fixed-size 4096-byte
//! blocks in one file. Every logical node occupies exactly one block, and all
//! inter-node links (parent, children, siblings) are stored as file offsets
//! rather than in-memory pointers, so the tree structure lives entirely on
//! disk and can be reconstructed from the file alone.
//!
//! ## Quick Start
//!
//! ```ignore
//! use birchdb::Tree;
//!
//! let mut tree = Tree::open("./accounts.bdb")?;
//! tree.insert(1, "alice")?;
//! tree.insert(2, "bob")?;
//! tree.close()?;
//! ```
//!
//! ## Architecture
//!
//! BirchDB uses a layered architecture:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Public API (Tree)            │
//! ├─────────────────────────────────────┤
//! │  Tree Engine (descent/split/promote)│
//! ├──────────────────┬──────────────────┤
//! │    Recovery      │   Block Codec    │
//! ├──────────────────┴──────────────────┤
//! │  Storage Layer (BlockFile/Freelist) │
//! ├─────────────────────────────────────┤
//! │       Positioned File I/O           │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! The file is a headerless sequence of 4096-byte blocks:
//!
//! ```text
//! Offset 0:       Block 0 (4096 bytes)
//! Offset 4096:    Block 1 (4096 bytes)
//! Offset 8192:    Block 2 (4096 bytes)
//! ...
//! ```
//!
//! Each block starts with an 8-byte little-endian length prefix followed by
//! the encoded node payload; the remainder of the block is zero padding.
//! There is no superblock: on open, the root is rediscovered by scanning for
//! any active block and walking its parent offsets upward.
//!
//! ## The Parent-Max Variant
//!
//! Unlike a textbook B+ tree whose interior nodes hold separator keys, every
//! interior node here stores, for each child, the *largest* key present in
//! that child's subtree. Descent therefore searches for the first stored key
//! `>=` the probe and falls back to the rightmost child when the probe
//! exceeds every stored maximum; inserting a new maximum into a leaf repairs
//! the stored maxima up the ancestor chain.
//!
//! ## Module Overview
//!
//! - [`storage`]: block file I/O, free-block pool, allocation
//! - [`btree`]: node codec, tree engine, open-time recovery
//! - [`error`]: typed error kinds callers can match on
//!
//! ## Concurrency
//!
//! The engine is single-threaded and non-reentrant. All I/O is synchronous
//! and blocking; a wrapping layer must serialize concurrent callers.

pub mod btree;
pub mod error;
pub mod storage;

pub use btree::{Node, Tree, ORDER};
pub use error::TreeError;
pub use storage::{BlockFile, BLOCK_SIZE, INVALID_OFFSET, MAX_FREE_BLOCKS};
