//! Typed error kinds for tree operations.
//!
//! The crate propagates failures as [`eyre::Report`]s so call sites can
//! attach file/offset context cheaply. Outcomes a caller is expected to
//! branch on are raised as a [`TreeError`] inside the report and recovered
//! with [`eyre::Report::downcast_ref`]:
//!
//! ```ignore
//! match tree.insert(key, value) {
//!     Err(report) if matches!(
//!         report.downcast_ref::<TreeError>(),
//!         Some(TreeError::DuplicateKey(_))
//!     ) => { /* key already present, tree unchanged */ }
//!     other => other?,
//! }
//! ```
//!
//! Underlying I/O failures stay `std::io::Error` values in the report chain.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// The inserted key is already present in the target leaf. The tree is
    /// left unchanged.
    #[error("key {0} already exists")]
    DuplicateKey(i64),

    /// Reserved for lookup and delete, which are not implemented yet.
    #[error("key {0} not found")]
    KeyNotFound(i64),

    /// The on-disk data does not decode as a valid block: a corrupt length
    /// prefix, a short read, a count field overrunning its buffer, or a file
    /// with no active block at recovery time.
    #[error("invalid block format: {0}")]
    InvalidFormat(String),
}
