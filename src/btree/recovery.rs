//! # Open-Time Recovery
//!
//! The file has no superblock, so the root offset must be rediscovered on
//! every open of a non-empty file: scan block-aligned offsets for the first
//! active node, then follow `parent_off` links until they run out. Every
//! node records its own parent, so the root is reachable from any live
//! block, at the cost of O(file_size / BLOCK_SIZE) scan I/O in the worst
//! case.

use eyre::Result;

use crate::error::TreeError;
use crate::storage::{BlockFile, BLOCK_SIZE, INVALID_OFFSET};

use super::Node;

/// Reconstructs the root offset of a non-empty file. Fails with
/// [`TreeError::InvalidFormat`] when no block in the file is active.
pub(crate) fn recover_root(store: &mut BlockFile) -> Result<i64> {
    let mut first_active: Option<Node> = None;
    let mut off = 0i64;
    while off < store.file_size() {
        let node = store.read_block(off)?;
        if node.is_active {
            first_active = Some(node);
            break;
        }
        off += BLOCK_SIZE as i64;
    }

    let mut node = first_active.ok_or_else(|| {
        TreeError::InvalidFormat(format!(
            "no active block in '{}'",
            store.path().display()
        ))
    })?;

    while node.parent_off != INVALID_OFFSET {
        node = store.read_block(node.parent_off)?;
    }

    tracing::debug!(root_off = node.self_off, "recovered root");
    Ok(node.self_off)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::Tree;
    use tempfile::tempdir;

    #[test]
    fn recovers_root_of_single_leaf_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bdb");
        let mut tree = Tree::open(&path).unwrap();
        tree.insert(1, "a").unwrap();
        let root_off = tree.root_off();
        tree.close().unwrap();
        let mut store = BlockFile::open(&path).unwrap();

        assert_eq!(recover_root(&mut store).unwrap(), root_off);
    }

    #[test]
    fn walks_parent_links_to_a_promoted_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bdb");
        let mut tree = Tree::open(&path).unwrap();
        for key in 1..=30 {
            tree.insert(key, &format!("v{key}")).unwrap();
        }
        let root_off = tree.root_off();
        tree.close().unwrap();
        let mut store = BlockFile::open(&path).unwrap();

        // The first active block is the leftmost leaf, not the root.
        assert_ne!(root_off, 0);
        assert_eq!(recover_root(&mut store).unwrap(), root_off);
    }

    #[test]
    fn skips_leading_inactive_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bdb");
        let off = BLOCK_SIZE as i64;
        {
            let mut store = BlockFile::open(&path).unwrap();
            let mut leaf = Node::new(off);
            leaf.is_leaf = true;
            leaf.keys.push(1);
            leaf.values.push("a".to_string());
            store.write_block(&leaf).unwrap();
        }
        let mut store = BlockFile::open(&path).unwrap();

        // Block 0 is a never-written hole that reads back as zeros.
        assert_eq!(store.file_size(), 2 * BLOCK_SIZE as i64);
        assert_eq!(recover_root(&mut store).unwrap(), off);
    }

    #[test]
    fn all_zero_file_is_invalid_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bdb");
        std::fs::write(&path, vec![0u8; 2 * BLOCK_SIZE]).unwrap();
        let mut store = BlockFile::open(&path).unwrap();

        let err = recover_root(&mut store).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TreeError>(),
            Some(TreeError::InvalidFormat(_))
        ));
    }
}
