//! # Block File
//!
//! `BlockFile` owns the database file handle for its whole lifetime and is
//! the only component that touches the file. It performs positioned block
//! I/O, tracks the logical file size, and drives the free-block pool.
//!
//! ## Logical vs Physical Size
//!
//! Pool extension moves the *logical* file size forward without writing
//! anything; a tail block only materializes on its first `write_block`.
//! Because every write covers a full zero-padded block, the physical file is
//! always a whole number of blocks and never larger than the logical size.
//!
//! ## Error Handling
//!
//! All fallible operations return `eyre::Result` with file and offset
//! context. A read that runs off the end of the data is reported as
//! [`TreeError::InvalidFormat`]; other I/O failures keep the underlying
//! `std::io::Error` in the report chain.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};

use crate::btree::Node;
use crate::error::TreeError;

use super::{Freelist, BLOCK_SIZE, DATA_LEN_SIZE, INVALID_OFFSET};

#[derive(Debug)]
pub struct BlockFile {
    file: File,
    path: PathBuf,
    file_size: i64,
    freelist: Freelist,
}

impl BlockFile {
    /// Opens the database file read-write, creating it when absent. The
    /// free pool starts empty; callers replenish it explicitly (on open of
    /// a non-empty file) or implicitly through [`BlockFile::allocate`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let metadata = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat database file '{}'", path.display()))?;

        Ok(Self {
            file,
            path,
            file_size: metadata.len() as i64,
            freelist: Freelist::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Logical end of the file: advanced by pool extension, never by writes.
    pub fn file_size(&self) -> i64 {
        self.file_size
    }

    pub fn free_block_count(&self) -> usize {
        self.freelist.len()
    }

    /// Reads the block at `off` and decodes it into a [`Node`].
    pub fn read_block(&mut self, off: i64) -> Result<Node> {
        let payload = self.read_payload(off)?;
        Node::decode(&payload)
            .wrap_err_with(|| format!("block at offset {} in '{}'", off, self.path.display()))
    }

    /// Encodes `node` and writes it as one full zero-padded block at
    /// `node.self_off`: the 8-byte `data_len` prefix, the payload, then
    /// padding out to the block boundary.
    pub fn write_block(&mut self, node: &Node) -> Result<()> {
        ensure!(
            node.self_off >= 0 && node.self_off != INVALID_OFFSET,
            "refusing to flush node with invalid self offset {}",
            node.self_off
        );

        let payload = node.encode()?;
        let mut block = vec![0u8; BLOCK_SIZE];
        block[..DATA_LEN_SIZE].copy_from_slice(&(payload.len() as i64).to_le_bytes());
        block[DATA_LEN_SIZE..DATA_LEN_SIZE + payload.len()].copy_from_slice(&payload);

        self.file
            .seek(SeekFrom::Start(node.self_off as u64))
            .wrap_err_with(|| {
                format!(
                    "failed to seek to offset {} in '{}'",
                    node.self_off,
                    self.path.display()
                )
            })?;
        self.file.write_all(&block).wrap_err_with(|| {
            format!(
                "failed to write block at offset {} to '{}'",
                node.self_off,
                self.path.display()
            )
        })
    }

    /// Pops the next free offset, replenishing the pool first when empty.
    pub fn allocate(&mut self) -> Result<i64> {
        if self.freelist.is_empty() {
            self.replenish()?;
        }
        let off = self
            .freelist
            .pop()
            .ok_or_else(|| eyre::eyre!("free block pool empty after replenishment"))?;
        tracing::trace!(offset = off, "allocated block");
        Ok(off)
    }

    /// Rebuilds the free pool: reclaims every inactive block in
    /// `[0, file_size)`, then extends the logical file tail until the pool
    /// holds at least [`super::MAX_FREE_BLOCKS`] offsets.
    pub fn replenish(&mut self) -> Result<()> {
        let mut off = 0i64;
        while off < self.file_size {
            if !self.is_block_active(off)? {
                self.freelist.push(off);
            }
            off += BLOCK_SIZE as i64;
        }

        let reclaimed = self.freelist.len();
        self.file_size = self.freelist.extend_from_tail(self.file_size);
        tracing::debug!(
            reclaimed,
            pooled = self.freelist.len(),
            file_size = self.file_size,
            "replenished free block pool"
        );
        Ok(())
    }

    /// Reads just enough of the block at `off` to classify it: the length
    /// prefix plus the `is_active` byte. A zero-length block is free.
    pub fn is_block_active(&mut self, off: i64) -> Result<bool> {
        let data_len = self.read_data_len(off)?;
        if data_len == 0 {
            return Ok(false);
        }
        let mut flag = [0u8; 1];
        self.read_exact_at(off as u64 + DATA_LEN_SIZE as u64, &mut flag)?;
        Ok(flag[0] != 0)
    }

    pub fn sync(&self) -> Result<()> {
        self.file
            .sync_all()
            .wrap_err_with(|| format!("failed to sync '{}'", self.path.display()))
    }

    fn read_payload(&mut self, off: i64) -> Result<Vec<u8>> {
        let data_len = self.read_data_len(off)?;
        let mut payload = vec![0u8; data_len as usize];
        self.read_exact_at(off as u64 + DATA_LEN_SIZE as u64, &mut payload)?;
        Ok(payload)
    }

    fn read_data_len(&mut self, off: i64) -> Result<i64> {
        let mut prefix = [0u8; DATA_LEN_SIZE];
        self.read_exact_at(off as u64, &mut prefix)?;
        let data_len = i64::from_le_bytes(prefix);
        if data_len < 0 || data_len as usize + DATA_LEN_SIZE > BLOCK_SIZE {
            return Err(TreeError::InvalidFormat(format!(
                "node length {} at offset {} exceeds the {} byte block",
                data_len, off, BLOCK_SIZE
            ))
            .into());
        }
        Ok(data_len)
    }

    fn read_exact_at(&mut self, off: u64, buf: &mut [u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(off))
            .wrap_err_with(|| format!("failed to seek to offset {} in '{}'", off, self.path.display()))?;
        match self.file.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(TreeError::InvalidFormat(format!(
                    "short read of {} bytes at offset {} in '{}'",
                    buf.len(),
                    off,
                    self.path.display()
                ))
                .into())
            }
            Err(err) => Err(err).wrap_err_with(|| {
                format!(
                    "failed to read {} bytes at offset {} from '{}'",
                    buf.len(),
                    off,
                    self.path.display()
                )
            }),
        }
    }
}

impl Drop for BlockFile {
    fn drop(&mut self) {
        let _ = self.file.sync_all();
    }
}
