use crate::digest::HashAlgorithm;
use crate::error::{Error, Result};

/// Salted single-block hashing plus the block-run helpers that fill a level.
pub struct BlockHasher<D> {
    digest: D,
    block_size: usize,
    hash_size: usize,
    salt: Vec<u8>,
    zero_block_hash: Vec<u8>,
}

impl<D: HashAlgorithm> BlockHasher<D> {
    /// # Panics
    ///
    /// Panics if the digest reports a zero output size or if two digests do
    /// not fit strictly inside one block. Either makes the tree unbuildable.
    pub fn new(block_size: usize, digest: D) -> Self {
        let hash_size = digest.output_size();
        assert!(hash_size > 0, "digest {} reports an empty output", digest.name());
        assert!(
            hash_size * 2 < block_size,
            "block size {block_size} cannot hold two {} digests of {hash_size} bytes",
            digest.name()
        );
        let mut hasher = Self {
            digest,
            block_size,
            hash_size,
            salt: Vec::new(),
            zero_block_hash: Vec::new(),
        };
        hasher.set_salt(&[]);
        hasher
    }

    /// Replace the salt and refresh the memoized zero-block hash.
    pub fn set_salt(&mut self, salt: &[u8]) {
        self.salt = salt.to_vec();
        let zero_block = vec![0u8; self.block_size];
        let mut zero_hash = vec![0u8; self.hash_size];
        self.hash_block(&zero_block, &mut zero_hash);
        self.zero_block_hash = zero_hash;
    }

    pub fn digest(&self) -> &D {
        &self.digest
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn hash_size(&self) -> usize {
        self.hash_size
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn zero_block_hash(&self) -> &[u8] {
        &self.zero_block_hash
    }

    /// `out = digest(salt ++ block)`.
    pub fn hash_block(&self, block: &[u8], out: &mut [u8]) {
        assert_eq!(block.len(), self.block_size, "hash_block needs exactly one block");
        assert_eq!(out.len(), self.hash_size, "hash_block output buffer has the wrong size");
        self.digest.digest_into(&[&self.salt, block], out);
    }

    /// Append one digest per block of `data` to `level`, in block order.
    pub fn hash_blocks(&self, data: &[u8], level: &mut Vec<u8>) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.check_aligned(data.len() as u64)?;
        level.reserve(data.len() / self.block_size * self.hash_size);
        for block in data.chunks_exact(self.block_size) {
            let start = level.len();
            level.resize(start + self.hash_size, 0);
            self.hash_block(block, &mut level[start..]);
        }
        Ok(())
    }

    /// Append the memoized zero-block digest once per block of a `len`-byte
    /// hole.
    pub fn hash_zero_blocks(&self, len: u64, level: &mut Vec<u8>) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        self.check_aligned(len)?;
        let blocks = len / self.block_size as u64;
        for _ in 0..blocks {
            level.extend_from_slice(&self.zero_block_hash);
        }
        Ok(())
    }

    fn check_aligned(&self, len: u64) -> Result<()> {
        if len % self.block_size as u64 != 0 {
            return Err(Error::UnalignedUpdate { len, block_size: self.block_size });
        }
        Ok(())
    }
}

/// Zero-extend `level` to a whole number of blocks. An empty level becomes one
/// block.
pub fn pad_to_block(level: &mut Vec<u8>, block_size: usize) {
    let target = level.len().div_ceil(block_size).max(1) * block_size;
    level.resize(target, 0);
}
