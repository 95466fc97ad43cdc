use crate::digest::HashAlgorithm;
use crate::error::{Error, Result};
use crate::geometry;
use crate::hasher::{pad_to_block, BlockHasher};
use crate::serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Uninitialized,
    Streaming,
    Built,
}

/// Builds the salted hash tree of one data image.
///
/// Call order is fixed: [`initialize`](Self::initialize) once, then any
/// number of [`update`](Self::update) / [`update_zeros`](Self::update_zeros)
/// calls totalling the announced size, then
/// [`build_hash_tree`](Self::build_hash_tree) once. After that the tree is
/// frozen and can be written out repeatedly. Calls out of order panic.
pub struct HashTreeBuilder<D> {
    hasher: BlockHasher<D>,
    data_size: u64,
    fed: u64,
    levels: Vec<Vec<u8>>,
    root_hash: Vec<u8>,
    state: State,
}

impl<D: HashAlgorithm> HashTreeBuilder<D> {
    /// # Panics
    ///
    /// Panics when `block_size` is not larger than twice the digest size.
    pub fn new(block_size: usize, digest: D) -> Self {
        Self {
            hasher: BlockHasher::new(block_size, digest),
            data_size: 0,
            fed: 0,
            levels: Vec::new(),
            root_hash: Vec::new(),
            state: State::Uninitialized,
        }
    }

    pub fn block_size(&self) -> usize {
        self.hasher.block_size()
    }

    pub fn hash_size(&self) -> usize {
        self.hasher.hash_size()
    }

    pub fn digest(&self) -> &D {
        self.hasher.digest()
    }

    pub fn salt(&self) -> &[u8] {
        self.hasher.salt()
    }

    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    pub fn zero_block_hash(&self) -> &[u8] {
        self.hasher.zero_block_hash()
    }

    /// Announce the total data size and the salt.
    pub fn initialize(&mut self, expected_data_size: u64, salt: &[u8]) -> Result<()> {
        assert_eq!(self.state, State::Uninitialized, "initialize called twice");
        let block_size = self.block_size();
        if expected_data_size % block_size as u64 != 0 {
            return Err(Error::SizeMismatch { size: expected_data_size, block_size });
        }
        self.data_size = expected_data_size;
        self.hasher.set_salt(salt);

        let base_blocks =
            geometry::level_blocks(expected_data_size, block_size, self.hash_size(), 0);
        let capacity = usize::try_from(base_blocks * block_size as u64).unwrap_or(0);
        self.levels.push(Vec::with_capacity(capacity));

        self.state = State::Streaming;
        debug!(data_size = expected_data_size, block_size, salt_len = salt.len(), "hash tree initialized");
        Ok(())
    }

    /// Hash the next `data.len()` bytes of the image into level 0.
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        self.assert_streaming("update");
        self.hasher.hash_blocks(data, &mut self.levels[0])?;
        self.fed += data.len() as u64;
        Ok(())
    }

    /// Account for a `len`-byte hole of zero blocks without reading any data.
    pub fn update_zeros(&mut self, len: u64) -> Result<()> {
        self.assert_streaming("update_zeros");
        self.hasher.hash_zero_blocks(len, &mut self.levels[0])?;
        self.fed += len;
        Ok(())
    }

    /// Reduce level 0 into the full tree and compute the root hash.
    pub fn build_hash_tree(&mut self) -> Result<()> {
        self.assert_streaming("build_hash_tree");
        assert_eq!(self.levels.len(), 1, "build_hash_tree expects only the base level");
        assert_eq!(
            self.fed, self.data_size,
            "fed {} bytes but initialize announced {}",
            self.fed, self.data_size
        );
        let block_size = self.block_size();

        pad_to_block(&mut self.levels[0], block_size);
        debug!(level = 0, bytes = self.levels[0].len(), "hash tree level built");

        while let Some(current) = self.levels.last().filter(|l| l.len() > block_size) {
            let mut next = Vec::with_capacity(current.len() / block_size * self.hash_size());
            self.hasher.hash_blocks(current, &mut next)?;
            pad_to_block(&mut next, block_size);
            debug!(level = self.levels.len(), bytes = next.len(), "hash tree level built");
            self.levels.push(next);
        }

        let top = &self.levels[self.levels.len() - 1];
        assert_eq!(top.len(), block_size, "top level must be exactly one block");
        let mut root_hash = vec![0u8; self.hash_size()];
        self.hasher.hash_block(top, &mut root_hash);
        self.root_hash = root_hash;
        self.state = State::Built;

        info!(
            levels = self.levels.len(),
            root_hash = %hex::encode(&self.root_hash),
            "hash tree built"
        );
        Ok(())
    }

    pub fn root_hash(&self) -> &[u8] {
        self.assert_built("root_hash");
        &self.root_hash
    }

    /// Level buffers, level 0 first. Before the build only level 0 exists and
    /// is not yet padded.
    pub fn levels(&self) -> &[Vec<u8>] {
        &self.levels
    }

    /// Total bytes the serializer writes.
    pub fn tree_size(&self) -> u64 {
        self.assert_built("tree_size");
        self.levels.iter().map(|l| l.len() as u64).sum()
    }

    /// Write the tree to a borrowed sink; the sink stays open.
    pub fn write_hash_tree<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        self.assert_built("write_hash_tree");
        serialize::write_levels(&self.levels, out)
    }

    /// Create or truncate `path` and write the tree into it.
    pub fn write_hash_tree_to_file(&self, path: &Path) -> Result<()> {
        self.assert_built("write_hash_tree_to_file");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| {
                tracing::error!(path = %path.display(), error = %source, "failed to open output file");
                Error::io(format!("open output file {}", path.display()), source)
            })?;
        self.write_hash_tree(&mut file)
    }

    /// Write the tree through a file descriptor owned by the caller. Output
    /// starts at the descriptor's current offset and the descriptor is left
    /// open.
    #[cfg(unix)]
    pub fn write_hash_tree_to_fd(&self, fd: std::os::fd::BorrowedFd<'_>) -> Result<()> {
        self.assert_built("write_hash_tree_to_fd");
        let dup = fd.try_clone_to_owned().map_err(|source| Error::io("duplicate output fd", source))?;
        let mut file = std::fs::File::from(dup);
        self.write_hash_tree(&mut file)
    }

    fn assert_streaming(&self, op: &str) {
        match self.state {
            State::Streaming => {}
            State::Uninitialized => panic!("{op} called before initialize"),
            State::Built => panic!("{op} called after build_hash_tree"),
        }
    }

    fn assert_built(&self, op: &str) {
        assert_eq!(self.state, State::Built, "{op} requires a built hash tree");
    }
}
