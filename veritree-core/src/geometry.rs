//! Tree shape arithmetic, independent of any data.
//!
//! Every level holds one digest per block of the level below, padded to whole
//! blocks, so a level of `n` blocks produces `ceil(n * H / B)` blocks above it.

use crate::error::{Error, Result};

pub const DEFAULT_BLOCK_SIZE: usize = 4096;

fn hashed_blocks(blocks: u64, block_size: usize, hash_size: usize) -> u64 {
    let bytes = blocks as u128 * hash_size as u128;
    (bytes.div_ceil(block_size as u128) as u64).max(1)
}

/// Blocks in `level` of a tree built over `data_size` bytes.
pub fn level_blocks(data_size: u64, block_size: usize, hash_size: usize, level: usize) -> u64 {
    let mut blocks = data_size.div_ceil(block_size as u64);
    for _ in 0..=level {
        blocks = hashed_blocks(blocks, block_size, hash_size);
    }
    blocks
}

/// Blocks per level, level 0 first, ending with the single root-adjacent block.
pub fn tree_levels(data_size: u64, block_size: usize, hash_size: usize) -> Vec<u64> {
    let mut levels = Vec::new();
    let mut blocks = hashed_blocks(data_size.div_ceil(block_size as u64), block_size, hash_size);
    levels.push(blocks);
    while blocks > 1 {
        blocks = hashed_blocks(blocks, block_size, hash_size);
        levels.push(blocks);
    }
    levels
}

/// Serialized size in bytes of the tree for `data_size` bytes of data.
pub fn tree_size(data_size: u64, block_size: usize, hash_size: usize) -> u64 {
    tree_levels(data_size, block_size, hash_size).iter().sum::<u64>() * block_size as u64
}

/// Check a user-supplied block size before it reaches the builder, whose
/// constructor treats the same conditions as fatal.
pub fn validate_block_size(block_size: usize, hash_size: usize) -> Result<()> {
    if !block_size.is_power_of_two() {
        return Err(Error::Configuration(format!(
            "block size {block_size} is not a power of two"
        )));
    }
    if hash_size * 2 >= block_size {
        return Err(Error::Configuration(format!(
            "block size {block_size} must exceed twice the digest size {hash_size}"
        )));
    }
    Ok(())
}
