//! Reader for the Android sparse image container.
//!
//! A sparse image is a 28-byte file header followed by chunks, each with a
//! 12-byte chunk header. All fields are little endian. Headers may be longer
//! than these minimums; the extra bytes are skipped.

use crate::error::{Error, Result};

pub const SPARSE_MAGIC: u32 = 0xed26_ff3a;
const FILE_HEADER_LEN: usize = 28;
const CHUNK_HEADER_LEN: usize = 12;
const MAJOR_VERSION: u16 = 1;

const CHUNK_RAW: u16 = 0xcac1;
const CHUNK_FILL: u16 = 0xcac2;
const CHUNK_DONT_CARE: u16 = 0xcac3;
const CHUNK_CRC32: u16 = 0xcac4;

/// One chunk of the expanded image, in file order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Chunk<'a> {
    /// Literal bytes.
    Raw(&'a [u8]),
    /// `len` bytes of the 4-byte `word` repeated.
    Fill { word: [u8; 4], len: u64 },
    /// `len` bytes the image does not care about; they read as zeros.
    DontCare(u64),
    /// Checksum of the data so far; covers no bytes.
    Crc32,
}

/// True when `bytes` starts with the sparse image magic.
pub fn is_sparse(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && le_u32(bytes, 0) == SPARSE_MAGIC
}

/// A validated sparse image borrowed from its backing bytes.
#[derive(Clone, Copy, Debug)]
pub struct SparseImage<'a> {
    bytes: &'a [u8],
    file_header_len: usize,
    chunk_header_len: usize,
    block_size: u32,
    total_blocks: u32,
    total_chunks: u32,
}

impl<'a> SparseImage<'a> {
    /// Parse the file header and walk every chunk once, so a malformed image
    /// is rejected before any of it is hashed.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_LEN {
            return Err(malformed(format!("{} bytes is too short for a sparse header", bytes.len())));
        }
        if !is_sparse(bytes) {
            return Err(malformed(format!("bad magic {:#010x}", le_u32(bytes, 0))));
        }
        let major = le_u16(bytes, 4);
        if major != MAJOR_VERSION {
            return Err(malformed(format!("unsupported major version {major}")));
        }
        let file_header_len = le_u16(bytes, 8) as usize;
        let chunk_header_len = le_u16(bytes, 10) as usize;
        if file_header_len < FILE_HEADER_LEN || file_header_len > bytes.len() {
            return Err(malformed(format!("file header length {file_header_len}")));
        }
        if chunk_header_len < CHUNK_HEADER_LEN {
            return Err(malformed(format!("chunk header length {chunk_header_len}")));
        }
        let block_size = le_u32(bytes, 12);
        if block_size == 0 || block_size % 4 != 0 {
            return Err(malformed(format!("block size {block_size} is not a multiple of 4")));
        }

        let image = Self {
            bytes,
            file_header_len,
            chunk_header_len,
            block_size,
            total_blocks: le_u32(bytes, 16),
            total_chunks: le_u32(bytes, 20),
        };

        let mut covered = 0u64;
        for chunk in image.chunks() {
            covered += match chunk? {
                Chunk::Raw(data) => data.len() as u64,
                Chunk::Fill { len, .. } | Chunk::DontCare(len) => len,
                Chunk::Crc32 => 0,
            };
        }
        if covered != image.expanded_size() {
            return Err(malformed(format!(
                "chunks cover {covered} bytes but the header announces {}",
                image.expanded_size()
            )));
        }
        Ok(image)
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Size of the image once every chunk is expanded.
    pub fn expanded_size(&self) -> u64 {
        u64::from(self.total_blocks) * u64::from(self.block_size)
    }

    pub fn chunks(&self) -> Chunks<'a> {
        Chunks {
            bytes: self.bytes,
            offset: self.file_header_len,
            index: 0,
            remaining: self.total_chunks,
            chunk_header_len: self.chunk_header_len,
            block_size: u64::from(self.block_size),
        }
    }
}

/// Iterator over the chunks of a [`SparseImage`]. Stops after the first error.
pub struct Chunks<'a> {
    bytes: &'a [u8],
    offset: usize,
    index: u32,
    remaining: u32,
    chunk_header_len: usize,
    block_size: u64,
}

impl<'a> Chunks<'a> {
    fn read_chunk(&mut self) -> Result<Chunk<'a>> {
        let i = self.index;
        let header_end = self.offset + self.chunk_header_len;
        if header_end > self.bytes.len() {
            return Err(malformed(format!("chunk {i} header is truncated")));
        }
        let kind = le_u16(self.bytes, self.offset);
        let blocks = u64::from(le_u32(self.bytes, self.offset + 4));
        let total = le_u32(self.bytes, self.offset + 8) as usize;
        if total < self.chunk_header_len {
            return Err(malformed(format!("chunk {i} total size {total} is smaller than its header")));
        }
        let end = self
            .offset
            .checked_add(total)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| malformed(format!("chunk {i} runs past the end of the image")))?;
        let body = &self.bytes[header_end..end];
        let len = blocks * self.block_size;

        let chunk = match kind {
            CHUNK_RAW if body.len() as u64 == len => Chunk::Raw(body),
            CHUNK_FILL if body.len() == 4 => {
                Chunk::Fill { word: [body[0], body[1], body[2], body[3]], len }
            }
            CHUNK_DONT_CARE if body.is_empty() => Chunk::DontCare(len),
            CHUNK_CRC32 if body.len() == 4 => Chunk::Crc32,
            CHUNK_RAW | CHUNK_FILL | CHUNK_DONT_CARE | CHUNK_CRC32 => {
                return Err(malformed(format!(
                    "chunk {i} of type {kind:#06x} carries {} payload bytes",
                    body.len()
                )));
            }
            other => return Err(malformed(format!("chunk {i} has unknown type {other:#06x}"))),
        };
        self.offset = end;
        Ok(chunk)
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let chunk = self.read_chunk();
        self.index += 1;
        self.remaining = if chunk.is_ok() { self.remaining - 1 } else { 0 };
        Some(chunk)
    }
}

fn malformed(msg: String) -> Error {
    Error::SparseImage(msg)
}

fn le_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn le_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

