use crate::builder::HashTreeBuilder;
use crate::digest::HashAlgorithm;
use crate::error::{Error, Result};
use crate::sparse::{self, Chunk, SparseImage};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// How block data reaches level 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IngestMode {
    /// Every block is hashed.
    #[default]
    Dense,
    /// Runs of all-zero blocks take the memoized zero-block hash. The
    /// resulting tree is identical to `Dense`.
    ZeroScan,
}

/// Container format of the image file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageFormat {
    /// Sparse when the file starts with the sparse magic, raw otherwise.
    #[default]
    Auto,
    Raw,
    /// Android sparse image; anything else is an error.
    Sparse,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestOptions {
    pub format: ImageFormat,
    pub mode: IngestMode,
}

/// Feed `data` (a whole number of blocks) to `builder`.
pub fn feed<D: HashAlgorithm>(
    builder: &mut HashTreeBuilder<D>,
    data: &[u8],
    mode: IngestMode,
) -> Result<()> {
    let block_size = builder.block_size();
    if data.len() % block_size != 0 {
        return Err(Error::UnalignedUpdate { len: data.len() as u64, block_size });
    }
    match mode {
        IngestMode::Dense => builder.update(data),
        IngestMode::ZeroScan => {
            let mut holes = 0u64;
            let mut run_start = 0;
            let mut run_zero = false;
            for (i, block) in data.chunks_exact(block_size).enumerate() {
                let zero = block.iter().all(|&b| b == 0);
                let start = i * block_size;
                if start > run_start && zero != run_zero {
                    holes += feed_run(builder, &data[run_start..start], run_zero)?;
                    run_start = start;
                }
                run_zero = zero;
            }
            holes += feed_run(builder, &data[run_start..], run_zero)?;
            debug!(hole_bytes = holes, total_bytes = data.len(), "zero scan ingest");
            Ok(())
        }
    }
}

/// Returns the number of hole bytes fed.
fn feed_run<D: HashAlgorithm>(
    builder: &mut HashTreeBuilder<D>,
    run: &[u8],
    zero: bool,
) -> Result<u64> {
    if zero {
        builder.update_zeros(run.len() as u64)?;
        Ok(run.len() as u64)
    } else {
        builder.update(run)?;
        Ok(0)
    }
}

/// Feed the expanded contents of a sparse image. Raw chunks go through
/// [`feed`], don't-care chunks and zero fills become holes, other fills are
/// hashed block by block from one expanded block.
pub fn feed_sparse<D: HashAlgorithm>(
    builder: &mut HashTreeBuilder<D>,
    image: &SparseImage<'_>,
    mode: IngestMode,
) -> Result<()> {
    let block_size = builder.block_size();
    let mut fill_block = Vec::with_capacity(block_size);
    for chunk in image.chunks() {
        match chunk? {
            Chunk::Raw(data) => feed(builder, data, mode)?,
            Chunk::DontCare(len) | Chunk::Fill { word: [0, 0, 0, 0], len } => {
                builder.update_zeros(len)?
            }
            Chunk::Fill { word, len } => {
                if len % block_size as u64 != 0 {
                    return Err(Error::UnalignedUpdate { len, block_size });
                }
                fill_block.clear();
                fill_block.extend(word.iter().cycle().take(block_size));
                for _ in 0..len / block_size as u64 {
                    builder.update(&fill_block)?;
                }
            }
            Chunk::Crc32 => {}
        }
    }
    debug!(
        chunks = image.total_chunks(),
        expanded_bytes = image.expanded_size(),
        "sparse image ingest"
    );
    Ok(())
}

/// Hash the image at `path` and return the finished builder.
pub fn hash_file<D: HashAlgorithm>(
    path: &Path,
    block_size: usize,
    digest: D,
    salt: &[u8],
    opts: IngestOptions,
) -> Result<HashTreeBuilder<D>> {
    let file =
        File::open(path).map_err(|e| Error::io(format!("open {}", path.display()), e))?;
    let size = file
        .metadata()
        .map_err(|e| Error::io(format!("stat {}", path.display()), e))?
        .len();
    let mmap = if size > 0 {
        Some(
            unsafe { Mmap::map(&file) }
                .map_err(|e| Error::io(format!("mmap {}", path.display()), e))?,
        )
    } else {
        None
    };
    let bytes: &[u8] = mmap.as_deref().unwrap_or(&[]);

    let is_sparse = match opts.format {
        ImageFormat::Raw => false,
        ImageFormat::Sparse => true,
        ImageFormat::Auto => sparse::is_sparse(bytes),
    };
    debug!(path = %path.display(), size, is_sparse, "hashing image");

    let mut builder = HashTreeBuilder::new(block_size, digest);
    if is_sparse {
        let image = SparseImage::parse(bytes)?;
        builder.initialize(image.expanded_size(), salt)?;
        feed_sparse(&mut builder, &image, opts.mode)?;
    } else {
        builder.initialize(size, salt)?;
        feed(&mut builder, bytes, opts.mode)?;
    }
    builder.build_hash_tree()?;
    Ok(builder)
}
