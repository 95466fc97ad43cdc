use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::RngCore;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use veritree_core::descriptor::TreeDescriptor;
use veritree_core::digest::Algorithm;
use veritree_core::geometry::{self, DEFAULT_BLOCK_SIZE};
use veritree_core::ingest::{self, ImageFormat, IngestMode, IngestOptions};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DigestArg { Sha256, Blake3 }

impl From<DigestArg> for Algorithm {
    fn from(d: DigestArg) -> Self {
        match d {
            DigestArg::Sha256 => Algorithm::Sha256,
            DigestArg::Blake3 => Algorithm::Blake3,
        }
    }
}

#[derive(Parser)]
#[command(name = "veritree", version, about = "Build salted hash trees for verified read-only images")]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Build the hash tree of <DATA> into <TREE>; prints "<root hash> <salt>"
    Build {
        /// Salt given as a literal string
        #[arg(long, conflicts_with = "salt_hex")]
        salt_str: Option<String>,
        /// Salt given as hex digits
        #[arg(long)]
        salt_hex: Option<String>,
        /// Read <DATA> as an Android sparse image (detected by its magic otherwise)
        #[arg(short = 'S', long, conflicts_with = "raw", default_value_t = false)]
        sparse: bool,
        /// Hash <DATA> as raw bytes even if it looks like a sparse image
        #[arg(long, default_value_t = false)]
        raw: bool,
        /// Skip hashing of all-zero blocks; the tree is unchanged
        #[arg(long, default_value_t = false)]
        zero_scan: bool,
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
        #[arg(long, value_enum, default_value_t = DigestArg::Sha256)]
        algorithm: DigestArg,
        /// Also write a JSON descriptor of the tree
        #[arg(long)]
        descriptor: Option<PathBuf>,
        data: PathBuf,
        tree: PathBuf,
    },
    /// Print the size in bytes of the hash tree for <DATA_SIZE> bytes of data
    Size {
        data_size: String,
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
        #[arg(long, value_enum, default_value_t = DigestArg::Sha256)]
        algorithm: DigestArg,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Cmd::Build { salt_str, salt_hex, sparse, raw, zero_scan, block_size, algorithm, descriptor, data, tree } => {
            let salt = resolve_salt(salt_str, salt_hex, Algorithm::from(algorithm).output_size())?;
            let format = if sparse { ImageFormat::Sparse } else if raw { ImageFormat::Raw } else { ImageFormat::Auto };
            let mode = if zero_scan { IngestMode::ZeroScan } else { IngestMode::Dense };
            build(&data, &tree, block_size, algorithm.into(), &salt, IngestOptions { format, mode }, descriptor.as_deref())?;
        }
        Cmd::Size { data_size, block_size, algorithm } => {
            size(&data_size, block_size, algorithm.into())?;
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

fn build(data: &Path, tree: &Path, block_size: usize, algorithm: Algorithm, salt: &[u8], opts: IngestOptions, descriptor: Option<&Path>) -> Result<()> {
    geometry::validate_block_size(block_size, algorithm.output_size())?;
    let builder = ingest::hash_file(data, block_size, algorithm.backend(), salt, opts)
        .with_context(|| format!("hash {}", data.display()))?;
    builder.write_hash_tree_to_file(tree)
        .with_context(|| format!("write hash tree to {}", tree.display()))?;
    if let Some(path) = descriptor {
        TreeDescriptor::from_builder(&builder).write_to(path)
            .with_context(|| format!("write descriptor {}", path.display()))?;
    }
    tracing::info!(levels = builder.levels().len(), tree_size = builder.tree_size(), "wrote {}", tree.display());
    println!("{} {}", hex::encode(builder.root_hash()), hex::encode(salt));
    Ok(())
}

fn size(data_size: &str, block_size: usize, algorithm: Algorithm) -> Result<()> {
    let hash_size = algorithm.output_size();
    geometry::validate_block_size(block_size, hash_size)?;
    let bytes = parse_size(data_size)?;
    println!("{}", geometry::tree_size(bytes, block_size, hash_size));
    Ok(())
}

/// An empty or absent salt is replaced by `hash_size` random bytes.
fn resolve_salt(salt_str: Option<String>, salt_hex: Option<String>, hash_size: usize) -> Result<Vec<u8>> {
    let salt = match (salt_str, salt_hex) {
        (Some(s), _) => s.into_bytes(),
        (None, Some(h)) => parse_salt_hex(&h)?,
        (None, None) => Vec::new(),
    };
    if !salt.is_empty() { return Ok(salt); }
    let mut salt = vec![0u8; hash_size];
    rand::rngs::OsRng.try_fill_bytes(&mut salt).map_err(|e| anyhow!("read random salt: {e}"))?;
    Ok(salt)
}

fn parse_salt_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    let padded = if s.len() % 2 == 1 { format!("0{s}") } else { s.to_string() };
    hex::decode(&padded).with_context(|| format!("bad hex salt {s:?}"))
}

/// Decimal, `0x` hex, or a K/M/G binary suffix.
fn parse_size(text: &str) -> Result<u64> {
    let s = text.trim().to_uppercase();
    if let Some(h) = s.strip_prefix("0X") {
        return u64::from_str_radix(h, 16).map_err(|_| anyhow!("bad size {}", text));
    }
    let (num, mul) = if s.ends_with('K') { (&s[..s.len()-1], 1u64<<10) }
        else if s.ends_with('M') { (&s[..s.len()-1], 1<<20) }
        else if s.ends_with('G') { (&s[..s.len()-1], 1<<30) }
        else { (&s[..], 1) };
    let v: u64 = num.parse().map_err(|_| anyhow!("bad size {}", text))?;
    match v.checked_mul(mul) {
        Some(n) => Ok(n),
        None => bail!("size {} overflows", text),
    }
}
