use thiserror::Error;

/// Recoverable failures surfaced by the tree builder and its helpers.
///
/// Misuse of the builder state machine (building twice, updating before
/// `initialize`, feeding fewer bytes than announced) is not represented here;
/// those conditions panic because the resulting tree would be undefined.
#[derive(Error, Debug)]
pub enum Error {
    #[error("data size {size} is not a multiple of block size {block_size}")]
    SizeMismatch { size: u64, block_size: usize },

    #[error("update of {len} bytes is not a multiple of block size {block_size}")]
    UnalignedUpdate { len: u64, block_size: usize },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("malformed sparse image: {0}")]
    SparseImage(String),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("descriptor encoding: {0}")]
    Descriptor(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io { context: context.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
