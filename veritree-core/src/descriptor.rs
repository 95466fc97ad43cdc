use crate::builder::HashTreeBuilder;
use crate::digest::HashAlgorithm;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// JSON summary of a built tree: everything a verifier needs besides the
/// tree bytes themselves.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TreeDescriptor {
    pub created_utc: String,
    pub algorithm: String,
    pub block_size: usize,
    pub data_size: u64,
    pub salt_hex: String,
    pub root_hash_hex: String,
    pub tree_size: u64,
    /// Blocks per level in on-disk order (root-adjacent level first).
    pub levels: Vec<u64>,
}

impl TreeDescriptor {
    pub fn from_builder<D: HashAlgorithm>(builder: &HashTreeBuilder<D>) -> Self {
        let block_size = builder.block_size();
        let levels = builder
            .levels()
            .iter()
            .rev()
            .map(|l| (l.len() / block_size) as u64)
            .collect();
        Self {
            created_utc: chrono::Utc::now().to_rfc3339(),
            algorithm: builder.digest().name().to_string(),
            block_size,
            data_size: builder.data_size(),
            salt_hex: hex::encode(builder.salt()),
            root_hash_hex: hex::encode(builder.root_hash()),
            tree_size: builder.tree_size(),
            levels,
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut f =
            File::create(path).map_err(|e| Error::io(format!("create {}", path.display()), e))?;
        f.write_all(serde_json::to_string_pretty(self)?.as_bytes())
            .map_err(|e| Error::io(format!("write {}", path.display()), e))?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let f = File::open(path).map_err(|e| Error::io(format!("open {}", path.display()), e))?;
        Ok(serde_json::from_reader(f)?)
    }
}
