use std::fmt;
use std::str::FromStr;

/// A fixed-output digest the tree builder is parameterized over.
///
/// Implementations hash the concatenation of `parts` in one shot. The tree
/// code never looks inside the digest; it only relies on `output_size` being
/// constant for the lifetime of the value.
pub trait HashAlgorithm {
    /// Short lowercase identifier, e.g. `sha256`.
    fn name(&self) -> &'static str;

    /// Digest length in bytes.
    fn output_size(&self) -> usize;

    /// Hash `parts` as if concatenated and write the digest into `out`.
    /// `out` is exactly `output_size()` bytes long.
    fn digest_into(&self, parts: &[&[u8]], out: &mut [u8]);
}

impl<T: HashAlgorithm + ?Sized> HashAlgorithm for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn output_size(&self) -> usize {
        (**self).output_size()
    }

    fn digest_into(&self, parts: &[&[u8]], out: &mut [u8]) {
        (**self).digest_into(parts, out)
    }
}

/// SHA-256, the digest used by dm-verity images.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256;

impl HashAlgorithm for Sha256 {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn output_size(&self) -> usize {
        32
    }

    fn digest_into(&self, parts: &[&[u8]], out: &mut [u8]) {
        use sha2::Digest;
        let mut hasher = sha2::Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        out.copy_from_slice(&hasher.finalize());
    }
}

/// BLAKE3 with the default 32-byte output.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3;

impl HashAlgorithm for Blake3 {
    fn name(&self) -> &'static str {
        "blake3"
    }

    fn output_size(&self) -> usize {
        blake3::OUT_LEN
    }

    fn digest_into(&self, parts: &[&[u8]], out: &mut [u8]) {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        out.copy_from_slice(hasher.finalize().as_bytes());
    }
}

/// Runtime selector for the built-in digests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Algorithm {
    #[default]
    Sha256,
    Blake3,
}

impl Algorithm {
    pub fn backend(self) -> Box<dyn HashAlgorithm + Send + Sync> {
        match self {
            Algorithm::Sha256 => Box::new(Sha256),
            Algorithm::Blake3 => Box::new(Blake3),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Blake3 => "blake3",
        }
    }

    pub fn output_size(self) -> usize {
        self.backend().output_size()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Algorithm::Sha256),
            "blake3" => Ok(Algorithm::Blake3),
            other => Err(crate::Error::Configuration(format!("unknown digest algorithm {other:?}"))),
        }
    }
}
