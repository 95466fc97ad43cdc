pub mod builder;
pub mod descriptor;
pub mod digest;
pub mod error;
pub mod geometry;
pub mod hasher;
pub mod ingest;
pub mod serialize;
pub mod sparse;

pub use builder::HashTreeBuilder;
pub use error::{Error, Result};
