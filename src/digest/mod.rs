//! Content digests.
//!
//! - [`hasher`] - [`HashingWriter`], a streaming SHA-256 write adapter
//! - [`target`] - [`TargetDigest`], the selection key for selective extraction

pub mod hasher;
pub mod target;

pub use hasher::{sha256_hex, HashingWriter};
pub use target::TargetDigest;
