//! Streaming tar archive decoding.
//!
//! - [`header`] - header block layout, checksums and numeric fields
//! - [`scanner`] - [`EntryScanner`], a forward-only lazy sequence of entries

pub mod header;
pub mod scanner;

pub use header::{EntryKind, BLOCK_SIZE};
pub use scanner::{EntryContent, EntryScanner, TarEntry};
