//! Scratch storage for candidate entries awaiting a digest decision.

pub mod buffer;

pub use buffer::{ScratchBuffer, ScratchStore};
