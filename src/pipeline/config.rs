//! Configuration structures and defaults for the pipeline.
//!
//! This module provides the configuration used by the [`Pipeline`] and
//! [`PipelineBuilder`]: the extraction [`Mode`], where candidate layers are
//! buffered, and how the stages are sized.
//!
//! [`Pipeline`]: super::Pipeline
//! [`PipelineBuilder`]: super::PipelineBuilder
//!
//! # Examples
//!
//! ## Using Callbacks
//!
//! ```rust
//! use siphon::pipeline::{CompletionCallback, Status, Summary};
//!
//! let callback: CompletionCallback = Box::new(|summary: &Summary| {
//!     match summary.status() {
//!         Status::Success => println!("✓ Forwarded {} bytes", summary.forwarded()),
//!         Status::Fail(msg) => println!("✗ Failed: {}", msg),
//!         Status::NotStarted => {}
//!     }
//! });
//! ```

use super::summary::Summary;
use crate::digest::TargetDigest;
use crate::extract::{DEFAULT_CHUNK_SIZE, DEFAULT_LAYER_MARKER};
use crate::progress::StyleOptions;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Callback type for pipeline completion events.
pub type CompletionCallback = Box<dyn Fn(&Summary) + Send + Sync>;

/// What the pipeline forwards to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    /// Forward the raw export stream, scanning it only to log its entries.
    #[default]
    Direct,
    /// Forward only the nested layer whose SHA-256 matches the target.
    Selective(TargetDigest),
}

impl Mode {
    /// The target digest in selective mode.
    pub fn target(&self) -> Option<&TargetDigest> {
        match self {
            Mode::Direct => None,
            Mode::Selective(target) => Some(target),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Direct => f.write_str("direct"),
            Mode::Selective(target) => write!(f, "selective ({})", target),
        }
    }
}

/// Configuration structure for the pipeline
#[derive(Clone)]
pub struct PipelineConfig {
    /// Extraction mode.
    pub mode: Mode,
    /// Directory for scratch files holding candidate layers.
    pub scratch_dir: PathBuf,
    /// Candidates of at most this many bytes are buffered in memory.
    pub memory_threshold: u64,
    /// Substring identifying nested layer archives.
    pub layer_marker: String,
    /// Size of the locator's copy buffer.
    pub chunk_size: usize,
    /// Chunks in flight per conduit.
    pub conduit_depth: usize,
    /// Pipeline style options.
    pub style_options: StyleOptions,
    /// Callback for when the pipeline reaches a terminal state.
    pub on_complete: Option<Arc<CompletionCallback>>,
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("mode", &self.mode)
            .field("scratch_dir", &self.scratch_dir)
            .field("memory_threshold", &self.memory_threshold)
            .field("layer_marker", &self.layer_marker)
            .field("chunk_size", &self.chunk_size)
            .field("conduit_depth", &self.conduit_depth)
            .field("style_options", &self.style_options)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Direct,
            scratch_dir: std::env::temp_dir(),
            memory_threshold: 0,
            layer_marker: DEFAULT_LAYER_MARKER.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            conduit_depth: crate::conduit::DEFAULT_DEPTH,
            style_options: StyleOptions::default(),
            on_complete: None,
        }
    }
}
