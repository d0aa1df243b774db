//! Builder pattern implementation for creating Pipeline instances.
//!
//! This module provides the [`PipelineBuilder`] struct that implements the
//! builder pattern for configuring and creating [`Pipeline`] instances.
//!
//! # Examples
//!
//! ## Selective extraction
//!
//! ```rust
//! use siphon::pipeline::PipelineBuilder;
//! use siphon::TargetDigest;
//!
//! let pipeline = PipelineBuilder::new()
//!     .selective(TargetDigest::new("sha256:9a3c0f44e1c1c8d0d8b1b4ac4b1f9ab4c3c5b3ef7f3fa5b1b7f7c4e7d1c8a9f0"))
//!     .scratch_dir("/var/tmp".into())
//!     .memory_threshold(8 * 1024 * 1024)
//!     .build();
//! assert!(pipeline.mode().target().is_some());
//! ```
//!
//! ## Hidden Progress Bars
//!
//! ```rust
//! use siphon::pipeline::PipelineBuilder;
//!
//! // Create a pipeline with no visible progress bars
//! let pipeline = PipelineBuilder::hidden().build();
//! ```

use super::config::{Mode, PipelineConfig};
use super::pipeline::Pipeline;
use super::summary::Summary;
use crate::digest::TargetDigest;
use crate::progress::StyleOptions;

use std::{path::PathBuf, sync::Arc};

/// A builder used to create a [`Pipeline`].
///
/// ```rust
/// # fn main()  {
/// use siphon::pipeline::PipelineBuilder;
///
/// let p = PipelineBuilder::new().chunk_size(16 * 1024).conduit_depth(2).build();
/// # }
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Creates a builder with the default options.
    pub fn new() -> Self {
        PipelineBuilder::default()
    }

    /// Convenience function to hide the progress bars.
    pub fn hidden() -> Self {
        let mut builder = PipelineBuilder::default();
        builder.config.style_options = StyleOptions::hidden();
        builder
    }

    /// Set the extraction mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Forward the whole export stream.
    pub fn direct(self) -> Self {
        self.mode(Mode::Direct)
    }

    /// Forward only the layer whose digest is `target`.
    pub fn selective(self, target: TargetDigest) -> Self {
        self.mode(Mode::Selective(target))
    }

    /// Sets the directory where candidate layers are buffered.
    pub fn scratch_dir(mut self, scratch_dir: PathBuf) -> Self {
        self.config.scratch_dir = scratch_dir;
        self
    }

    /// Buffer candidates of at most `threshold` bytes in memory.
    ///
    /// The default of `0` puts every candidate on disk.
    pub fn memory_threshold(mut self, threshold: u64) -> Self {
        self.config.memory_threshold = threshold;
        self
    }

    /// Set the substring identifying nested layer archives.
    pub fn layer_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.layer_marker = marker.into();
        self
    }

    /// Set the size of the locator's copy buffer.
    ///
    /// The producer's read size is its own, see [`ReaderProducer::with_chunk_size`].
    ///
    /// [`ReaderProducer::with_chunk_size`]: crate::ReaderProducer::with_chunk_size
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the number of chunks in flight per conduit.
    pub fn conduit_depth(mut self, depth: usize) -> Self {
        self.config.conduit_depth = depth.max(1);
        self
    }

    /// Set the pipeline style options.
    pub fn style_options(mut self, style_options: StyleOptions) -> Self {
        self.config.style_options = style_options;
        self
    }

    /// Set callback for when the pipeline ends, successfully or not.
    ///
    /// # Example
    ///
    /// ```rust
    /// use siphon::pipeline::{PipelineBuilder, Status};
    ///
    /// let pipeline = PipelineBuilder::new()
    ///     .on_complete(|summary| {
    ///         match summary.status() {
    ///             Status::Success => println!("[Success] {} bytes", summary.forwarded()),
    ///             Status::Fail(error) => println!("[Failed] {}", error),
    ///             _ => {}
    ///         }
    ///     })
    ///     .build();
    /// ```
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Summary) + Send + Sync + 'static,
    {
        self.config.on_complete = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Create the [`Pipeline`] with the specified options.
    pub fn build(self) -> Pipeline {
        Pipeline::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let pipeline = PipelineBuilder::new().build();

        assert_eq!(pipeline.mode(), &Mode::Direct);
        assert_eq!(pipeline.memory_threshold(), 0);
        assert_eq!(pipeline.layer_marker(), ".tar");
        assert_eq!(pipeline.chunk_size(), 64 * 1024);
        assert_eq!(pipeline.conduit_depth(), 1);
        assert_eq!(pipeline.scratch_dir(), &std::env::temp_dir());
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let pipeline = PipelineBuilder::hidden()
            .chunk_size(0)
            .conduit_depth(0)
            .build();

        assert_eq!(pipeline.chunk_size(), 1);
        assert_eq!(pipeline.conduit_depth(), 1);
        assert!(!pipeline.style_options().is_enabled());
    }
}
