//! Siphon is a crate streaming one slice out of a container export into an
//! object store, without holding the export in memory.
//!
//! In direct mode the whole export is forwarded while its entries are
//! logged. In selective mode the export is an image archive whose layers are
//! nested tar archives, and only the layer with a given SHA-256 digest is
//! forwarded.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use siphon::{FileSink, PipelineBuilder, ReaderProducer, TargetDigest, Error};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Error> {
//! let export = tokio::fs::File::open("image.tar").await?;
//! let pipeline = PipelineBuilder::new()
//!     .selective(TargetDigest::new("sha256:5f70bf18a086007016e948b04aed3b82103a36bea41755b6cddfaf10ace3c6ef"))
//!     .build();
//! let summary = pipeline
//!     .run(ReaderProducer::new(export), FileSink::new("layer.tar"))
//!     .await?;
//! println!("{} bytes forwarded", summary.forwarded());
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! The siphon crate is organized into several modules:
//!
//! - [`archive`] - Forward-only tar decoding with bounded entry bodies
//! - [`conduit`] - Bounded byte conduits and the duplicating relay
//! - [`digest`] - Streaming SHA-256 and the target digest
//! - [`endpoint`] - The export producer and object sink contracts
//! - [`error`] - Centralized error handling with the `Error` enum
//! - [`extract`] - The layer locator and the direct mode observer
//! - [`logging`] - `tracing` subscriber setup
//! - [`pipeline`] - The `Pipeline` and `PipelineBuilder` orchestrating a run
//! - [`progress`] - Progress bar styling and display management
//! - [`scratch`] - Scratch buffers for candidate layers

pub mod archive;
pub mod conduit;
pub mod digest;
pub mod endpoint;
pub mod error;
pub mod extract;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod scratch;

pub use digest::{sha256_hex, HashingWriter, TargetDigest};
pub use endpoint::{ExportProducer, FileSink, ObjectSink, ReaderProducer, SinkGuard};
pub use error::{BoxError, Error, Result};
pub use pipeline::{Mode, Pipeline, PipelineBuilder, Status, Summary};
pub use progress::{ProgressBarOpts, StyleOptions};
