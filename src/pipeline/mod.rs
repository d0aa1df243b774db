//! Pipeline module containing the orchestrator, its builder and configuration.
//!
//! This module provides the main [`Pipeline`] struct and its associated
//! builder for configuring and running an export extraction. It owns the
//! producer task, wires the relay, scanner and locator together, and reduces
//! the results of every stage to one outcome.
//!
//! # Overview
//!
//! The pipeline module is organized into four components:
//!
//! - `pipeline` - Core Pipeline struct with the task orchestration logic
//! - `builder` - PipelineBuilder for flexible configuration using the builder pattern
//! - `config` - Configuration structures, the extraction mode and callback types
//! - `summary` - The outcome of a run
//!
//! # Examples
//!
//! ## Direct mode
//!
//! ```rust,no_run
//! use siphon::endpoint::{FileSink, ReaderProducer};
//! use siphon::pipeline::PipelineBuilder;
//!
//! # #[tokio::main]
//! # async fn main() -> siphon::Result<()> {
//! let export = tokio::fs::File::open("container.tar").await?;
//! let summary = PipelineBuilder::new()
//!     .direct()
//!     .build()
//!     .run(ReaderProducer::new(export), FileSink::new("backup/container.tar"))
//!     .await?;
//! println!("{} entries, {} bytes", summary.entries(), summary.forwarded());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod summary;

pub use builder::PipelineBuilder;
pub use config::{CompletionCallback, Mode, PipelineConfig};
pub use pipeline::Pipeline;
pub use summary::{Status, Summary};
