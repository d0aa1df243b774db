//! Progress module containing progress bar functionality.
//!
//! This module provides progress bar styling and display management for the
//! export pipeline: a spinner for the raw export stream and a bar for every
//! candidate layer being verified.
//!
//! # Overview
//!
//! The progress module is organized into two main components:
//!
//! - `style` - Progress bar styling options and templates
//! - `display` - Progress bar display management and coordination
//!
//! # Examples
//!
//! ## Using with the pipeline
//!
//! ```rust
//! use siphon::pipeline::PipelineBuilder;
//! use siphon::progress::StyleOptions;
//!
//! let pipeline = PipelineBuilder::new()
//!     .style_options(StyleOptions::default())
//!     .build();
//! ```
//!
//! ## Hidden Progress Bars
//!
//! ```rust
//! use siphon::pipeline::PipelineBuilder;
//!
//! let pipeline = PipelineBuilder::hidden().build();
//! assert!(!pipeline.style_options().is_enabled());
//! ```

pub(crate) mod display;
pub(crate) mod style;

pub use display::ProgressDisplay;
pub use style::{ProgressBarOpts, StyleOptions};
