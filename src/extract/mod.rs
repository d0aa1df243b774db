//! Downstream consumers of the scanned export.
//!
//! - [`locator`] - [`LayerLocator`], selective mode: find, verify and forward one layer
//! - [`observer`] - [`observe`], direct mode: log the entries passing through

pub mod locator;
pub mod observer;

pub use locator::{LayerLocator, LocatedLayer, DEFAULT_CHUNK_SIZE, DEFAULT_LAYER_MARKER};
pub use observer::{observe, Observation};
