//! Conduits connecting the pipeline stages.
//!
//! - [`channel`] - bounded single-producer single-consumer byte conduits
//! - [`tee`] - the duplicating relay feeding two conduits from one

pub mod channel;
pub mod tee;

pub use channel::{classify_io, conduit, ConduitReader, ConduitWriter, DEFAULT_DEPTH};
pub use tee::Tee;
