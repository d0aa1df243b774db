//! Contracts with the collaborators at both ends of the pipeline.
//!
//! - [`producer`] - [`ExportProducer`], the source of the export stream
//! - [`sink`] - [`ObjectSink`], the destination, plus [`SinkGuard`] and [`FileSink`]

pub mod producer;
pub mod sink;

pub use producer::{ExportProducer, ReaderProducer};
pub use sink::{FileSink, ObjectSink, SinkGuard, SinkState};
