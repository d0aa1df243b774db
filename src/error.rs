//! Error handling for the Siphon library.
//!
//! This module provides centralized error handling for every stage of the
//! export pipeline. Each variant names the stage or contract that failed so
//! the orchestrator can pick one dominant cause when several stages stop at
//! once.

use std::io;
use thiserror::Error;

/// Boxed error returned by external collaborators (export runtime, object store).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can happen when using Siphon.
#[derive(Error, Debug)]
pub enum Error {
    /// The export collaborator failed while producing the stream.
    #[error("Export failed: {source}")]
    Producer { source: BoxError },

    /// A tar header could not be decoded.
    ///
    /// Returned for bad checksums, unparsable size fields and archives that
    /// end in the middle of a header or an entry body.
    #[error("Malformed tar archive at offset {offset}: {message}")]
    Decode { offset: u64, message: String },

    /// A read asked for more bytes than the current entry holds.
    #[error("Read of {requested} bytes exceeds the {remaining} bytes left in entry {name:?}")]
    Bounds {
        name: String,
        requested: u64,
        remaining: u64,
    },

    /// The content of an entry was read after the scanner advanced past it.
    #[error("Entry {name:?} is no longer readable, the scanner has moved on")]
    StaleEntry { name: String },

    /// The archive ended without an entry matching the target digest.
    #[error("No layer with digest {digest} found after {candidates} candidate(s)")]
    NotFound { digest: String, candidates: usize },

    /// The destination failed to accept a write or a close.
    #[error("Sink error: {source}")]
    Sink { source: BoxError },

    /// Local scratch storage could not be created, written or removed.
    #[error("Scratch buffer I/O error: {source}")]
    ScratchIo {
        #[source]
        source: io::Error,
    },

    /// The reading side of a conduit went away.
    #[error("Conduit closed by its reader")]
    ConduitClosed,

    /// An upstream stage aborted the conduit this stage was reading.
    #[error("Stream aborted upstream: {0}")]
    Aborted(String),

    /// I/O Error.
    #[error("I/O error")]
    IOError {
        #[from]
        source: io::Error,
    },

    /// Error from an underlying system.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a collaborator error raised by the export producer.
    pub fn producer(source: impl Into<BoxError>) -> Self {
        Error::Producer {
            source: source.into(),
        }
    }

    /// Wrap a collaborator error raised by the sink.
    pub fn sink(source: impl Into<BoxError>) -> Self {
        Error::Sink {
            source: source.into(),
        }
    }

    pub(crate) fn decode(offset: u64, message: impl Into<String>) -> Self {
        Error::Decode {
            offset,
            message: message.into(),
        }
    }

    /// Returns `true` for errors that only report that another stage stopped.
    ///
    /// These never win over the error of the stage that actually failed.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::ConduitClosed | Error::Aborted(_))
    }
}

/// Result type alias for operations that can fail with a Siphon error.
pub type Result<T> = std::result::Result<T, Error>;
