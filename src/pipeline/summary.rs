//! Pipeline summary functionality.
//!
//! This module contains the [`Summary`] struct and [`Status`] enum describing
//! how a pipeline run ended: how many bytes the export produced, how many
//! reached the sink and, in selective mode, which layer was forwarded.
//!
//! # Examples
//!
//! ```rust
//! use siphon::pipeline::{Mode, Status, Summary};
//!
//! let summary = Summary::new(Mode::Direct)
//!     .with_exported(4096)
//!     .with_forwarded(4096)
//!     .with_status(Status::Success);
//!
//! assert_eq!(summary.status(), &Status::Success);
//! assert_eq!(summary.forwarded(), 4096);
//! assert!(summary.layer().is_none());
//! ```

use super::config::Mode;

/// Pipeline status enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// The pipeline has not reached a terminal state.
    NotStarted,
    /// The producer finished and the sink was committed.
    Success,
    /// The pipeline failed with the dominant cause.
    Fail(String),
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct Summary {
    mode: Mode,
    /// Bytes the producer wrote.
    exported: u64,
    /// Bytes accepted by the sink.
    forwarded: u64,
    /// Archive entries decoded.
    entries: u64,
    /// Candidate layers hashed.
    candidates: usize,
    /// Name of the forwarded layer.
    layer: Option<String>,
    /// Why the direct-mode observer stopped decoding.
    decode_error: Option<String>,
    status: Status,
}

impl Summary {
    /// Create a new [`Summary`] for a run in `mode`.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            exported: 0,
            forwarded: 0,
            entries: 0,
            candidates: 0,
            layer: None,
            decode_error: None,
            status: Status::NotStarted,
        }
    }

    /// Attach a status.
    pub fn with_status(self, status: Status) -> Self {
        Self { status, ..self }
    }

    /// Record the bytes the producer wrote.
    pub fn with_exported(self, exported: u64) -> Self {
        Self { exported, ..self }
    }

    /// Record the bytes accepted by the sink.
    pub fn with_forwarded(self, forwarded: u64) -> Self {
        Self { forwarded, ..self }
    }

    /// Record the entries decoded and candidates hashed.
    pub fn with_entries(self, entries: u64, candidates: usize) -> Self {
        Self {
            entries,
            candidates,
            ..self
        }
    }

    /// Record the forwarded layer.
    pub fn with_layer(self, layer: impl Into<String>) -> Self {
        Self {
            layer: Some(layer.into()),
            ..self
        }
    }

    /// Record that the export could not be decoded as an archive.
    ///
    /// In direct mode this does not fail the run.
    pub fn with_decode_error(self, error: impl Into<String>) -> Self {
        Self {
            decode_error: Some(error.into()),
            ..self
        }
    }

    /// Mark the summary as failed with a message.
    pub fn fail(self, msg: impl std::fmt::Display) -> Self {
        Self {
            status: Status::Fail(format!("{}", msg)),
            ..self
        }
    }

    /// Get the mode the pipeline ran in.
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Get the bytes the producer wrote.
    pub fn exported(&self) -> u64 {
        self.exported
    }

    /// Get the bytes accepted by the sink.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Get the number of archive entries decoded.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Get the number of candidate layers hashed.
    pub fn candidates(&self) -> usize {
        self.candidates
    }

    /// Get the name of the forwarded layer, selective mode only.
    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    /// Get the decode error seen while observing a direct-mode export.
    pub fn decode_error(&self) -> Option<&str> {
        self.decode_error.as_deref()
    }

    /// Get a reference to the summary's status.
    pub fn status(&self) -> &Status {
        &self.status
    }
}
