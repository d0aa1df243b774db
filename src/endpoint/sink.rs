//! The destination side of the pipeline.
//!
//! [`ObjectSink`] is the contract with the object store; [`SinkGuard`] is how
//! the pipeline drives it, making sure `close` is called exactly once; and
//! [`FileSink`] is a local implementation that only makes the object visible
//! after a successful close.

use crate::error::{BoxError, Error, Result};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Destination for the selected byte stream.
#[async_trait]
pub trait ObjectSink: Send {
    /// Append `data` to the object.
    async fn write(&mut self, data: &[u8]) -> std::result::Result<(), BoxError>;

    /// End the object.
    ///
    /// `failure` is `None` when every byte has been written and the object
    /// should be committed. Otherwise it carries the reason the transfer
    /// stopped, and the object must not become visible as complete.
    async fn close(&mut self, failure: Option<&Error>) -> std::result::Result<(), BoxError>;
}

#[async_trait]
impl<S: ObjectSink + ?Sized> ObjectSink for Box<S> {
    async fn write(&mut self, data: &[u8]) -> std::result::Result<(), BoxError> {
        (**self).write(data).await
    }

    async fn close(&mut self, failure: Option<&Error>) -> std::result::Result<(), BoxError> {
        (**self).close(failure).await
    }
}

/// How a sink was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Still accepting writes.
    Open,
    /// Closed without error, the object is committed.
    Committed,
    /// Closed with an error.
    Failed,
}

/// Wraps an [`ObjectSink`] and closes it exactly once.
#[derive(Debug)]
pub struct SinkGuard<S> {
    sink: S,
    state: SinkState,
    written: u64,
}

impl<S: ObjectSink> SinkGuard<S> {
    /// Creates a new [`SinkGuard`].
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            state: SinkState::Open,
            written: 0,
        }
    }

    /// Forward `data` to the sink.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.state != SinkState::Open {
            return Err(Error::Internal(format!(
                "write to a sink that is already {:?}",
                self.state
            )));
        }
        self.sink.write(data).await.map_err(Error::sink)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Close the sink successfully.
    ///
    /// If the close itself fails the sink counts as failed and the error is
    /// returned.
    pub async fn commit(&mut self) -> Result<()> {
        if self.state != SinkState::Open {
            return Err(Error::Internal(format!(
                "commit of a sink that is already {:?}",
                self.state
            )));
        }
        match self.sink.close(None).await {
            Ok(()) => {
                debug!("Sink committed after {} bytes", self.written);
                self.state = SinkState::Committed;
                Ok(())
            }
            Err(e) => {
                self.state = SinkState::Failed;
                Err(Error::sink(e))
            }
        }
    }

    /// Close the sink with `failure`, unless it is already closed.
    ///
    /// Returns the sink's own error if closing failed.
    pub async fn fail(&mut self, failure: &Error) -> Result<()> {
        if self.state != SinkState::Open {
            return Ok(());
        }
        debug!("Closing sink after {} bytes: {}", self.written, failure);
        self.state = SinkState::Failed;
        self.sink.close(Some(failure)).await.map_err(Error::sink)
    }

    /// Current state.
    pub fn state(&self) -> SinkState {
        self.state
    }

    /// Bytes accepted by the sink.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Borrow the wrapped sink.
    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    /// Unwrap the sink.
    pub fn into_inner(self) -> S {
        self.sink
    }
}

/// An [`ObjectSink`] backed by a local file.
///
/// Bytes go to a hidden temporary file in the destination's directory. A
/// successful close renames it over `destination`; a failed close deletes it,
/// so a partial object is never visible.
#[derive(Debug)]
pub struct FileSink {
    destination: PathBuf,
    staging: Option<(File, TempPath)>,
}

impl FileSink {
    /// Creates a new [`FileSink`] writing to `destination`.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            staging: None,
        }
    }

    /// Final path of the object.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    fn staging(&mut self) -> std::io::Result<&mut (File, TempPath)> {
        if self.staging.is_none() {
            let dir = match self.destination.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let named = tempfile::Builder::new()
                .prefix(".siphon-")
                .tempfile_in(dir)?;
            let (file, path) = named.into_parts();
            debug!("Staging object in {:?}", &*path);
            self.staging = Some((File::from_std(file), path));
        }
        self.staging
            .as_mut()
            .ok_or_else(|| std::io::Error::other("staging file unavailable"))
    }
}

#[async_trait]
impl ObjectSink for FileSink {
    async fn write(&mut self, data: &[u8]) -> std::result::Result<(), BoxError> {
        let (file, _) = self.staging()?;
        file.write_all(data).await?;
        Ok(())
    }

    async fn close(&mut self, failure: Option<&Error>) -> std::result::Result<(), BoxError> {
        if let Some(failure) = failure {
            warn!(
                "Discarding partial object for {:?}: {}",
                self.destination, failure
            );
            if let Some((file, path)) = self.staging.take() {
                drop(file);
                path.close()?;
            }
            return Ok(());
        }

        self.staging()?;
        let Some((mut file, path)) = self.staging.take() else {
            return Err("staging file unavailable".into());
        };
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        path.persist(&self.destination)?;
        debug!("Committed object {:?}", self.destination);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_sink_commit() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("layer.tar");
        let mut guard = SinkGuard::new(FileSink::new(&dest));

        guard.write(b"abc").await.unwrap();
        guard.write(b"def").await.unwrap();
        assert!(!dest.exists());
        guard.commit().await.unwrap();

        assert_eq!(guard.state(), SinkState::Committed);
        assert_eq!(std::fs::read(&dest).unwrap(), b"abcdef");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_file_sink_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("layer.tar");
        let mut guard = SinkGuard::new(FileSink::new(&dest));

        guard.write(b"partial").await.unwrap();
        guard.fail(&Error::Internal("boom".into())).await.unwrap();

        assert_eq!(guard.state(), SinkState::Failed);
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_commit_creates_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty");
        let mut guard = SinkGuard::new(FileSink::new(&dest));

        guard.commit().await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"");
    }

    #[tokio::test]
    async fn test_guard_closes_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut guard = SinkGuard::new(FileSink::new(dir.path().join("x")));

        guard.commit().await.unwrap();
        // A later failure does not reopen or re-close a committed sink.
        guard.fail(&Error::ConduitClosed).await.unwrap();
        assert_eq!(guard.state(), SinkState::Committed);
        assert!(guard.write(b"late").await.is_err());
        assert!(guard.commit().await.is_err());
    }
}
