//! Disposable seekable storage for one candidate entry.
//!
//! A [`ScratchStore`] hands out at most one live [`ScratchBuffer`] at a time.
//! Small entries (at or below the store's memory threshold) are kept in
//! memory, everything else goes to a randomly named file in the scratch
//! directory. The file is removed by [`ScratchBuffer::discard`], or on drop
//! if the buffer is abandoned on an error path.
//!
//! # Examples
//!
//! ```rust
//! use siphon::scratch::ScratchStore;
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! # #[tokio::main]
//! # async fn main() -> siphon::Result<()> {
//! let store = ScratchStore::new(std::env::temp_dir(), 0);
//! let mut buffer = store.create(5)?;
//! buffer.write_all(b"bytes").await?;
//! buffer.rewind().await?;
//!
//! let mut out = Vec::new();
//! buffer.read_to_end(&mut out).await?;
//! assert_eq!(out, b"bytes");
//!
//! buffer.discard()?;
//! assert_eq!(store.live(), 0);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};

use std::io::{self, Cursor, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tracing::debug;

const SCRATCH_PREFIX: &str = "layer";

/// Factory for [`ScratchBuffer`]s.
#[derive(Debug, Clone)]
pub struct ScratchStore {
    dir: PathBuf,
    memory_threshold: u64,
    live: Arc<AtomicUsize>,
}

impl ScratchStore {
    /// Create a store writing files into `dir`.
    ///
    /// Entries of `memory_threshold` bytes or less are buffered in memory.
    /// A threshold of `0` puts every non-empty entry on disk.
    pub fn new(dir: impl Into<PathBuf>, memory_threshold: u64) -> Self {
        Self {
            dir: dir.into(),
            memory_threshold,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Directory holding scratch files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Size at or below which buffers stay in memory.
    pub fn memory_threshold(&self) -> u64 {
        self.memory_threshold
    }

    /// Number of buffers currently alive (0 or 1).
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Open a fresh buffer for an entry of `size_hint` bytes.
    ///
    /// Fails with [`Error::Internal`] if another buffer from this store is
    /// still alive.
    pub fn create(&self, size_hint: u64) -> Result<ScratchBuffer> {
        if self.live.fetch_add(1, Ordering::SeqCst) > 0 {
            self.live.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Internal(
                "a scratch buffer is already live".to_string(),
            ));
        }

        let backing = if size_hint <= self.memory_threshold {
            debug!("Buffering {} bytes in memory", size_hint);
            Backing::Memory(Cursor::new(Vec::with_capacity(size_hint as usize)))
        } else {
            match self.create_file() {
                Ok(backing) => backing,
                Err(source) => {
                    self.live.fetch_sub(1, Ordering::SeqCst);
                    return Err(Error::ScratchIo { source });
                }
            }
        };

        Ok(ScratchBuffer {
            backing: Some(backing),
            len: 0,
            live: self.live.clone(),
        })
    }

    fn create_file(&self) -> io::Result<Backing> {
        let named = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempfile_in(&self.dir)?;
        let (file, path) = named.into_parts();
        debug!("Created scratch file {:?}", &*path);
        Ok(Backing::Disk {
            file: File::from_std(file),
            path,
        })
    }
}

enum Backing {
    Memory(Cursor<Vec<u8>>),
    Disk { file: File, path: TempPath },
}

/// Seekable store for the bytes of one entry.
pub struct ScratchBuffer {
    backing: Option<Backing>,
    len: u64,
    live: Arc<AtomicUsize>,
}

impl std::fmt::Debug for ScratchBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchBuffer")
            .field("path", &self.path())
            .field("len", &self.len)
            .finish()
    }
}

impl ScratchBuffer {
    /// Bytes written so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Path of the backing file, `None` for in-memory buffers.
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Some(Backing::Disk { path, .. }) => Some(path),
            _ => None,
        }
    }

    /// Flush pending writes and seek back to the first byte.
    pub async fn rewind(&mut self) -> Result<()> {
        match self.backing_mut().map_err(scratch_io)? {
            Backing::Memory(cursor) => cursor.set_position(0),
            Backing::Disk { file, .. } => {
                file.flush().await.map_err(scratch_io)?;
                file.seek(SeekFrom::Start(0)).await.map_err(scratch_io)?;
            }
        }
        Ok(())
    }

    /// Delete the buffer, reporting a failed removal.
    pub fn discard(mut self) -> Result<()> {
        if let Some(Backing::Disk { file, path }) = self.backing.take() {
            drop(file);
            debug!("Removing scratch file {:?}", &*path);
            path.close().map_err(scratch_io)?;
        }
        Ok(())
    }

    fn backing_mut(&mut self) -> io::Result<&mut Backing> {
        self.backing
            .as_mut()
            .ok_or_else(|| io::Error::other("scratch buffer already discarded"))
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        // Dropping the TempPath removes the file.
        drop(self.backing.take());
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

fn scratch_io(source: io::Error) -> Error {
    Error::ScratchIo { source }
}

impl AsyncWrite for ScratchBuffer {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        let backing = match this.backing_mut() {
            Ok(backing) => backing,
            Err(e) => return Poll::Ready(Err(e)),
        };
        let polled = match backing {
            Backing::Memory(cursor) => Pin::new(cursor).poll_write(cx, buf),
            Backing::Disk { file, .. } => Pin::new(file).poll_write(cx, buf),
        };
        if let Poll::Ready(Ok(n)) = &polled {
            this.len += *n as u64;
        }
        polled
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.backing_mut() {
            Ok(Backing::Memory(cursor)) => Pin::new(cursor).poll_flush(cx),
            Ok(Backing::Disk { file, .. }) => Pin::new(file).poll_flush(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.backing_mut() {
            Ok(Backing::Memory(cursor)) => Pin::new(cursor).poll_shutdown(cx),
            Ok(Backing::Disk { file, .. }) => Pin::new(file).poll_shutdown(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl AsyncRead for ScratchBuffer {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.backing_mut() {
            Ok(Backing::Memory(cursor)) => Pin::new(cursor).poll_read(cx, buf),
            Ok(Backing::Disk { file, .. }) => Pin::new(file).poll_read(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}
