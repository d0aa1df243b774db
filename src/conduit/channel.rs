//! Bounded point-to-point byte conduits.
//!
//! A conduit connects exactly one writing task to exactly one reading task.
//! It holds at most `depth` chunks in flight; a writer blocks once that many
//! chunks are waiting, so the slowest reader paces every stage upstream of
//! it.
//!
//! A conduit ends in one of three ways:
//!
//! - [`ConduitWriter::close`] delivers an orderly end of stream;
//! - [`ConduitWriter::abort`] (or dropping the writer) delivers an error to
//!   the reader as [`Error::Aborted`] without waiting for room;
//! - dropping the [`ConduitReader`] makes every later write fail with
//!   [`Error::ConduitClosed`], which unblocks a writer waiting for space.
//!
//! # Examples
//!
//! ```rust
//! use siphon::conduit::conduit;
//! use tokio::io::AsyncReadExt;
//!
//! # #[tokio::main]
//! # async fn main() -> siphon::Result<()> {
//! let (mut writer, mut reader) = conduit(1);
//!
//! let producer = tokio::spawn(async move {
//!     writer.write(b"hello ").await?;
//!     writer.write(b"world").await?;
//!     writer.close().await
//! });
//!
//! let mut out = String::new();
//! reader.read_to_string(&mut out).await?;
//! producer.await.unwrap()?;
//! assert_eq!(out, "hello world");
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};

use bytes::{Buf, Bytes};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

/// Default number of chunks a conduit holds in flight.
pub const DEFAULT_DEPTH: usize = 1;

enum Frame {
    Data(Bytes),
    End,
    Abort(String),
}

/// Create a conduit holding at most `depth` chunks in flight.
///
/// A depth of zero is treated as one.
pub fn conduit(depth: usize) -> (ConduitWriter, ConduitReader) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (
        ConduitWriter {
            tx: Some(tx),
            written: 0,
        },
        ConduitReader {
            rx,
            pending: Bytes::new(),
            state: ReadState::Open,
            read: 0,
        },
    )
}

/// Sending half of a conduit.
pub struct ConduitWriter {
    tx: Option<mpsc::Sender<Frame>>,
    written: u64,
}

impl fmt::Debug for ConduitWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConduitWriter")
            .field("written", &self.written)
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}

impl ConduitWriter {
    /// Send a copy of `data`, waiting for room in the conduit.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.send_bytes(Bytes::copy_from_slice(data)).await
    }

    /// Send an owned chunk, waiting for room in the conduit.
    ///
    /// Empty chunks are skipped.
    pub async fn send_bytes(&mut self, data: Bytes) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let len = data.len() as u64;
        self.send(Frame::Data(data)).await?;
        self.written += len;
        Ok(())
    }

    /// Deliver an orderly end of stream.
    pub async fn close(mut self) -> Result<()> {
        self.send(Frame::End).await?;
        self.tx = None;
        Ok(())
    }

    /// Deliver `reason` to the reader as an error.
    ///
    /// Does not wait for room: if the conduit is full the writer is simply
    /// dropped, which the reader also sees as an abort once it has consumed
    /// the chunks already queued.
    pub fn abort(mut self, reason: impl Into<String>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.try_send(Frame::Abort(reason.into()));
        }
    }

    /// Bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Returns `true` once the reader has been dropped.
    pub fn is_disconnected(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }

    async fn send(&mut self, frame: Frame) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(Error::ConduitClosed)?;
        tx.send(frame).await.map_err(|_| Error::ConduitClosed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadState {
    Open,
    Ended,
    Aborted(String),
}

/// Receiving half of a conduit.
///
/// Implements [`AsyncRead`]; an aborted conduit surfaces as an
/// [`io::Error`] that [`classify_io`] turns back into [`Error::Aborted`].
pub struct ConduitReader {
    rx: mpsc::Receiver<Frame>,
    pending: Bytes,
    state: ReadState,
    read: u64,
}

impl fmt::Debug for ConduitReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConduitReader")
            .field("read", &self.read)
            .field("state", &self.state)
            .finish()
    }
}

impl ConduitReader {
    /// Receive the next chunk, `None` at orderly end of stream.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if !self.pending.is_empty() {
            let chunk = std::mem::take(&mut self.pending);
            self.read += chunk.len() as u64;
            return Ok(Some(chunk));
        }
        match &self.state {
            ReadState::Ended => return Ok(None),
            ReadState::Aborted(reason) => return Err(Error::Aborted(reason.clone())),
            ReadState::Open => {}
        }
        loop {
            match self.rx.recv().await {
                Some(Frame::Data(chunk)) if chunk.is_empty() => continue,
                Some(Frame::Data(chunk)) => {
                    self.read += chunk.len() as u64;
                    return Ok(Some(chunk));
                }
                other => {
                    self.finish(other);
                    return match &self.state {
                        ReadState::Aborted(reason) => Err(Error::Aborted(reason.clone())),
                        _ => Ok(None),
                    };
                }
            }
        }
    }

    /// Read and discard everything up to the end of stream.
    ///
    /// Returns the number of bytes discarded.
    pub async fn drain(&mut self) -> Result<u64> {
        let mut drained = 0;
        while let Some(chunk) = self.next_chunk().await? {
            drained += chunk.len() as u64;
        }
        Ok(drained)
    }

    /// Bytes handed out so far.
    pub fn read_bytes(&self) -> u64 {
        self.read
    }

    fn finish(&mut self, frame: Option<Frame>) {
        self.state = match frame {
            Some(Frame::End) => ReadState::Ended,
            Some(Frame::Abort(reason)) => ReadState::Aborted(reason),
            Some(Frame::Data(_)) => return,
            None => ReadState::Aborted("writer dropped without closing".to_string()),
        };
        self.rx.close();
    }
}

impl AsyncRead for ConduitReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        loop {
            if !this.pending.is_empty() {
                let n = this.pending.len().min(buf.remaining());
                buf.put_slice(&this.pending[..n]);
                this.pending.advance(n);
                this.read += n as u64;
                return Poll::Ready(Ok(()));
            }
            match &this.state {
                ReadState::Ended => return Poll::Ready(Ok(())),
                ReadState::Aborted(reason) => {
                    return Poll::Ready(Err(io::Error::other(AbortSignal(reason.clone()))))
                }
                ReadState::Open => {}
            }
            match this.rx.poll_recv(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Frame::Data(chunk))) => this.pending = chunk,
                Poll::Ready(other) => this.finish(other),
            }
        }
    }
}

/// Payload of the [`io::Error`] a [`ConduitReader`] yields when aborted.
#[derive(Debug)]
struct AbortSignal(String);

impl fmt::Display for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for AbortSignal {}

/// Map an I/O error from a conduit-backed reader to a crate error.
///
/// Aborts become [`Error::Aborted`]; anything else stays an I/O error.
pub fn classify_io(error: io::Error) -> Error {
    match error.get_ref().and_then(|e| e.downcast_ref::<AbortSignal>()) {
        Some(signal) => Error::Aborted(signal.0.clone()),
        None => Error::from(error),
    }
}
