//! Streaming SHA-256 over an async write destination.
//!
//! [`HashingWriter`] forwards every write to the wrapped destination unchanged
//! and folds exactly the bytes the destination accepted into a running
//! SHA-256 state. It keeps no buffer of its own.
//!
//! # Examples
//!
//! ```rust
//! use siphon::digest::{sha256_hex, HashingWriter};
//! use tokio::io::AsyncWriteExt;
//!
//! # #[tokio::main]
//! # async fn main() -> std::io::Result<()> {
//! let mut writer = HashingWriter::new(Vec::new());
//! writer.write_all(b"layer bytes").await?;
//! writer.flush().await?;
//!
//! assert_eq!(writer.hex_digest(), sha256_hex(b"layer bytes"));
//! assert_eq!(writer.bytes_written(), 11);
//! # Ok(())
//! # }
//! ```

use sha2::{Digest, Sha256};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// Hex encoded SHA-256 of an in-memory buffer.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// An [`AsyncWrite`] adapter that hashes everything written through it.
#[derive(Debug)]
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W> HashingWriter<W> {
    /// Wrap `inner`, starting from an empty digest.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Number of bytes accepted by the destination so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Borrow the destination.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the destination.
    ///
    /// Bytes written directly to it are not hashed.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Digest of everything written so far.
    ///
    /// Only meaningful once all writes have completed.
    pub fn digest(&self) -> [u8; 32] {
        self.hasher.clone().finalize().into()
    }

    /// Lower-case hex form of [`HashingWriter::digest`].
    pub fn hex_digest(&self) -> String {
        hex::encode(self.digest())
    }

    /// Split into the destination and the final digest.
    pub fn into_parts(self) -> (W, [u8; 32]) {
        (self.inner, self.hasher.finalize().into())
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for HashingWriter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.hasher.update(&buf[..n]);
                this.written += n as u64;
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
