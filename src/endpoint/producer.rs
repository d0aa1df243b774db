//! The export side of the pipeline.

use crate::conduit::ConduitWriter;
use crate::error::BoxError;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Source of a tar formatted export stream.
///
/// Implementations write the whole export into `out` and return. They must
/// not close `out`; the pipeline closes it once `export` returns `Ok`, and
/// aborts it with the error otherwise. A failed write to `out` means the
/// pipeline is shutting down; propagate it with `?`.
#[async_trait]
pub trait ExportProducer: Send {
    /// Stream the export into `out`.
    async fn export(&mut self, out: &mut ConduitWriter) -> Result<(), BoxError>;
}

/// Exports whatever an [`AsyncRead`] yields.
///
/// Useful for a previously saved export file or the stdout of a child
/// process running the container runtime's export command.
///
/// ```rust,no_run
/// use siphon::endpoint::ReaderProducer;
///
/// # async fn example() -> std::io::Result<()> {
/// let file = tokio::fs::File::open("image.tar").await?;
/// let producer = ReaderProducer::new(file);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ReaderProducer<R> {
    reader: R,
    chunk_size: usize,
}

impl<R> ReaderProducer<R> {
    /// Default read size.
    pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

    /// Creates a new [`ReaderProducer`].
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, Self::DEFAULT_CHUNK_SIZE)
    }

    /// Creates a new [`ReaderProducer`] reading `chunk_size` bytes at a time.
    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ExportProducer for ReaderProducer<R> {
    async fn export(&mut self, out: &mut ConduitWriter) -> Result<(), BoxError> {
        let mut buf = BytesMut::with_capacity(self.chunk_size);
        loop {
            buf.resize(self.chunk_size, 0);
            let n = self.reader.read(&mut buf[..]).await?;
            if n == 0 {
                break;
            }
            buf.truncate(n);
            out.send_bytes(buf.split().freeze()).await?;
        }
        debug!("Reader exhausted after {} bytes", out.written());
        Ok(())
    }
}
