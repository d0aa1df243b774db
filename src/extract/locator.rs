//! Selective extraction of one layer from an image export.
//!
//! The export is a tar archive whose layers are themselves tar archives. The
//! digest of a layer is only known once all of it has been read, so every
//! candidate is written to a scratch buffer while it is hashed, and only
//! replayed into the sink when its digest matches the target. The first
//! matching layer wins; the scan stops there.
//!
//! # Examples
//!
//! ```rust,no_run
//! use siphon::archive::EntryScanner;
//! use siphon::endpoint::{FileSink, SinkGuard};
//! use siphon::extract::LayerLocator;
//! use siphon::scratch::ScratchStore;
//! use siphon::TargetDigest;
//!
//! # #[tokio::main]
//! # async fn main() -> siphon::Result<()> {
//! let export = tokio::fs::File::open("image.tar").await?;
//! let mut scanner = EntryScanner::new(export);
//! let mut sink = SinkGuard::new(FileSink::new("layer.tar"));
//!
//! let locator = LayerLocator::new(
//!     ScratchStore::new(std::env::temp_dir(), 0),
//!     TargetDigest::new("sha256:5f70bf18a086007016e948b04aed3b82103a36bea41755b6cddfaf10ace3c6ef"),
//! );
//! let found = locator.locate(&mut scanner, &mut sink).await?;
//! println!("{} ({} bytes)", found.name, found.size);
//! # Ok(())
//! # }
//! ```

use crate::archive::{EntryKind, EntryScanner, TarEntry};
use crate::digest::{HashingWriter, TargetDigest};
use crate::endpoint::{ObjectSink, SinkGuard};
use crate::error::{Error, Result};
use crate::progress::ProgressDisplay;
use crate::scratch::{ScratchBuffer, ScratchStore};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Default substring identifying nested layer archives.
pub const DEFAULT_LAYER_MARKER: &str = ".tar";

/// Default copy buffer size.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// The layer that was forwarded to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedLayer {
    /// Entry name in the export.
    pub name: String,
    /// Bytes forwarded to the sink.
    pub size: u64,
    /// Hex SHA-256 of the forwarded bytes.
    pub digest: String,
    /// Candidates hashed, the match included.
    pub candidates: usize,
}

/// Finds the layer whose digest matches a [`TargetDigest`] and forwards it.
#[derive(Debug, Clone)]
pub struct LayerLocator {
    store: ScratchStore,
    target: TargetDigest,
    marker: String,
    chunk_size: usize,
    progress: Option<ProgressDisplay>,
}

impl LayerLocator {
    /// Creates a new [`LayerLocator`].
    pub fn new(store: ScratchStore, target: TargetDigest) -> Self {
        Self {
            store,
            target,
            marker: DEFAULT_LAYER_MARKER.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: None,
        }
    }

    /// Only entries whose name contains `marker` are candidates.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Copy candidates `chunk_size` bytes at a time.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Show a bar per candidate on `progress`.
    pub fn with_progress(mut self, progress: ProgressDisplay) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Get the target digest.
    pub fn target(&self) -> &TargetDigest {
        &self.target
    }

    /// Get the layer marker.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Returns `true` if `entry` may be a nested layer archive.
    pub fn is_candidate(&self, entry: &TarEntry) -> bool {
        entry.kind == EntryKind::File && entry.name.contains(&self.marker)
    }

    /// Scan `scanner` for the target layer and forward it to `sink`.
    ///
    /// On a match the sink is committed and the scanner is left just after
    /// the matching entry; nothing else is read. On any error, including
    /// [`Error::NotFound`] once the archive is exhausted, the sink is closed
    /// with that error before it is returned. No scratch buffer outlives
    /// this call.
    pub async fn locate<R, S>(
        &self,
        scanner: &mut EntryScanner<R>,
        sink: &mut SinkGuard<S>,
    ) -> Result<LocatedLayer>
    where
        R: AsyncRead + Unpin,
        S: ObjectSink,
    {
        match self.scan(scanner, sink).await {
            Ok(found) => Ok(found),
            Err(e) => {
                if let Err(close) = sink.fail(&e).await {
                    warn!("Sink failed to close after {}: {}", e, close);
                }
                Err(e)
            }
        }
    }

    async fn scan<R, S>(
        &self,
        scanner: &mut EntryScanner<R>,
        sink: &mut SinkGuard<S>,
    ) -> Result<LocatedLayer>
    where
        R: AsyncRead + Unpin,
        S: ObjectSink,
    {
        let mut candidates = 0;
        while let Some(entry) = scanner.next_entry().await? {
            if !self.is_candidate(&entry) {
                debug!("Skipping {:?} ({:?})", entry.name, entry.kind);
                continue;
            }
            candidates += 1;

            let (buffer, digest) = self.verify(scanner, &entry).await?;
            if !self.target.matches(&digest) {
                debug!("{} has digest {}, not the target", entry.name, digest);
                buffer.discard()?;
                continue;
            }

            info!("Found layer {} in {}", self.target, entry.name);
            let size = self.forward(buffer, sink).await?;
            return Ok(LocatedLayer {
                name: entry.name,
                size,
                digest,
                candidates,
            });
        }

        Err(Error::NotFound {
            digest: self.target.to_string(),
            candidates,
        })
    }

    /// Copy the body of `entry` into a fresh scratch buffer while hashing it.
    async fn verify<R: AsyncRead + Unpin>(
        &self,
        scanner: &mut EntryScanner<R>,
        entry: &TarEntry,
    ) -> Result<(ScratchBuffer, String)> {
        debug!("Hashing candidate {:?} ({} bytes)", entry.name, entry.size);
        let pb = self
            .progress
            .as_ref()
            .map(|display| display.create_child_progress(entry.size, &entry.name));

        let mut writer = HashingWriter::new(self.store.create(entry.size)?);
        let mut content = scanner.content(entry)?;
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = content.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .await
                .map_err(|source| Error::ScratchIo { source })?;
            if let Some(ref pb) = pb {
                pb.inc(n as u64);
            }
        }
        writer
            .flush()
            .await
            .map_err(|source| Error::ScratchIo { source })?;

        if let (Some(display), Some(pb)) = (self.progress.as_ref(), pb) {
            display.finish_child(pb);
        }
        let (buffer, digest) = writer.into_parts();
        Ok((buffer, hex::encode(digest)))
    }

    /// Replay a verified buffer into the sink, commit it and delete the buffer.
    async fn forward<S: ObjectSink>(
        &self,
        mut buffer: ScratchBuffer,
        sink: &mut SinkGuard<S>,
    ) -> Result<u64> {
        buffer.rewind().await?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut forwarded = 0u64;
        loop {
            let n = buffer
                .read(&mut buf)
                .await
                .map_err(|source| Error::ScratchIo { source })?;
            if n == 0 {
                break;
            }
            sink.write(&buf[..n]).await?;
            forwarded += n as u64;
        }
        sink.commit().await?;
        buffer.discard()?;
        info!("Forwarded {} bytes", forwarded);
        Ok(forwarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::header::tests::ustar_block;
    use crate::archive::{header, BLOCK_SIZE};
    use crate::digest::sha256_hex;
    use crate::endpoint::SinkState;
    use crate::error::BoxError;
    use async_trait::async_trait;

    #[derive(Debug, Default)]
    struct VecSink {
        data: Vec<u8>,
        closed_with: Option<Option<String>>,
    }

    #[async_trait]
    impl ObjectSink for VecSink {
        async fn write(&mut self, data: &[u8]) -> std::result::Result<(), BoxError> {
            self.data.extend_from_slice(data);
            Ok(())
        }

        async fn close(&mut self, failure: Option<&Error>) -> std::result::Result<(), BoxError> {
            self.closed_with = Some(failure.map(|e| e.to_string()));
            Ok(())
        }
    }

    fn archive(entries: &[(&str, &[u8], u8)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, body, flag) in entries {
            out.extend_from_slice(&ustar_block(name, body.len() as u64, *flag));
            out.extend_from_slice(body);
            out.resize(out.len() + header::padding(body.len() as u64) as usize, 0);
        }
        out.extend_from_slice(&[0u8; BLOCK_SIZE * 2]);
        out
    }

    fn locator(dir: &std::path::Path, target: &[u8]) -> LayerLocator {
        LayerLocator::new(ScratchStore::new(dir, 0), TargetDigest::new(sha256_hex(target)))
            .with_chunk_size(7)
    }

    #[tokio::test]
    async fn test_candidate_filter() {
        let dir = tempfile::tempdir().unwrap();
        let locator = locator(dir.path(), b"");
        let data = archive(&[
            ("abc/layer.tar", b"x", b'0'),
            ("abc/json", b"{}", b'0'),
            ("abc.tar/", b"", b'5'),
            ("link.tar", b"", b'2'),
        ]);
        let mut scanner = EntryScanner::new(&data[..]);

        let mut verdicts = Vec::new();
        while let Some(entry) = scanner.next_entry().await.unwrap() {
            verdicts.push(locator.is_candidate(&entry));
        }
        assert_eq!(verdicts, [true, false, false, false]);
    }

    #[tokio::test]
    async fn test_skips_non_candidates_and_forwards_match() {
        let dir = tempfile::tempdir().unwrap();
        let data = archive(&[
            ("manifest.json", b"{}", b'0'),
            ("a/", b"", b'5'),
            ("a/layer.tar", b"the layer body", b'0'),
            ("b/layer.tar", b"another layer", b'0'),
        ]);
        let mut scanner = EntryScanner::new(&data[..]);
        let mut sink = SinkGuard::new(VecSink::default());

        let found = locator(dir.path(), b"the layer body")
            .locate(&mut scanner, &mut sink)
            .await
            .unwrap();

        assert_eq!(found.name, "a/layer.tar");
        assert_eq!(found.size, 14);
        assert_eq!(found.candidates, 1);
        assert_eq!(sink.state(), SinkState::Committed);
        assert_eq!(sink.get_ref().data, b"the layer body");
        assert_eq!(sink.get_ref().closed_with, Some(None));
        // The scan stopped at the match.
        assert_eq!(scanner.entries_seen(), 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_decode_error_closes_sink_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = archive(&[("a/layer.tar", &[9u8; 600], b'0')]);
        data.truncate(BLOCK_SIZE + 100);
        let mut scanner = EntryScanner::new(&data[..]);
        let mut sink = SinkGuard::new(VecSink::default());

        let err = locator(dir.path(), b"whatever")
            .locate(&mut scanner, &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Decode { .. }));
        assert_eq!(sink.state(), SinkState::Failed);
        assert!(sink.get_ref().data.is_empty());
        assert!(matches!(sink.get_ref().closed_with, Some(Some(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
