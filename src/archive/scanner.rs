//! Sequential tar entry scanner.
//!
//! [`EntryScanner`] decodes one header per [`EntryScanner::next_entry`] call
//! and exposes the entry's body through [`EntryScanner::content`], bounded to
//! exactly the size recorded in the header. Asking for the next entry skips
//! whatever is left of the current body, after which the old [`TarEntry`]
//! can no longer be read ([`Error::StaleEntry`]).
//!
//! The scanner only moves forward. To decode the same archive again, create
//! a new scanner over a fresh stream.
//!
//! # Examples
//!
//! ```rust
//! use siphon::archive::{EntryKind, EntryScanner};
//!
//! # #[tokio::main]
//! # async fn main() -> siphon::Result<()> {
//! # let mut builder = tar::Builder::new(Vec::new());
//! # let mut header = tar::Header::new_ustar();
//! # header.set_size(5);
//! # header.set_cksum();
//! # builder.append_data(&mut header, "hello.txt", &b"hello"[..]).unwrap();
//! # let archive = builder.into_inner().unwrap();
//! let mut scanner = EntryScanner::new(&archive[..]);
//! while let Some(entry) = scanner.next_entry().await? {
//!     if entry.kind == EntryKind::File {
//!         let body = scanner.content(&entry)?.read_to_end().await?;
//!         println!("{} has {} bytes", entry.name, body.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use super::header::{self, is_zero_block, parse_header, parse_pax, EntryKind, HeaderType, BLOCK_SIZE};
use crate::conduit::classify_io;
use crate::error::{Error, Result};

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

/// Largest GNU long name or PAX body the scanner buffers.
const MAX_METADATA_SIZE: u64 = 1024 * 1024;

const SKIP_BUFFER_SIZE: usize = 8 * 1024;

/// One member of a tar archive.
///
/// Holds the header fields only; read the body with
/// [`EntryScanner::content`] before asking for the next entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarEntry {
    /// Path recorded in the archive.
    pub name: String,
    /// Size of the body in bytes.
    pub size: u64,
    /// Kind of member.
    pub kind: EntryKind,
    /// Position in the archive, starting at 0.
    index: u64,
    /// Stream offset of the first body byte.
    data_offset: u64,
}

impl TarEntry {
    /// Position of this entry in the archive, starting at 0.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Stream offset of the first byte of the body.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }
}

#[derive(Debug)]
struct Current {
    index: u64,
    name: String,
    remaining: u64,
    padding: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scanning,
    Finished,
    Failed,
}

/// Lazy decoder of a tar byte stream.
#[derive(Debug)]
pub struct EntryScanner<R> {
    reader: R,
    offset: u64,
    current: Option<Current>,
    next_index: u64,
    state: ScanState,
}

impl<R: AsyncRead + Unpin> EntryScanner<R> {
    /// Creates a new [`EntryScanner`] reading from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            current: None,
            next_index: 0,
            state: ScanState::Scanning,
        }
    }

    /// Number of entries returned so far.
    pub fn entries_seen(&self) -> u64 {
        self.next_index
    }

    /// Bytes consumed from the underlying stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns `true` once the end-of-archive marker has been read.
    pub fn is_finished(&self) -> bool {
        self.state == ScanState::Finished
    }

    /// Decode the next entry.
    ///
    /// Returns `Ok(None)` at the end of the archive. A decode error ends the
    /// sequence: later calls return `Ok(None)`.
    pub async fn next_entry(&mut self) -> Result<Option<TarEntry>> {
        if self.state != ScanState::Scanning {
            return Ok(None);
        }
        match self.advance().await {
            Ok(entry) => {
                if entry.is_none() {
                    debug!("End of archive after {} entries", self.next_index);
                    self.state = ScanState::Finished;
                }
                Ok(entry)
            }
            Err(e) => {
                self.state = ScanState::Failed;
                self.current = None;
                Err(e)
            }
        }
    }

    /// Body of `entry`, which must be the entry most recently returned.
    pub fn content(&mut self, entry: &TarEntry) -> Result<EntryContent<'_, R>> {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|current| current.index == entry.index);
        if !is_current {
            return Err(Error::StaleEntry {
                name: entry.name.clone(),
            });
        }
        Ok(EntryContent { scanner: self })
    }

    /// Read and discard everything left in the stream.
    ///
    /// No entries are decoded. Returns the number of bytes discarded.
    pub async fn drain(&mut self) -> Result<u64> {
        self.current = None;
        if self.state == ScanState::Scanning {
            self.state = ScanState::Finished;
        }
        let mut buf = vec![0u8; SKIP_BUFFER_SIZE];
        let mut drained = 0;
        loop {
            let n = self.reader.read(&mut buf).await.map_err(classify_io)?;
            if n == 0 {
                break;
            }
            drained += n as u64;
            self.offset += n as u64;
        }
        Ok(drained)
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> R {
        self.reader
    }

    async fn advance(&mut self) -> Result<Option<TarEntry>> {
        if let Some(current) = self.current.take() {
            trace!(
                "Skipping {} unread bytes of {:?}",
                current.remaining,
                current.name
            );
            // Cannot overflow: the span was checked when the header was read.
            self.skip(current.remaining + current.padding).await?;
        }

        let mut long_name: Option<String> = None;
        let mut pax_path: Option<String> = None;
        let mut pax_size: Option<u64> = None;

        loop {
            let header_offset = self.offset;
            let Some(block) = self.read_block().await? else {
                // Stream ended cleanly on a header boundary.
                return Ok(None);
            };

            if is_zero_block(&block) {
                return match self.read_block().await? {
                    None => Ok(None),
                    Some(second) if is_zero_block(&second) => Ok(None),
                    Some(_) => Err(Error::decode(
                        header_offset,
                        "single zero block followed by data",
                    )),
                };
            }

            let parsed = parse_header(&block, header_offset)?;
            match parsed.kind {
                HeaderType::GnuLongName => {
                    let data = self.read_metadata(parsed.size, header_offset).await?;
                    long_name = Some(header::field_str(&data));
                }
                HeaderType::PaxLocal => {
                    let data = self.read_metadata(parsed.size, header_offset).await?;
                    let (path, size) = parse_pax(&data, header_offset)?;
                    pax_path = path.or(pax_path);
                    pax_size = size.or(pax_size);
                }
                HeaderType::PaxGlobal => {
                    self.skip(header::span(parsed.size, header_offset)?).await?;
                }
                HeaderType::Member(kind) => {
                    let name = pax_path.or(long_name).unwrap_or(parsed.name);
                    let size = match parsed.header_only {
                        true => 0,
                        false => pax_size.unwrap_or(parsed.size),
                    };
                    let padding = header::span(size, header_offset)? - size;
                    let index = self.next_index;
                    self.next_index += 1;

                    trace!("Entry {} {:?} ({:?}, {} bytes)", index, name, kind, size);
                    self.current = Some(Current {
                        index,
                        name: name.clone(),
                        remaining: size,
                        padding,
                    });
                    return Ok(Some(TarEntry {
                        name,
                        size,
                        kind,
                        index,
                        data_offset: self.offset,
                    }));
                }
            }
        }
    }

    /// Read one block. `None` on end of stream before its first byte.
    async fn read_block(&mut self) -> Result<Option<[u8; BLOCK_SIZE]>> {
        let mut block = [0u8; BLOCK_SIZE];
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            let n = self
                .reader
                .read(&mut block[filled..])
                .await
                .map_err(classify_io)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        self.offset += filled as u64;

        match filled {
            0 => Ok(None),
            BLOCK_SIZE => Ok(Some(block)),
            _ => Err(Error::decode(
                self.offset - filled as u64,
                format!("truncated header ({} of {} bytes)", filled, BLOCK_SIZE),
            )),
        }
    }

    async fn read_metadata(&mut self, size: u64, header_offset: u64) -> Result<Vec<u8>> {
        if size > MAX_METADATA_SIZE {
            return Err(Error::decode(
                header_offset,
                format!("extended header of {} bytes is too large", size),
            ));
        }
        let mut data = vec![0u8; size as usize];
        self.fill(&mut data).await?;
        self.skip(header::padding(size)).await?;
        Ok(data)
    }

    async fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .reader
                .read(&mut buf[filled..])
                .await
                .map_err(classify_io)?;
            if n == 0 {
                return Err(Error::decode(self.offset, "archive truncated"));
            }
            filled += n;
            self.offset += n as u64;
        }
        Ok(())
    }

    async fn skip(&mut self, mut count: u64) -> Result<()> {
        let mut buf = [0u8; SKIP_BUFFER_SIZE];
        while count > 0 {
            let want = count.min(SKIP_BUFFER_SIZE as u64) as usize;
            self.fill(&mut buf[..want]).await?;
            count -= want as u64;
        }
        Ok(())
    }
}

/// Bounded view over the body of the current entry.
///
/// Borrows the scanner, so the scanner cannot advance while it is alive.
#[derive(Debug)]
pub struct EntryContent<'a, R> {
    scanner: &'a mut EntryScanner<R>,
}

impl<R: AsyncRead + Unpin> EntryContent<'_, R> {
    /// Bytes of the body not read yet.
    pub fn remaining(&self) -> u64 {
        self.scanner.current.as_ref().map_or(0, |c| c.remaining)
    }

    /// Read up to `buf.len()` bytes of the body. `Ok(0)` at its end.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(remaining) as usize;
        let n = self
            .scanner
            .reader
            .read(&mut buf[..want])
            .await
            .map_err(classify_io)?;
        if n == 0 {
            let offset = self.scanner.offset;
            self.scanner.state = ScanState::Failed;
            self.scanner.current = None;
            return Err(Error::decode(
                offset,
                format!("archive truncated with {} bytes of entry left", remaining),
            ));
        }
        self.scanner.offset += n as u64;
        if let Some(current) = self.scanner.current.as_mut() {
            current.remaining -= n as u64;
        }
        Ok(n)
    }

    /// Fill `buf` completely from the body.
    ///
    /// Fails with [`Error::Bounds`] without consuming anything if the body
    /// has fewer than `buf.len()` bytes left.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let remaining = self.remaining();
        if buf.len() as u64 > remaining {
            let name = self
                .scanner
                .current
                .as_ref()
                .map(|c| c.name.clone())
                .unwrap_or_default();
            return Err(Error::Bounds {
                name,
                requested: buf.len() as u64,
                remaining,
            });
        }
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.read(&mut buf[filled..]).await?;
        }
        Ok(())
    }

    /// Read the rest of the body into memory.
    ///
    /// Memory grows with the bytes actually read, not with the size the
    /// header claims.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = [0u8; SKIP_BUFFER_SIZE];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out)
    }

    /// Discard the rest of the body.
    pub async fn skip_rest(&mut self) -> Result<()> {
        let mut buf = [0u8; SKIP_BUFFER_SIZE];
        while self.read(&mut buf).await? > 0 {}
        Ok(())
    }
}
