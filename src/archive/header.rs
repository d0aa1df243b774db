//! Tar header block decoding.
//!
//! The scanner reads 512-byte blocks from an async stream; each block is
//! decoded with [`tar::Header`], which covers the v7, ustar and GNU layouts
//! and both octal and base-256 numeric fields. PAX bodies are read with
//! [`tar::PaxExtensions`].

use crate::error::{Error, Result};

use tar::{EntryType, PaxExtensions};

/// Size of a tar block.
pub const BLOCK_SIZE: usize = 512;

/// Kind of a tar entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Links, devices, FIFOs and anything else.
    Other,
}

/// What a header block describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderType {
    /// A real archive member.
    Member(EntryKind),
    /// GNU long name for the next member.
    GnuLongName,
    /// PAX extended attributes for the next member.
    PaxLocal,
    /// PAX attributes for the whole archive.
    PaxGlobal,
}

impl HeaderType {
    fn from_entry_type(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::Regular | EntryType::Continuous => HeaderType::Member(EntryKind::File),
            EntryType::Directory => HeaderType::Member(EntryKind::Directory),
            EntryType::GNULongName => HeaderType::GnuLongName,
            EntryType::XHeader => HeaderType::PaxLocal,
            EntryType::XGlobalHeader => HeaderType::PaxGlobal,
            _ => HeaderType::Member(EntryKind::Other),
        }
    }
}

/// Header-only members carry no body, whatever their size field says.
fn is_header_only(entry_type: EntryType) -> bool {
    matches!(
        entry_type,
        EntryType::Link
            | EntryType::Symlink
            | EntryType::Char
            | EntryType::Block
            | EntryType::Directory
            | EntryType::Fifo
    )
}

/// A decoded header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub name: String,
    pub size: u64,
    pub kind: HeaderType,
    /// Links, devices, FIFOs and directories: no body follows.
    pub header_only: bool,
}

/// Returns `true` for an all-zero block.
pub(crate) fn is_zero_block(block: &[u8; BLOCK_SIZE]) -> bool {
    block.iter().all(|&b| b == 0)
}

/// Decode the header block that starts at `offset` in the stream.
pub(crate) fn parse_header(block: &[u8; BLOCK_SIZE], offset: u64) -> Result<Header> {
    let header = tar::Header::from_byte_slice(block);
    verify_checksum(header, offset)?;

    let entry_type = header.entry_type();
    let header_only = is_header_only(entry_type);
    let size = match header_only {
        true => 0,
        false => header
            .entry_size()
            .map_err(|e| Error::decode(offset, format!("invalid size field: {}", e)))?,
    };
    let name = String::from_utf8_lossy(&header.path_bytes()).into_owned();

    Ok(Header {
        name,
        size,
        kind: HeaderType::from_entry_type(entry_type),
        header_only,
    })
}

fn verify_checksum(header: &tar::Header, offset: u64) -> Result<()> {
    let recorded = header
        .cksum()
        .map_err(|e| Error::decode(offset, format!("invalid checksum field: {}", e)))?;

    let mut expected = header.clone();
    expected.set_cksum();
    let computed = expected
        .cksum()
        .map_err(|e| Error::decode(offset, e.to_string()))?;

    if recorded != computed {
        return Err(Error::decode(
            offset,
            format!(
                "header checksum mismatch (recorded {}, computed {})",
                recorded, computed
            ),
        ));
    }
    Ok(())
}

/// Bytes of padding following `size` bytes of entry content.
pub(crate) fn padding(size: u64) -> u64 {
    let rem = size % BLOCK_SIZE as u64;
    if rem == 0 {
        0
    } else {
        BLOCK_SIZE as u64 - rem
    }
}

/// Bytes a body of `size` occupies in the stream, padding included.
///
/// Fails for sizes too large to be framed.
pub(crate) fn span(size: u64, offset: u64) -> Result<u64> {
    size.checked_add(padding(size))
        .ok_or_else(|| Error::decode(offset, format!("entry size {} overflows", size)))
}

/// Read a NUL-terminated text field.
pub(crate) fn field_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Extract `path` and `size` from a PAX extended header body.
pub(crate) fn parse_pax(data: &[u8], offset: u64) -> Result<(Option<String>, Option<u64>)> {
    let mut path = None;
    let mut size = None;

    for extension in PaxExtensions::new(data) {
        let extension =
            extension.map_err(|e| Error::decode(offset, format!("invalid PAX record: {}", e)))?;
        match extension.key() {
            Ok("path") => {
                path = Some(String::from_utf8_lossy(extension.value_bytes()).into_owned());
            }
            Ok("size") => {
                let parsed = extension
                    .value()
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| Error::decode(offset, "invalid PAX size"))?;
                size = Some(parsed);
            }
            _ => {}
        }
    }

    Ok((path, size))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a ustar header block with a valid checksum.
    ///
    /// The name is copied verbatim, trailing slash included.
    pub(crate) fn ustar_block(name: &str, size: u64, flag: u8) -> [u8; BLOCK_SIZE] {
        let mut header = tar::Header::new_ustar();
        header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
        header.set_mode(0o644);
        header.set_size(size);
        header.set_entry_type(EntryType::new(flag));
        header.set_cksum();
        *header.as_bytes()
    }

    #[test]
    fn test_parse_regular_file() {
        let block = ustar_block("layer.tar", 1234, b'0');
        let header = parse_header(&block, 0).unwrap();
        assert_eq!(header.name, "layer.tar");
        assert_eq!(header.size, 1234);
        assert_eq!(header.kind, HeaderType::Member(EntryKind::File));
    }

    #[test]
    fn test_kinds() {
        let dir = parse_header(&ustar_block("abc/", 0, b'5'), 0).unwrap();
        assert_eq!(dir.kind, HeaderType::Member(EntryKind::Directory));
        let link = parse_header(&ustar_block("abc/link", 0, b'2'), 0).unwrap();
        assert_eq!(link.kind, HeaderType::Member(EntryKind::Other));
        let old = parse_header(&ustar_block("old", 3, b'\0'), 0).unwrap();
        assert_eq!(old.kind, HeaderType::Member(EntryKind::File));
        let pax = parse_header(&ustar_block("PaxHeader", 30, b'x'), 0).unwrap();
        assert_eq!(pax.kind, HeaderType::PaxLocal);
    }

    #[test]
    fn test_header_only_types_have_no_body() {
        let link = parse_header(&ustar_block("usr/bin/sh", 900, b'2'), 0).unwrap();
        assert_eq!(link.size, 0);
        let dir = parse_header(&ustar_block("etc/", 4096, b'5'), 0).unwrap();
        assert_eq!(dir.size, 0);
        let fifo = parse_header(&ustar_block("run/pipe", 12, b'6'), 0).unwrap();
        assert_eq!(fifo.size, 0);

        let file = parse_header(&ustar_block("etc/motd", 12, b'0'), 0).unwrap();
        assert_eq!(file.size, 12);
    }

    #[test]
    fn test_checksum_mismatch_is_decode_error() {
        let mut block = ustar_block("layer.tar", 10, b'0');
        block[0] = b'X';
        match parse_header(&block, 1024) {
            Err(Error::Decode { offset, .. }) => assert_eq!(offset, 1024),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_base256_size() {
        let mut header = tar::Header::new_gnu();
        header.set_path("huge.tar").unwrap();
        header.set_size(1 << 40);
        header.set_cksum();

        let parsed = parse_header(header.as_bytes(), 0).unwrap();
        assert_eq!(parsed.size, 1 << 40);
    }

    #[test]
    fn test_padding_and_span() {
        assert_eq!(padding(0), 0);
        assert_eq!(padding(1), 511);
        assert_eq!(padding(512), 0);
        assert_eq!(padding(513), 511);

        assert_eq!(span(513, 0).unwrap(), 1024);
        assert!(matches!(
            span(u64::MAX, 512),
            Err(Error::Decode { offset: 512, .. })
        ));
    }

    #[test]
    fn test_parse_pax_records() {
        let data = b"27 path=some/long/name.tar\n13 size=4096\n20 mtime=1234567890\n";
        let (path, size) = parse_pax(data, 0).unwrap();
        assert_eq!(path.as_deref(), Some("some/long/name.tar"));
        assert_eq!(size, Some(4096));

        assert!(parse_pax(b"12 size=abc\n", 0).is_err());
    }
}
