//! Direct mode entry logging.
//!
//! In direct mode the raw export is the payload and the scanner only reports
//! what passes through. The observer must never stall the relay, so a
//! malformed archive is logged, handed back in the [`Observation`] for the
//! run summary, and the rest of the stream is drained.

use crate::archive::EntryScanner;
use crate::error::Result;

use tokio::io::AsyncRead;
use tracing::{info, warn};

/// What the observer saw of the export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    /// Entries decoded before the end of the archive or the first decode error.
    pub entries: u64,
    /// Bytes read from the stream, trailing data included.
    pub bytes: u64,
    /// Decode error that stopped the scan, if any.
    pub decode_error: Option<String>,
}

/// Log every entry of the export and read the stream to its end.
///
/// Only a cancellation or an I/O failure of the stream itself is returned as
/// an error.
pub async fn observe<R: AsyncRead + Unpin>(scanner: &mut EntryScanner<R>) -> Result<Observation> {
    let mut observation = Observation::default();
    loop {
        match scanner.next_entry().await {
            Ok(Some(entry)) => {
                info!("Saw {} ({} bytes)", entry.name, entry.size);
            }
            Ok(None) => break,
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                warn!("Export is not a readable archive: {}", e);
                observation.decode_error = Some(e.to_string());
                break;
            }
        }
    }
    observation.entries = scanner.entries_seen();
    scanner.drain().await?;
    observation.bytes = scanner.offset();
    Ok(observation)
}
