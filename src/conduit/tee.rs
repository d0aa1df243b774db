//! Duplicating relay.
//!
//! [`Tee`] reads one conduit and writes every chunk to two destination
//! conduits, both before it asks for the next chunk. Each destination is paced
//! by its own reader, so the relay moves at the speed of the slower one and
//! the upstream producer can never run ahead of either consumer.
//!
//! # Examples
//!
//! ```rust
//! use siphon::conduit::{conduit, Tee};
//!
//! # #[tokio::main]
//! # async fn main() -> siphon::Result<()> {
//! let (mut input, source) = conduit(1);
//! let (left, mut left_out) = conduit(1);
//! let (right, mut right_out) = conduit(1);
//!
//! let relay = tokio::spawn(Tee::new(source, left, right).run());
//! tokio::spawn(async move {
//!     input.write(b"layer").await?;
//!     input.close().await
//! });
//!
//! let (a, b) = tokio::join!(left_out.drain(), right_out.drain());
//! assert_eq!(a?, 5);
//! assert_eq!(b?, 5);
//! assert_eq!(relay.await.unwrap()?, 5);
//! # Ok(())
//! # }
//! ```

use super::channel::{ConduitReader, ConduitWriter};
use crate::error::{Error, Result};

use indicatif::ProgressBar;
use tracing::{debug, trace};

/// Splits one input conduit into two independently paced outputs.
#[derive(Debug)]
pub struct Tee {
    input: ConduitReader,
    left: ConduitWriter,
    right: ConduitWriter,
    progress: Option<ProgressBar>,
}

impl Tee {
    /// Relay `input` into `left` and `right`.
    pub fn new(input: ConduitReader, left: ConduitWriter, right: ConduitWriter) -> Self {
        Self {
            input,
            left,
            right,
            progress: None,
        }
    }

    /// Advance `progress` by every byte relayed.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run until the input ends or a destination fails.
    ///
    /// On orderly end of input both destinations are closed and the number of
    /// relayed bytes is returned. On any failure both destinations are
    /// aborted with the error's message and the error is returned.
    pub async fn run(self) -> Result<u64> {
        let Tee {
            mut input,
            mut left,
            mut right,
            progress,
        } = self;

        let mut relayed: u64 = 0;
        loop {
            let chunk = match input.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => return Err(abort_both(left, right, e)),
            };

            let len = chunk.len() as u64;
            trace!("Relaying {} bytes", len);
            if let Err(e) = left.send_bytes(chunk.clone()).await {
                return Err(abort_both(left, right, e));
            }
            if let Err(e) = right.send_bytes(chunk).await {
                return Err(abort_both(left, right, e));
            }

            relayed += len;
            if let Some(ref pb) = progress {
                pb.inc(len);
            }
        }

        debug!("Input ended after {} bytes, closing both outputs", relayed);
        let closed_left = left.close().await;
        let closed_right = right.close().await;
        closed_left.and(closed_right)?;
        Ok(relayed)
    }
}

fn abort_both(left: ConduitWriter, right: ConduitWriter, error: Error) -> Error {
    debug!("Relay stopping: {}", error);
    let reason = error.to_string();
    left.abort(reason.clone());
    right.abort(reason);
    error
}

#[cfg(test)]
mod tests {
    use super::super::channel::conduit;
    use super::*;

    #[tokio::test]
    async fn test_input_abort_propagates_to_both_outputs() {
        let (mut input, source) = conduit(1);
        let (left, mut left_out) = conduit(1);
        let (right, mut right_out) = conduit(1);

        let relay = tokio::spawn(Tee::new(source, left, right).run());
        input.write(b"some").await.unwrap();
        input.abort("daemon hung up");

        let (a, b) = tokio::join!(left_out.drain(), right_out.drain());
        assert!(matches!(a, Err(Error::Aborted(_))));
        assert!(matches!(b, Err(Error::Aborted(_))));
        assert!(matches!(relay.await.unwrap(), Err(Error::Aborted(_))));
    }

    #[tokio::test]
    async fn test_closed_output_stops_relay_and_aborts_other() {
        let (mut input, source) = conduit(1);
        let (left, left_out) = conduit(1);
        let (right, mut right_out) = conduit(1);
        drop(left_out);

        let relay = tokio::spawn(Tee::new(source, left, right).run());
        let feeder = tokio::spawn(async move {
            for _ in 0..16 {
                if input.write(b"chunk").await.is_err() {
                    return;
                }
            }
            let _ = input.close().await;
        });

        assert!(matches!(relay.await.unwrap(), Err(Error::ConduitClosed)));
        assert!(matches!(right_out.drain().await, Err(Error::Aborted(_))));
        feeder.await.unwrap();
    }

    #[tokio::test]
    async fn test_progress_counts_relayed_bytes() {
        let (mut input, source) = conduit(1);
        let (left, mut left_out) = conduit(1);
        let (right, mut right_out) = conduit(1);
        let pb = ProgressBar::hidden();

        let relay = tokio::spawn(Tee::new(source, left, right).with_progress(pb.clone()).run());
        tokio::spawn(async move {
            input.write(&[1u8; 300]).await?;
            input.write(&[2u8; 200]).await?;
            input.close().await
        });

        let (a, b) = tokio::join!(left_out.drain(), right_out.drain());
        assert_eq!(a.unwrap(), 500);
        assert_eq!(b.unwrap(), 500);
        assert_eq!(relay.await.unwrap().unwrap(), 500);
        assert_eq!(pb.position(), 500);
    }
}
