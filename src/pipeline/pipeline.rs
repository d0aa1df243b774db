//! Pipeline orchestration.
//!
//! A run wires four tasks together with bounded conduits:
//!
//! ```text
//! producer ──► relay ──┬──► raw output ──► sink            (direct)
//!                      │                   discarded       (selective)
//!                      └──► scanner ──────► observer        (direct)
//!                                           layer locator ─► sink (selective)
//! ```
//!
//! Every task returns a typed result through its [`JoinHandle`], and the run
//! waits for all of them. A failing task drops or aborts the conduits it
//! holds, which in turn stops its neighbours, so no task is left blocked.
//! The producer's own error wins over every other cause; otherwise the first
//! error that is not merely a consequence of another stage stopping is
//! reported. The sink is shared with the task writing to it, so the run can
//! still close it when that task panics: committed on success, failed
//! otherwise.
//!
//! # Examples
//!
//! ```rust,no_run
//! use siphon::endpoint::{FileSink, ReaderProducer};
//! use siphon::pipeline::PipelineBuilder;
//! use siphon::TargetDigest;
//!
//! # #[tokio::main]
//! # async fn main() -> siphon::Result<()> {
//! let export = tokio::fs::File::open("image.tar").await?;
//! let pipeline = PipelineBuilder::new()
//!     .selective(TargetDigest::new("sha256:5f70bf18a086007016e948b04aed3b82103a36bea41755b6cddfaf10ace3c6ef"))
//!     .build();
//!
//! let summary = pipeline
//!     .run(ReaderProducer::new(export), FileSink::new("layer.tar"))
//!     .await?;
//! println!("Forwarded {:?}, {} bytes", summary.layer(), summary.forwarded());
//! # Ok(())
//! # }
//! ```

use super::config::{Mode, PipelineConfig};
use super::summary::{Status, Summary};
use crate::archive::EntryScanner;
use crate::conduit::{conduit, ConduitReader, ConduitWriter, Tee};
use crate::digest::TargetDigest;
use crate::endpoint::{ExportProducer, ObjectSink, SinkGuard, SinkState};
use crate::error::{Error, Result};
use crate::extract::{observe, LayerLocator, Observation};
use crate::progress::{ProgressDisplay, StyleOptions};
use crate::scratch::ScratchStore;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// Represents the export pipeline.
///
/// A pipeline can be created via its builder:
///
/// ```rust
/// # fn main()  {
/// use siphon::pipeline::PipelineBuilder;
///
/// let p = PipelineBuilder::new().build();
/// # }
/// ```
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish()
    }
}

/// Sink guard shared between the run and the task writing to it.
type SharedSink<S> = Arc<Mutex<SinkGuard<S>>>;

/// What the task writing to the sink reports back.
struct SinkOutcome {
    entries: u64,
    candidates: usize,
    layer: Option<String>,
    result: Result<()>,
}

impl Pipeline {
    /// Creates a new Pipeline with the given configuration.
    pub(crate) fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Gets the extraction mode.
    pub fn mode(&self) -> &Mode {
        &self.config.mode
    }

    /// Gets the directory for scratch files.
    pub fn scratch_dir(&self) -> &PathBuf {
        &self.config.scratch_dir
    }

    /// Gets the in-memory buffering threshold.
    pub fn memory_threshold(&self) -> u64 {
        self.config.memory_threshold
    }

    /// Gets the layer name marker.
    pub fn layer_marker(&self) -> &str {
        &self.config.layer_marker
    }

    /// Gets the copy buffer size.
    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    /// Gets the number of chunks in flight per conduit.
    pub fn conduit_depth(&self) -> usize {
        self.config.conduit_depth
    }

    /// Gets the style options.
    pub fn style_options(&self) -> &StyleOptions {
        &self.config.style_options
    }

    /// Run `producer` and deliver the selected bytes to `sink`.
    ///
    /// Returns once every stage has stopped and `sink` has been closed.
    pub async fn run<P, S>(&self, producer: P, sink: S) -> Result<Summary>
    where
        P: ExportProducer + 'static,
        S: ObjectSink + 'static,
    {
        debug!("Starting {} pipeline", self.config.mode);
        let depth = self.config.conduit_depth;
        let progress = ProgressDisplay::new(self.config.style_options.clone());
        let sink: SharedSink<S> = Arc::new(Mutex::new(SinkGuard::new(sink)));

        let (export_in, export_out) = conduit(depth);
        let (raw_in, raw_out) = conduit(depth);
        let (scan_in, scan_out) = conduit(depth);

        let producer_task = tokio::spawn(produce(producer, export_in));
        let relay_task = tokio::spawn(
            Tee::new(export_out, raw_in, scan_in)
                .with_progress(progress.main())
                .run(),
        );

        let (sink_task, side_task): (JoinHandle<SinkOutcome>, JoinHandle<Result<Observation>>) =
            match &self.config.mode {
                Mode::Direct => (
                    tokio::spawn(forward_raw(raw_out, sink.clone())),
                    tokio::spawn(observe_entries(scan_out)),
                ),
                Mode::Selective(target) => (
                    tokio::spawn(forward_layer(
                        self.locator(target.clone(), progress.clone()),
                        scan_out,
                        sink.clone(),
                    )),
                    tokio::spawn(discard_raw(raw_out)),
                ),
            };
        debug!("Pipeline running");

        let (produced, relayed, outcome, side) =
            tokio::join!(producer_task, relay_task, sink_task, side_task);
        let produced = produced.map_err(joined).and_then(|r| r);
        let relayed = relayed.map_err(joined).and_then(|r| r);
        let side = side.map_err(joined).and_then(|r| r);

        let mut summary = Summary::new(self.config.mode.clone());
        if let Ok(exported) = &produced {
            summary = summary.with_exported(*exported);
        }

        let consumed = match outcome {
            Ok(outcome) => {
                let entries = match self.config.mode {
                    Mode::Direct => side.as_ref().map_or(0, |seen| seen.entries),
                    Mode::Selective(_) => outcome.entries,
                };
                summary = summary.with_entries(entries, outcome.candidates);
                if let Some(layer) = outcome.layer {
                    summary = summary.with_layer(layer);
                }
                outcome.result
            }
            Err(e) => Err(joined(e)),
        };
        if let Ok(Observation {
            decode_error: Some(ref message),
            ..
        }) = side
        {
            summary = summary.with_decode_error(message.clone());
        }

        // Every task has stopped, so nothing else holds the lock.
        let mut sink = sink.lock().await;
        summary = summary.with_forwarded(sink.written());

        let failure = dominant([produced.err(), consumed.err(), side.err(), relayed.err()]);
        let failure = match failure {
            None if sink.state() != SinkState::Committed => Some(Error::Internal(
                "pipeline finished without committing the sink".to_string(),
            )),
            failure => failure,
        };
        if let Some(ref e) = failure {
            if let Err(close) = sink.fail(e).await {
                warn!("Sink failed to close after {}: {}", e, close);
            }
        }
        drop(sink);

        let summary = match failure {
            None => {
                info!(
                    "Pipeline succeeded: {} bytes exported, {} forwarded",
                    summary.exported(),
                    summary.forwarded()
                );
                progress.finish("done");
                summary.with_status(Status::Success)
            }
            Some(ref e) => {
                warn!("Pipeline failed: {}", e);
                progress.abandon("failed");
                summary.fail(e)
            }
        };

        if let Some(ref callback) = self.config.on_complete {
            callback(&summary);
        }
        match failure {
            None => Ok(summary),
            Some(e) => Err(e),
        }
    }

    fn locator(&self, target: TargetDigest, progress: ProgressDisplay) -> LayerLocator {
        let store = ScratchStore::new(&self.config.scratch_dir, self.config.memory_threshold);
        LayerLocator::new(store, target)
            .with_marker(self.config.layer_marker.clone())
            .with_chunk_size(self.config.chunk_size)
            .with_progress(progress)
    }
}

/// Drive the producer and end its conduit according to the outcome.
async fn produce<P: ExportProducer>(mut producer: P, mut out: ConduitWriter) -> Result<u64> {
    match producer.export(&mut out).await {
        Ok(()) => {
            let exported = out.written();
            out.close().await?;
            debug!("Export finished after {} bytes", exported);
            Ok(exported)
        }
        Err(source) if out.is_disconnected() => {
            // Downstream stopped first; its error is the one to report.
            debug!("Export stopped by downstream: {}", source);
            Err(Error::ConduitClosed)
        }
        Err(source) => {
            let error = Error::producer(source);
            out.abort(error.to_string());
            Err(error)
        }
    }
}

/// Direct mode: copy the raw stream into the sink.
async fn forward_raw<S: ObjectSink>(mut raw: ConduitReader, sink: SharedSink<S>) -> SinkOutcome {
    let mut sink = sink.lock().await;
    let result = copy_to_sink(&mut raw, &mut sink).await;
    if let Err(ref e) = result {
        if let Err(close) = sink.fail(e).await {
            warn!("Sink failed to close after {}: {}", e, close);
        }
    }
    SinkOutcome {
        entries: 0,
        candidates: 0,
        layer: None,
        result,
    }
}

async fn copy_to_sink<S: ObjectSink>(raw: &mut ConduitReader, sink: &mut SinkGuard<S>) -> Result<()> {
    while let Some(chunk) = raw.next_chunk().await? {
        sink.write(&chunk).await?;
    }
    sink.commit().await
}

/// Direct mode: log the entries of the export.
async fn observe_entries(scan: ConduitReader) -> Result<Observation> {
    let mut scanner = EntryScanner::new(scan);
    let observation = observe(&mut scanner).await?;
    debug!(
        "Observed {} entries in {} bytes",
        observation.entries, observation.bytes
    );
    Ok(observation)
}

/// Selective mode: locate the target layer and forward it.
///
/// After a match the rest of the export is drained so the producer can
/// finish.
async fn forward_layer<S: ObjectSink>(
    locator: LayerLocator,
    scan: ConduitReader,
    sink: SharedSink<S>,
) -> SinkOutcome {
    let mut scanner = EntryScanner::new(scan);
    let mut sink = sink.lock().await;
    let (candidates, layer, result) = match locator.locate(&mut scanner, &mut sink).await {
        Ok(found) => {
            let drained = scanner.drain().await.map(|n| {
                debug!("Drained {} bytes after {}", n, found.name);
            });
            (found.candidates, Some(found.name), drained)
        }
        Err(e) => {
            let candidates = match &e {
                Error::NotFound { candidates, .. } => *candidates,
                _ => 0,
            };
            (candidates, None, Err(e))
        }
    };
    drop(sink);
    SinkOutcome {
        entries: scanner.entries_seen(),
        candidates,
        layer,
        result,
    }
}

/// Selective mode: the raw output is only counted.
async fn discard_raw(mut raw: ConduitReader) -> Result<Observation> {
    let discarded = raw.drain().await?;
    debug!("Raw export output carried {} bytes", discarded);
    Ok(Observation {
        bytes: discarded,
        ..Observation::default()
    })
}

fn joined(error: JoinError) -> Error {
    Error::Internal(format!("pipeline task did not complete: {}", error))
}

/// Pick the error to report from the stage results, in priority order.
///
/// Cancellations only win when nothing else failed.
fn dominant<const N: usize>(errors: [Option<Error>; N]) -> Option<Error> {
    let mut fallback = None;
    for error in errors.into_iter().flatten() {
        if !error.is_cancellation() {
            return Some(error);
        }
        fallback.get_or_insert(error);
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominant_prefers_primary_errors() {
        let picked = dominant([
            Some(Error::ConduitClosed),
            Some(Error::decode(0, "bad checksum")),
            Some(Error::Aborted("relay".into())),
        ]);
        assert!(matches!(picked, Some(Error::Decode { .. })));
    }

    #[test]
    fn test_dominant_producer_first() {
        let picked = dominant([
            Some(Error::producer("daemon went away")),
            Some(Error::NotFound {
                digest: "sha256:abc".into(),
                candidates: 0,
            }),
        ]);
        assert!(matches!(picked, Some(Error::Producer { .. })));
    }

    #[test]
    fn test_dominant_falls_back_to_cancellation() {
        let picked = dominant([None, Some(Error::Aborted("x".into())), Some(Error::ConduitClosed)]);
        assert!(matches!(picked, Some(Error::Aborted(_))));
        assert!(dominant::<2>([None, None]).is_none());
    }
}
