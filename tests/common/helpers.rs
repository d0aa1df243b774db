#![allow(dead_code)]

use async_trait::async_trait;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tempfile::TempDir;
use tokio::io::{AsyncRead, ReadBuf};

use siphon::conduit::ConduitWriter;
use siphon::progress::{ProgressBarOpts, StyleOptions};
use siphon::{BoxError, Error, ExportProducer, ObjectSink, PipelineBuilder, ReaderProducer};

/// Creates a temporary directory for testing purposes
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}

/// Number of entries in `dir`
pub fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).expect("Failed to list directory").count()
}

/// Creates test content of specified size
pub fn create_test_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Creates random test content of specified size
pub fn create_random_content(size: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut data = vec![0u8; size];
    rand::rng().fill_bytes(&mut data);
    data
}

// === Archive Builders ===

/// Builds a tar archive holding `files`, in order.
pub fn build_tar(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        builder
            .append_data(&mut header, path, *body)
            .expect("Failed to append tar entry");
    }
    builder.into_inner().expect("Failed to finish tar archive")
}

/// Builds a layer: a tar archive of a few small files derived from `seed`.
pub fn build_layer(seed: &str) -> Vec<u8> {
    let readme = format!("layer {}\n", seed);
    let payload = create_test_content(1500 + seed.len() * 37);
    build_tar(&[
        ("etc/motd", readme.as_bytes()),
        ("usr/share/payload.bin", &payload),
    ])
}

/// Builds an image export holding `layers` as `<name>/layer.tar` plus a
/// manifest and a directory entry per layer.
pub fn build_image(layers: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let manifest = br#"[{"Config":"config.json","Layers":[]}]"#;
    append_file(&mut builder, "manifest.json", manifest);

    for (name, body) in layers {
        let mut dir = tar::Header::new_gnu();
        dir.set_size(0);
        dir.set_mode(0o755);
        dir.set_entry_type(tar::EntryType::Directory);
        builder
            .append_data(&mut dir, format!("{}/", name), std::io::empty())
            .expect("Failed to append directory");

        append_file(&mut builder, &format!("{}/VERSION", name), b"1.0");
        append_file(&mut builder, &format!("{}/layer.tar", name), body);
    }
    builder.into_inner().expect("Failed to finish image archive")
}

fn append_file(builder: &mut tar::Builder<Vec<u8>>, path: &str, body: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(body.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    builder
        .append_data(&mut header, path, body)
        .expect("Failed to append file");
}

// === Producers ===

/// Producer replaying an in-memory export in small chunks.
pub fn memory_producer(data: Vec<u8>) -> ReaderProducer<Cursor<Vec<u8>>> {
    ReaderProducer::with_chunk_size(Cursor::new(data), 1000)
}

/// Producer writing the first `fail_after` bytes of `data`, then failing.
#[derive(Debug)]
pub struct FailingProducer {
    pub data: Vec<u8>,
    pub fail_after: usize,
}

#[async_trait]
impl ExportProducer for FailingProducer {
    async fn export(&mut self, out: &mut ConduitWriter) -> Result<(), BoxError> {
        let end = self.fail_after.min(self.data.len());
        for chunk in self.data[..end].chunks(512) {
            out.write(chunk).await?;
        }
        Err("export truncated: daemon closed the stream".into())
    }
}

/// Producer that never ends on its own.
#[derive(Debug, Default)]
pub struct EndlessProducer {
    pub written: Arc<Mutex<u64>>,
}

#[async_trait]
impl ExportProducer for EndlessProducer {
    async fn export(&mut self, out: &mut ConduitWriter) -> Result<(), BoxError> {
        let chunk = vec![0x42u8; 4096];
        loop {
            out.write(&chunk).await?;
            *self.written.lock().unwrap() += chunk.len() as u64;
        }
    }
}

// === Sinks ===

/// Everything a [`MemorySink`] saw.
#[derive(Debug, Default, Clone)]
pub struct SinkRecord {
    pub data: Vec<u8>,
    pub writes: usize,
    /// One element per `close` call: `None` for a commit, the error text otherwise.
    pub closes: Vec<Option<String>>,
}

impl SinkRecord {
    pub fn committed(&self) -> bool {
        self.closes == [None]
    }

    pub fn failed(&self) -> bool {
        matches!(self.closes.as_slice(), [Some(_)])
    }
}

/// Sink recording into shared memory, optionally failing or panicking after
/// some bytes.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub record: Arc<Mutex<SinkRecord>>,
    pub fail_after: Option<usize>,
    pub panic_after: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(bytes: usize) -> Self {
        Self {
            fail_after: Some(bytes),
            ..Self::default()
        }
    }

    pub fn panicking_after(bytes: usize) -> Self {
        Self {
            panic_after: Some(bytes),
            ..Self::default()
        }
    }

    pub fn record(&self) -> SinkRecord {
        self.record.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectSink for MemorySink {
    async fn write(&mut self, data: &[u8]) -> Result<(), BoxError> {
        if let Some(limit) = self.panic_after {
            // Released before panicking so the record stays readable.
            let len = self.record.lock().unwrap().data.len();
            if len + data.len() > limit {
                panic!("sink client crashed after {} bytes", len);
            }
        }
        let mut record = self.record.lock().unwrap();
        if let Some(limit) = self.fail_after {
            if record.data.len() + data.len() > limit {
                return Err("object store rejected the upload".into());
            }
        }
        record.data.extend_from_slice(data);
        record.writes += 1;
        Ok(())
    }

    async fn close(&mut self, failure: Option<&Error>) -> Result<(), BoxError> {
        self.record
            .lock()
            .unwrap()
            .closes
            .push(failure.map(|e| e.to_string()));
        Ok(())
    }
}

// === Scratch Watching ===

/// Reader recording the largest number of files ever seen in a directory,
/// sampled on every read.
pub struct ScratchWatch<R> {
    inner: R,
    dir: PathBuf,
    pub peak: Arc<Mutex<usize>>,
}

impl<R> ScratchWatch<R> {
    pub fn new(inner: R, dir: &Path) -> Self {
        Self {
            inner,
            dir: dir.to_path_buf(),
            peak: Arc::new(Mutex::new(0)),
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ScratchWatch<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let seen = file_count(&self.dir);
        {
            let mut peak = self.peak.lock().unwrap();
            *peak = (*peak).max(seen);
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

// === Progress Bar Helpers ===

/// Creates default test progress bar options
pub fn create_test_progress_opts() -> ProgressBarOpts {
    ProgressBarOpts::new(None, None, true, false)
}

/// Creates hidden progress bar options for testing
pub fn create_hidden_progress_opts() -> ProgressBarOpts {
    ProgressBarOpts::hidden()
}

/// Creates pip-style progress bar options for testing
pub fn create_pip_style_progress_opts() -> ProgressBarOpts {
    ProgressBarOpts::with_pip_style()
}

/// Creates custom progress bar options with template and chars
pub fn create_custom_progress_opts(template: &str, chars: &str) -> ProgressBarOpts {
    ProgressBarOpts::new(
        Some(template.to_string()),
        Some(chars.to_string()),
        true,
        false,
    )
}

/// Creates default test style options
pub fn create_test_style_options() -> StyleOptions {
    StyleOptions::new(create_test_progress_opts(), create_pip_style_progress_opts())
}

/// Creates disabled style options for testing
pub fn create_disabled_style_options() -> StyleOptions {
    StyleOptions::new(create_hidden_progress_opts(), create_hidden_progress_opts())
}

// === Pipeline Builder Helpers ===

/// Creates a hidden pipeline builder using `scratch` for candidates
pub fn create_test_pipeline_builder(scratch: &Path) -> PipelineBuilder {
    PipelineBuilder::hidden()
        .scratch_dir(scratch.to_path_buf())
        .chunk_size(4096)
}

// === Assertion Helpers ===

/// Asserts that progress bar options are configured correctly
pub fn assert_progress_opts_enabled(opts: &ProgressBarOpts) {
    let pb = opts.clone().to_progress_bar(100);
    assert_eq!(pb.length(), Some(100), "Progress bar should be enabled");
}

/// Asserts that progress bar options are disabled
pub fn assert_progress_opts_disabled(opts: &ProgressBarOpts) {
    let pb = opts.clone().to_progress_bar(100);
    assert!(pb.is_hidden(), "Progress bar should be disabled");
}

/// Asserts that style options are enabled
pub fn assert_style_options_enabled(style: &StyleOptions) {
    assert!(style.is_enabled(), "Style options should be enabled");
}

/// Asserts that style options are disabled
pub fn assert_style_options_disabled(style: &StyleOptions) {
    assert!(!style.is_enabled(), "Style options should be disabled");
}
