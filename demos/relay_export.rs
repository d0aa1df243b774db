//! Example relaying a saved image export.
//!
//! ```text
//! cargo run --example relay_export -- image.tar out.tar [sha256:<digest>]
//! ```
//!
//! Without a digest the whole export is copied to the output. With one, only
//! the matching layer is.

use color_eyre::{eyre::eyre, Result};
use siphon::logging::{init_logging, LogConfig};
use siphon::pipeline::{PipelineBuilder, Status};
use siphon::{FileSink, ReaderProducer, TargetDigest};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging(&LogConfig::new(Level::INFO))?;

    let mut args = std::env::args().skip(1);
    let (Some(export), Some(output)) = (args.next(), args.next()) else {
        return Err(eyre!("usage: relay_export <export.tar> <output> [digest]"));
    };

    let mut builder = PipelineBuilder::new().on_complete(|summary| {
        if let Status::Fail(error) = summary.status() {
            eprintln!("Relay failed: {}", error);
        }
    });
    if let Some(digest) = args.next() {
        builder = builder.selective(TargetDigest::new(digest));
    }

    let export = tokio::fs::File::open(&export).await?;
    let summary = builder
        .build()
        .run(ReaderProducer::new(export), FileSink::new(&output))
        .await?;

    match summary.layer() {
        Some(layer) => println!(
            "Forwarded {} ({} bytes) out of {} exported bytes",
            layer,
            summary.forwarded(),
            summary.exported()
        ),
        None => println!(
            "Forwarded {} bytes across {} entries",
            summary.forwarded(),
            summary.entries()
        ),
    }

    Ok(())
}
