//! Progress bar display management and coordination.
//!
//! [`ProgressDisplay`] owns the export spinner, advanced by the relay for
//! every byte it moves, and hands out one child bar per candidate layer
//! while the locator verifies it.
//!
//! # Examples
//!
//! ```rust
//! use siphon::progress::{ProgressDisplay, StyleOptions};
//!
//! let display = ProgressDisplay::new(StyleOptions::hidden());
//!
//! let layer = display.create_child_progress(1024, "layer.tar");
//! layer.set_position(1024);
//! display.finish_child(layer);
//!
//! display.main().inc(2048);
//! display.finish("done");
//! ```

use crate::progress::StyleOptions;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_millis(120);

/// Progress display manager that coordinates the export spinner and layer bars.
#[derive(Debug, Clone)]
pub struct ProgressDisplay {
    /// The multi-progress instance for coordinating multiple progress bars.
    multi: MultiProgress,
    /// Spinner counting exported bytes.
    main: ProgressBar,
    /// Style options for progress bars.
    style_options: StyleOptions,
}

impl ProgressDisplay {
    /// Create a new progress display manager.
    pub fn new(style_options: StyleOptions) -> Self {
        let multi = match style_options.is_enabled() {
            true => MultiProgress::new(),
            false => MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        };

        let main = multi.add(style_options.main().clone().to_spinner());
        if style_options.main().enabled {
            main.enable_steady_tick(TICK_INTERVAL);
        }

        Self {
            multi,
            main,
            style_options,
        }
    }

    /// Get the export spinner.
    pub fn main(&self) -> ProgressBar {
        self.main.clone()
    }

    /// Create a bar for a candidate layer of `size` bytes.
    pub fn create_child_progress(&self, size: u64, name: &str) -> ProgressBar {
        let pb = self
            .multi
            .add(self.style_options.child().clone().to_progress_bar(size));
        pb.set_message(name.to_string());
        pb
    }

    /// Finish a layer bar based on configuration.
    pub fn finish_child(&self, pb: ProgressBar) {
        if self.style_options.child().clear {
            pb.finish_and_clear();
        } else {
            pb.finish();
        }
    }

    /// Finish the export spinner with `message`.
    pub fn finish(&self, message: impl Into<String>) {
        if self.style_options.main().clear {
            self.main.finish_and_clear();
        } else {
            self.main.finish_with_message(message.into());
        }
    }

    /// Leave the export spinner where it stopped.
    pub fn abandon(&self, message: impl Into<String>) {
        self.main.abandon_with_message(message.into());
    }
}
