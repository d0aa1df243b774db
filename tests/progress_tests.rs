//! Tests for the progress module functionality.
//!
//! This file contains tests for progress bar styling, configuration,
//! and display management functionality.

use siphon::progress::{ProgressBarOpts, ProgressDisplay, StyleOptions};

mod common;
use common::helpers::*;

#[test]
fn test_style_options_default() {
    let style = StyleOptions::default();
    assert_style_options_enabled(&style);
    assert_progress_opts_enabled(style.main());
    assert_progress_opts_enabled(style.child());
}

#[test]
fn test_style_options_new() {
    let style = create_test_style_options();
    assert_style_options_enabled(&style);
}

#[test]
fn test_style_options_disabled() {
    assert_style_options_disabled(&create_disabled_style_options());
    assert_style_options_disabled(&StyleOptions::hidden());
}

#[test]
fn test_style_options_setters() {
    let mut style = StyleOptions::default();
    style.set_main(create_hidden_progress_opts());
    style.set_child(create_pip_style_progress_opts());

    // The child bar alone keeps the style enabled.
    assert_style_options_enabled(&style);

    style.set_child(create_hidden_progress_opts());
    assert_style_options_disabled(&style);
}

#[test]
fn test_progress_bar_opts_default() {
    let opts = create_test_progress_opts();
    assert_progress_opts_enabled(&opts);
}

#[test]
fn test_progress_bar_opts_new() {
    let opts = create_custom_progress_opts("{bar} {bytes}", "abc");
    assert_progress_opts_enabled(&opts);
}

#[test]
fn test_progress_bar_opts_invalid_template_falls_back() {
    let opts = create_custom_progress_opts("{bar", "abc");
    assert_progress_opts_enabled(&opts);
}

#[test]
fn test_progress_bar_opts_hidden() {
    assert_progress_opts_disabled(&create_hidden_progress_opts());
}

#[test]
fn test_progress_bar_opts_with_pip_style() {
    let opts = create_pip_style_progress_opts();
    assert_progress_opts_enabled(&opts);
}

#[test]
fn test_progress_bar_opts_set_clear() {
    let mut opts = ProgressBarOpts::default();

    // Clearing only changes how a bar finishes.
    opts.set_clear(false);
    assert_progress_opts_enabled(&opts);

    opts.set_clear(true);
    assert_progress_opts_enabled(&opts);
}

#[test]
fn test_spinner_has_no_length() {
    let spinner = ProgressBarOpts::new(
        Some(ProgressBarOpts::TEMPLATE_EXPORT_SPINNER.to_string()),
        None,
        true,
        false,
    )
    .to_spinner();
    assert_eq!(spinner.length(), None);

    assert!(ProgressBarOpts::hidden().to_spinner().is_hidden());
}

#[test]
fn test_progress_display_counts_exported_bytes() {
    let display = ProgressDisplay::new(StyleOptions::hidden());

    let main = display.main();
    main.inc(512);
    main.inc(1024);
    // Clones share the same state.
    assert_eq!(display.main().position(), 1536);
    display.finish("done");
    assert!(display.main().is_finished());
}

#[test]
fn test_progress_display_create_child_progress() {
    let display = ProgressDisplay::new(StyleOptions::hidden());

    let child = display.create_child_progress(1000, "a/layer.tar");
    assert_eq!(child.position(), 0);
    child.inc(500);
    assert_eq!(child.position(), 500);
}

#[test]
fn test_progress_display_finish_child() {
    let display = ProgressDisplay::new(StyleOptions::hidden());

    let child = display.create_child_progress(100, "b/layer.tar");
    child.set_position(100);
    display.finish_child(child.clone());
    assert!(child.is_finished());
}

#[test]
fn test_progress_display_abandon() {
    let display = ProgressDisplay::new(StyleOptions::hidden());
    display.main().inc(10);
    display.abandon("failed");
    assert!(display.main().is_finished());
    assert_eq!(display.main().position(), 10);
}
