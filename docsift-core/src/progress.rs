//! Progress reporting for document runs.
//!
//! The CLI uses `IndicatifReporter` for a spinner (single document) or a bar
//! (batches). Library callers can use `NoopReporter` or their own
//! implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ocr,
    Extract,
    Validate,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ocr => "ocr",
            Self::Extract => "extract",
            Self::Validate => "validate",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Ocr => "Reading text",
            Self::Extract => "Extracting fields",
            Self::Validate => "Validating record",
        }
    }
}

/// Receives progress events from the pipeline.
pub trait ProgressReporter: Send + Sync {
    /// A batch of `total` documents is starting.
    fn batch_started(&self, total: u64);

    /// `source` entered `stage`.
    fn stage(&self, source: &str, stage: Stage);

    /// `source` is done, successfully or not.
    fn document_finished(&self, source: &str, ok: bool);

    /// All work is done.
    fn finish(&self);

    /// Display an informational message without disturbing the bar.
    fn message(&self, msg: &str);
}

/// No-op reporter for library callers that don't need progress output.
#[derive(Debug, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn batch_started(&self, _total: u64) {}
    fn stage(&self, _source: &str, _stage: Stage) {}
    fn document_finished(&self, _source: &str, _ok: bool) {}
    fn finish(&self) {}
    fn message(&self, _msg: &str) {}
}

/// Reporter backed by `indicatif`, drawn on stderr so stdout stays clean JSON.
#[derive(Debug)]
pub struct IndicatifReporter {
    bar: ProgressBar,
    failed: AtomicU64,
}

impl Default for IndicatifReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatifReporter {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// A reporter that never draws (quiet mode, tests).
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(None, target);
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            bar,
            failed: AtomicU64::new(0),
        }
    }

    /// Documents that finished with an error so far.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl ProgressReporter for IndicatifReporter {
    fn batch_started(&self, total: u64) {
        self.failed.store(0, Ordering::Relaxed);
        self.bar.set_length(total);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len} ({eta})",
        ) {
            self.bar.set_style(style.progress_chars("=> "));
        }
        self.bar.reset();
    }

    fn stage(&self, source: &str, stage: Stage) {
        self.bar.set_message(format!("{}: {source}", stage.label()));
    }

    fn document_finished(&self, source: &str, ok: bool) {
        if !ok {
            self.failed.fetch_add(1, Ordering::Relaxed);
            self.bar.println(format!("failed: {source}"));
        }
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn message(&self, msg: &str) {
        self.bar.println(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reporter_is_silent() {
        let reporter = NoopReporter;
        reporter.batch_started(3);
        reporter.stage("a.png", Stage::Ocr);
        reporter.document_finished("a.png", true);
        reporter.message("hello");
        reporter.finish();
    }

    #[test]
    fn indicatif_reporter_counts_failures() {
        let reporter = IndicatifReporter::hidden();
        reporter.batch_started(2);
        reporter.stage("a.png", Stage::Extract);
        reporter.document_finished("a.png", true);
        reporter.document_finished("b.pdf", false);
        reporter.finish();
        assert_eq!(reporter.failed(), 1);
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Ocr.as_str(), "ocr");
        assert_eq!(Stage::Validate.as_str(), "validate");
    }
}
