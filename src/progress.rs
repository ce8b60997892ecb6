//! Progress-callback trait for per-document conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the input directory. The CLI
//! drives its `indicatif` bar from these; library callers can forward them
//! anywhere.
//!
//! # Example
//!
//! ```rust
//! use batch2md::{ConversionConfig, ConversionJob, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, job: &ConversionJob) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{index}/{total}] {}", job.output_path().display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder("./docs")
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{ConversionJob, ConversionSummary, JobStatus, PlannedConversion};
use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator as it processes each document.
///
/// `index` is 1-based and refers to the document's position in the sorted
/// scan, so it is stable even when documents finish out of order.
///
/// # Thread safety
///
/// With `max_workers > 1`, the `on_file_start` and `on_stage` events of
/// different documents interleave. `on_file_complete`, `on_file_error` and
/// the batch events are always called from the task that owns the summary.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after scanning, before any document is touched.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when a document's job is created.
    fn on_file_start(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called each time a job enters a new processing stage.
    fn on_stage(&self, index: usize, total: usize, status: JobStatus) {
        let _ = (index, total, status);
    }

    /// Called with the frozen job after a successful conversion.
    fn on_file_complete(&self, index: usize, total: usize, job: &ConversionJob) {
        let _ = (index, total, job);
    }

    /// Called with the frozen job after a failed conversion.
    fn on_file_error(&self, index: usize, total: usize, job: &ConversionJob) {
        let _ = (index, total, job);
    }

    /// Dry run only: called once per document that would be converted.
    fn on_file_planned(&self, index: usize, total: usize, plan: &PlannedConversion) {
        let _ = (index, total, plan);
    }

    /// Called once with the final summary.
    fn on_batch_complete(&self, summary: &ConversionSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that need a callback value but no
/// events. Leaving `progress_callback` unset has the same effect.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Render the one-line progress message for a document. An empty
/// `status` drops the trailing ` - status` part.
///
/// ```rust
/// assert_eq!(
///     batch2md::format_progress(2, 5, "report.docx", "completed"),
///     "Processing [2/5]: report.docx - completed"
/// );
/// ```
pub fn format_progress(current: usize, total: usize, name: &str, status: &str) -> String {
    if status.is_empty() {
        format!("Processing [{current}/{total}]: {name}")
    } else {
        format!("Processing [{current}/{total}]: {name} - {status}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SummaryBuilder;
    use chrono::Local;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        total: AtomicUsize,
        starts: AtomicUsize,
        stages: Mutex<Vec<JobStatus>>,
        completes: AtomicUsize,
        errors: AtomicUsize,
        finished: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total: usize) {
            self.total.store(total, Ordering::SeqCst);
        }

        fn on_file_start(&self, _index: usize, _total: usize, _path: &Path) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage(&self, _index: usize, _total: usize, status: JobStatus) {
            self.stages.lock().unwrap().push(status);
        }

        fn on_file_complete(&self, _index: usize, _total: usize, _job: &ConversionJob) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, _index: usize, _total: usize, _job: &ConversionJob) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, summary: &ConversionSummary) {
            self.finished.store(summary.total_files(), Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        let job = ConversionJob::new("a.pdf", "markdown/a.md", "markdown/images", 0);
        cb.on_batch_start(1);
        cb.on_file_start(1, 1, Path::new("a.pdf"));
        cb.on_stage(1, 1, JobStatus::ConvertingToMd);
        cb.on_file_error(1, 1, &job.fail("boom"));
        cb.on_batch_complete(&ConversionSummary::empty(Local::now()));
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(2);
        assert_eq!(tracker.total.load(Ordering::SeqCst), 2);

        let mut ok = ConversionJob::new("a.pdf", "markdown/a.md", "markdown/images", 0);
        tracker.on_file_start(1, 2, ok.input_path());
        ok.advance(JobStatus::ConvertingToMd).unwrap();
        tracker.on_stage(1, 2, ok.status());
        let ok = ok.complete(42);
        tracker.on_file_complete(1, 2, &ok);

        let bad = ConversionJob::new("b.docx", "markdown/b.md", "markdown/images", 0);
        tracker.on_file_start(2, 2, bad.input_path());
        let bad = bad.fail("LibreOffice not found");
        tracker.on_file_error(2, 2, &bad);

        let mut summary = SummaryBuilder::new(Local::now());
        summary.record(ok);
        summary.record(bad);
        tracker.on_batch_complete(&summary.finish());

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(*tracker.stages.lock().unwrap(), [JobStatus::ConvertingToMd]);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.finished.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn progress_line_format() {
        assert_eq!(
            format_progress(1, 3, "slides.pptx", "converting_to_pdf"),
            "Processing [1/3]: slides.pptx - converting_to_pdf"
        );
        assert_eq!(format_progress(3, 3, "a.pdf", ""), "Processing [3/3]: a.pdf");
    }
}
