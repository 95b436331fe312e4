//! Progress-sink trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ProgressSink>`] via
//! [`crate::config::ConversionConfigBuilder::progress_sink`] to receive
//! events as the pipeline works through the page range.
//!
//! The sink gets the table snapshot by reference after every page, so a
//! live view can be redrawn without the pipeline knowing how it is displayed.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2csv::{ConversionConfig, PageProgress, ProgressSink, ResultTable};
//! use std::sync::Arc;
//!
//! struct PrintingSink;
//!
//! impl ProgressSink for PrintingSink {
//!     fn on_page_complete(&self, progress: &PageProgress, table: &ResultTable) {
//!         eprintln!(
//!             "{}/{} pages, {} rows, ~{:?} left",
//!             progress.pages_processed, progress.pages_total, table.len(),
//!             progress.estimated_remaining,
//!         );
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_sink(Arc::new(PrintingSink))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ExtractionFailure;
use crate::output::{ResultTable, RunPhase, RunState};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Telemetry emitted after each page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageProgress {
    /// 1-indexed document page that just finished.
    pub page_num: usize,
    pub pages_processed: usize,
    pub pages_total: usize,
    /// Time since the run started.
    pub elapsed: Duration,
    /// `last_page_duration × remaining pages`.
    pub estimated_remaining: Duration,
    pub last_page_duration: Duration,
    /// `Running`, or `Stopping` when a stop was requested during this page.
    pub phase: RunPhase,
}

impl PageProgress {
    pub(crate) fn from_state(page_num: usize, state: &RunState) -> Self {
        Self {
            page_num,
            pages_processed: state.pages_processed,
            pages_total: state.pages_total,
            elapsed: state.elapsed,
            estimated_remaining: state.estimated_remaining,
            last_page_duration: state.last_page_duration,
            phase: state.phase,
        }
    }
}

/// Called by the conversion pipeline as it processes each page.
///
/// Pages are processed strictly one after another, so calls never overlap
/// for a single run. All methods default to no-ops.
pub trait ProgressSink: Send + Sync {
    /// Called once the run has entered `Running`.
    fn on_run_start(&self, pages_total: usize) {
        let _ = pages_total;
    }

    /// Called just before the extraction request for a page is sent.
    fn on_page_start(&self, page_num: usize, pages_total: usize) {
        let _ = (page_num, pages_total);
    }

    /// Called after a page has been parsed and folded into the table,
    /// including pages whose extraction failed.
    fn on_page_complete(&self, progress: &PageProgress, table: &ResultTable) {
        let _ = (progress, table);
    }

    /// Called when the extraction call for a page failed. The run continues.
    fn on_page_error(&self, page_num: usize, pages_total: usize, failure: &ExtractionFailure) {
        let _ = (page_num, pages_total, failure);
    }

    /// Called once the run reached a terminal phase.
    fn on_run_finished(&self, state: &RunState) {
        let _ = state;
    }
}

/// A no-op sink, used when none is configured.
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type SharedProgressSink = Arc<dyn ProgressSink>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::output::Schema;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        pages: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ProgressSink for CountingSink {
        fn on_page_complete(&self, _progress: &PageProgress, _table: &ResultTable) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page: usize, _total: usize, _failure: &ExtractionFailure) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_sink_does_not_panic() {
        let sink = NoopProgressSink;
        let table = ResultTable::new(Schema::new(["A"]));
        let state = RunState::begin(2);
        sink.on_run_start(2);
        sink.on_page_start(1, 2);
        sink.on_page_complete(&PageProgress::from_state(1, &state), &table);
        sink.on_page_error(2, 2, &ExtractionFailure::new(2, FailureKind::Transient, "boom"));
        sink.on_run_finished(&state);
    }

    #[test]
    fn overridden_methods_are_called_through_arc_dyn() {
        let counting = Arc::new(CountingSink::default());
        let sink: SharedProgressSink = counting.clone();
        let table = ResultTable::new(Schema::new(["A"]));
        let state = RunState::begin(1);

        sink.on_page_complete(&PageProgress::from_state(1, &state), &table);
        sink.on_page_error(1, 1, &ExtractionFailure::new(1, FailureKind::Authentication, "401"));

        assert_eq!(counting.pages.load(Ordering::SeqCst), 1);
        assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn progress_mirrors_state() {
        let mut state = RunState::begin(3);
        state.record_page(Duration::from_secs(4), Duration::from_secs(4), true, false);
        let p = PageProgress::from_state(7, &state);
        assert_eq!(p.page_num, 7);
        assert_eq!(p.pages_processed, 1);
        assert_eq!(p.pages_total, 3);
        assert_eq!(p.estimated_remaining, Duration::from_secs(8));
        assert_eq!(p.phase, RunPhase::Running);
    }
}
