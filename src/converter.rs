//! The conversion state machine.
//!
//! A [`Converter`] walks a page range strictly in order:
//!
//! ```text
//! Idle ──▶ Running ──┬──▶ Completed        (≥ 1 page parsed rows)
//!            │       ├──▶ CompletedEmpty   (no page parsed a row)
//!            ▼       │
//!         Stopping ──┴──▶ Stopped          (partial table kept)
//! ```
//!
//! Between two pages it sleeps for the configured inter-page delay, which
//! bounds the request rate against the extraction service. A stop request
//! (a cancelled [`CancellationToken`]) cuts that sleep short but is only
//! acted upon at the next page boundary: the page in flight always finishes
//! and is folded into the table.
//!
//! Extraction failures never abort a run. The page is reported through
//! `tracing` and [`ProgressSink::on_page_error`], counts as processed and
//! contributes no rows.

use crate::config::{ConversionConfig, Locale, PageRange};
use crate::error::Pdf2CsvError;
use crate::output::{ConversionOutput, ConversionStats, ResultTable, RunPhase, RunState, Schema};
use crate::pipeline::accumulate;
use crate::pipeline::extract::{ExtractionBackend, Extractor};
use crate::pipeline::parse::parse_records;
use crate::pipeline::segment::{segment, Document};
use crate::progress::{PageProgress, ProgressSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives extraction over a document, one page at a time.
///
/// A converter can be reused for many runs, but only one run may be active
/// at a time; an overlapping [`Converter::run`] fails with
/// [`Pdf2CsvError::RunAlreadyActive`].
pub struct Converter<B> {
    extractor: Extractor<B>,
    locale: Locale,
    inter_page_delay: Duration,
    active: AtomicBool,
}

impl<B: ExtractionBackend> Converter<B> {
    pub fn new(backend: B, locale: Locale, inter_page_delay: Duration) -> Self {
        Self {
            extractor: Extractor::new(backend),
            locale,
            inter_page_delay,
            active: AtomicBool::new(false),
        }
    }

    /// Take locale and delay from `config`.
    pub fn from_config(backend: B, config: &ConversionConfig) -> Self {
        Self::new(backend, config.locale, config.inter_page_delay)
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn inter_page_delay(&self) -> Duration {
        self.inter_page_delay
    }

    pub fn backend(&self) -> &B {
        self.extractor.backend()
    }

    /// Whether a run is currently in progress.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Convert `range` of `document`.
    ///
    /// Returns the table, the terminal [`RunState`] and statistics. A stopped
    /// run is not an error: the output carries `RunPhase::Stopped` and the
    /// rows of every page finished before the stop.
    ///
    /// # Errors
    /// Only preconditions fail the call: an out-of-bounds range
    /// ([`Pdf2CsvError::InvalidPageRange`]) or a run already active on this
    /// converter ([`Pdf2CsvError::RunAlreadyActive`]).
    pub async fn run(
        &self,
        document: &Document,
        range: PageRange,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<ConversionOutput, Pdf2CsvError> {
        range.validate(document.page_count())?;
        let _guard = self.claim()?;

        let run_start = Instant::now();
        let payloads = segment(document, range);
        let mut state = RunState::begin(payloads.len());
        let mut table = ResultTable::new(Schema::connection_register(self.locale));
        let mut stats = ConversionStats::default();
        let mut extraction_time = Duration::ZERO;

        info!(
            "Converting pages {} ({} pages, locale {})",
            range, state.pages_total, self.locale
        );
        sink.on_run_start(state.pages_total);

        let last = payloads.len().saturating_sub(1);
        for (i, payload) in payloads.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Stop requested, halting before page {}", payload.page_num);
                break;
            }

            sink.on_page_start(payload.page_num, state.pages_total);
            let page_start = Instant::now();

            let (yielded_rows, failed) = match self.extractor.extract(payload, self.locale).await {
                Ok(result) => {
                    stats.total_input_tokens += result.input_tokens;
                    stats.total_output_tokens += result.output_tokens;
                    extraction_time += result.duration;

                    let records = parse_records(&result.text, table.schema());
                    let parsed = records.len();
                    let pruned = accumulate::append(&mut table, records);
                    debug!(
                        "Page {}: {} rows parsed, {} header rows pruned",
                        payload.page_num, parsed, pruned
                    );
                    (parsed > 0, false)
                }
                Err(failure) => {
                    warn!("{}", failure);
                    sink.on_page_error(payload.page_num, state.pages_total, &failure);
                    (false, true)
                }
            };

            state.record_page(page_start.elapsed(), run_start.elapsed(), yielded_rows, failed);
            if cancel.is_cancelled() {
                state.phase = RunPhase::Stopping;
            }
            sink.on_page_complete(&PageProgress::from_state(payload.page_num, &state), &table);

            if i < last && !cancel.is_cancelled() {
                self.pause(cancel).await;
            }
        }

        // Tokens never un-cancel, so this also covers a stop after the last page.
        let stopped = cancel.is_cancelled();
        state.finish(stopped, run_start.elapsed());

        stats.rows = table.len();
        stats.extraction_duration_ms = extraction_time.as_millis() as u64;
        stats.total_duration_ms = state.elapsed.as_millis() as u64;

        info!(
            "Run finished: {:?}, {}/{} pages, {} rows, {} failed, {}ms",
            state.phase,
            state.pages_processed,
            state.pages_total,
            stats.rows,
            state.failed_pages,
            stats.total_duration_ms
        );
        sink.on_run_finished(&state);

        Ok(ConversionOutput { table, state, stats })
    }

    /// Wait out the inter-page delay, or until a stop is requested.
    async fn pause(&self, cancel: &CancellationToken) {
        if self.inter_page_delay.is_zero() {
            return;
        }
        debug!("Waiting {:?} before the next page", self.inter_page_delay);
        tokio::select! {
            _ = tokio::time::sleep(self.inter_page_delay) => {}
            _ = cancel.cancelled() => debug!("Delay cut short by stop request"),
        }
    }

    fn claim(&self) -> Result<ActiveRun<'_>, Pdf2CsvError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Pdf2CsvError::RunAlreadyActive)?;
        Ok(ActiveRun(&self.active))
    }
}

/// Releases the converter when the run ends, however it ends.
struct ActiveRun<'a>(&'a AtomicBool);

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionFailure;
    use crate::pipeline::extract::{Completion, ExtractionRequest};
    use crate::progress::NoopProgressSink;

    struct Fixed(&'static str);

    impl ExtractionBackend for Fixed {
        async fn invoke(&self, _: ExtractionRequest<'_>) -> Result<Completion, ExtractionFailure> {
            Ok(Completion::text(self.0))
        }
    }

    fn doc(n: usize) -> Document {
        Document::from_pages((1..=n).map(|i| format!("%PDF {i}").into_bytes()))
    }

    #[test]
    fn claim_is_exclusive_and_released_on_drop() {
        let c = Converter::new(Fixed(""), Locale::Pl, Duration::ZERO);
        let first = c.claim().unwrap();
        assert!(c.is_running());
        assert!(matches!(c.claim(), Err(Pdf2CsvError::RunAlreadyActive)));
        drop(first);
        assert!(!c.is_running());
        assert!(c.claim().is_ok());
    }

    #[tokio::test]
    async fn invalid_range_does_not_claim() {
        let c = Converter::new(Fixed(""), Locale::Pl, Duration::ZERO);
        let err = c
            .run(&doc(3), PageRange::new(2, 4), &CancellationToken::new(), &NoopProgressSink)
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2CsvError::InvalidPageRange { start: 2, end: 4, total: 3 }));
        assert!(!c.is_running());
    }

    #[tokio::test]
    async fn header_uses_converter_locale() {
        let c = Converter::new(Fixed("a,b\n1,2"), Locale::En, Duration::ZERO);
        let out = c
            .run(&doc(1), PageRange::all(1), &CancellationToken::new(), &NoopProgressSink)
            .await
            .unwrap();
        assert_eq!(out.table.schema().columns()[0], "Entity");
        assert_eq!(out.state.phase, RunPhase::Completed);
        assert_eq!(out.stats.rows, 1);
        assert!(!c.is_running());
    }

    #[tokio::test]
    async fn converter_is_reusable_after_a_run() {
        let c = Converter::new(Fixed("a\n1"), Locale::Pl, Duration::ZERO);
        let d = doc(2);
        for _ in 0..2 {
            let out = c
                .run(&d, PageRange::all(2), &CancellationToken::new(), &NoopProgressSink)
                .await
                .unwrap();
            assert_eq!(out.table.len(), 2);
            assert_eq!(out.state.pages_processed, 2);
        }
    }
}
