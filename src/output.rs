//! Output types: the accumulated table, the run state and run statistics.

use crate::config::Locale;
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ── Schema & records ─────────────────────────────────────────────────────

/// Ordered column captions. Column identity is the position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// The nine-column connection register with captions in `locale`.
    pub fn connection_register(locale: Locale) -> Self {
        Self::new(prompts::column_captions(locale).iter().copied())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One row of the target table: exactly one value per schema column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: Vec<String>,
}

impl Record {
    /// Map `values` positionally onto `width` columns, padding missing
    /// trailing values with empty strings and dropping surplus ones.
    pub fn fit<I, S>(values: I, width: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = values.into_iter().take(width).map(Into::into).collect();
        values.resize(width, String::new());
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Value of the column at `index`, if the schema has one.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }
}

// ── Result table ─────────────────────────────────────────────────────────

/// The table accumulated over a run.
///
/// Rows are only ever appended or pruned by
/// [`crate::pipeline::accumulate`]; callers get `&ResultTable` snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTable {
    columns: Schema,
    rows: Vec<Record>,
}

impl ResultTable {
    pub fn new(schema: Schema) -> Self {
        Self {
            columns: schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Record> {
        &mut self.rows
    }

    /// Serialise to comma-separated text: schema captions as the header,
    /// one line per record, `\n` line endings.
    ///
    /// Fields are quoted only when they contain a comma, a quote, a line
    /// break, or leading/trailing whitespace; quotes inside are doubled.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_csv_line(&mut out, self.columns.columns());
        for row in &self.rows {
            push_csv_line(&mut out, row.values());
        }
        out
    }

    /// Write [`Self::to_csv`] to `path` atomically: a temp file in the same
    /// directory is written, then renamed over the target.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), crate::Pdf2CsvError> {
        use std::io::Write;

        let path = path.as_ref();
        let write_err = |source: std::io::Error| crate::Pdf2CsvError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        tmp.write_all(self.to_csv().as_bytes()).map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

fn push_csv_line<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let field = field.as_ref();
        if needs_quotes(field) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

fn needs_quotes(field: &str) -> bool {
    field.contains([',', '"', '\n', '\r'])
        || field.starts_with(char::is_whitespace)
        || field.ends_with(char::is_whitespace)
}

// ── Run state ────────────────────────────────────────────────────────────

/// Lifecycle of one conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunPhase {
    /// No run has started.
    #[default]
    Idle,
    /// Pages are being processed.
    Running,
    /// A stop was requested; it takes effect at the next page boundary.
    Stopping,
    /// Every page was processed and at least one parsed into rows, even if
    /// those rows were later pruned as repeated headers.
    Completed,
    /// Every page was processed but none parsed into rows.
    CompletedEmpty,
    /// The run halted on a stop request; the table holds the pages done so far.
    Stopped,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunPhase::Completed | RunPhase::CompletedEmpty | RunPhase::Stopped
        )
    }
}

/// Counters and timing samples of a run.
///
/// `estimated_remaining` is `last_page_duration × remaining pages`: a single
/// sample, so it jumps whenever one page is much slower or faster than the
/// previous one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunState {
    pub phase: RunPhase,
    pub pages_total: usize,
    /// Pages attempted, including those whose extraction failed.
    pub pages_processed: usize,
    /// Pages whose reply parsed into at least one row, counted before header
    /// pruning.
    pub pages_with_rows: usize,
    /// Pages whose extraction call failed.
    pub failed_pages: usize,
    pub elapsed: Duration,
    pub last_page_duration: Duration,
    pub estimated_remaining: Duration,
}

impl RunState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub(crate) fn begin(pages_total: usize) -> Self {
        Self {
            phase: RunPhase::Running,
            pages_total,
            ..Self::default()
        }
    }

    pub fn remaining_pages(&self) -> usize {
        self.pages_total.saturating_sub(self.pages_processed)
    }

    /// Account for one finished page.
    pub(crate) fn record_page(
        &mut self,
        page_duration: Duration,
        elapsed: Duration,
        yielded_rows: bool,
        failed: bool,
    ) {
        if self.pages_processed < self.pages_total {
            self.pages_processed += 1;
        }
        if yielded_rows {
            self.pages_with_rows += 1;
        }
        if failed {
            self.failed_pages += 1;
        }
        self.elapsed = elapsed;
        self.last_page_duration = page_duration;
        let remaining = u32::try_from(self.remaining_pages()).unwrap_or(u32::MAX);
        self.estimated_remaining = page_duration.saturating_mul(remaining);
    }

    /// Settle the terminal phase.
    pub(crate) fn finish(&mut self, stopped: bool, elapsed: Duration) {
        self.elapsed = elapsed;
        self.phase = if stopped {
            RunPhase::Stopped
        } else if self.pages_with_rows > 0 {
            RunPhase::Completed
        } else {
            RunPhase::CompletedEmpty
        };
        if !stopped {
            self.estimated_remaining = Duration::ZERO;
        }
    }
}

// ── Final output ─────────────────────────────────────────────────────────

/// Aggregate statistics of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub rows: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Time spent inside extraction calls.
    pub extraction_duration_ms: u64,
    /// Wall-clock time of the run, delays included.
    pub total_duration_ms: u64,
}

/// Everything a finished (or stopped) run hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub table: ResultTable,
    pub state: RunState,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Shorthand for `self.table.to_csv()`.
    pub fn csv(&self) -> String {
        self.table.to_csv()
    }
}

/// What [`crate::convert::inspect`] reports about a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub source: String,
    pub page_count: usize,
    pub byte_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> ResultTable {
        let mut t = ResultTable::new(Schema::new(["X", "Y"]));
        for r in rows {
            t.rows_mut().push(Record::fit(r.iter().copied(), 2));
        }
        t
    }

    #[test]
    fn record_fit_pads_and_truncates() {
        assert_eq!(Record::fit(["a"], 3).values(), &["a", "", ""]);
        assert_eq!(Record::fit(["a", "b", "c", "d"], 2).values(), &["a", "b"]);
    }

    #[test]
    fn connection_register_schema_has_nine_columns() {
        let s = Schema::connection_register(Locale::En);
        assert_eq!(s.len(), 9);
        assert_eq!(s.columns()[0], "Entity");
        assert_eq!(s.columns()[3], "Connection power [kW]");
    }

    #[test]
    fn csv_header_only_for_empty_table() {
        assert_eq!(table(&[]).to_csv(), "X,Y\n");
    }

    #[test]
    fn csv_minimal_quoting() {
        let t = table(&[&["plain", "a,b"], &["say \"hi\"", "two\nlines"], &[" pad", ""]]);
        assert_eq!(
            t.to_csv(),
            "X,Y\nplain,\"a,b\"\n\"say \"\"hi\"\"\",\"two\nlines\"\n\" pad\",\n"
        );
    }

    #[test]
    fn write_csv_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/result.csv");
        table(&[&["1", "2"]]).write_csv(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "X,Y\n1,2\n");
    }

    #[test]
    fn estimator_uses_last_sample_only() {
        let mut s = RunState::begin(4);
        s.record_page(Duration::from_secs(2), Duration::from_secs(2), true, false);
        assert_eq!(s.estimated_remaining, Duration::from_secs(6));
        s.record_page(Duration::from_secs(10), Duration::from_secs(18), false, false);
        assert_eq!(s.estimated_remaining, Duration::from_secs(20));
        assert_eq!(s.pages_processed, 2);
        assert_eq!(s.remaining_pages(), 2);
    }

    #[test]
    fn processed_never_exceeds_total() {
        let mut s = RunState::begin(1);
        s.record_page(Duration::ZERO, Duration::ZERO, false, true);
        s.record_page(Duration::ZERO, Duration::ZERO, false, true);
        assert_eq!(s.pages_processed, 1);
        assert_eq!(s.estimated_remaining, Duration::ZERO);
    }

    #[test]
    fn finish_distinguishes_empty_runs() {
        let mut empty = RunState::begin(2);
        empty.record_page(Duration::ZERO, Duration::ZERO, false, false);
        empty.record_page(Duration::ZERO, Duration::ZERO, false, true);
        empty.finish(false, Duration::ZERO);
        assert_eq!(empty.phase, RunPhase::CompletedEmpty);

        let mut full = RunState::begin(1);
        full.record_page(Duration::ZERO, Duration::ZERO, true, false);
        full.finish(false, Duration::ZERO);
        assert_eq!(full.phase, RunPhase::Completed);

        let mut stopped = RunState::begin(3);
        stopped.record_page(Duration::from_secs(1), Duration::from_secs(1), true, false);
        stopped.finish(true, Duration::from_secs(1));
        assert_eq!(stopped.phase, RunPhase::Stopped);
        assert!(stopped.phase.is_terminal());
        assert!(!RunPhase::Stopping.is_terminal());
    }
}
