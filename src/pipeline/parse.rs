//! Record parsing: turn the model's CSV-ish reply into schema records.
//!
//! The model is asked for a CSV frame but answers in free text, so parsing is
//! tolerant by construction:
//!
//! 1. Code-fence markers are removed anywhere in the text, line endings are
//!    normalised and the result is trimmed.
//! 2. The text is read as comma-separated values with `"` quoting (doubled
//!    quotes escape, quoted fields may span lines). The first non-blank
//!    record is the header.
//! 3. A record that cannot be split (unterminated quote, text after a closing
//!    quote, more fields than the header) is skipped on its own; the rest of
//!    the page still parses.
//! 4. A page without data rows yields an empty vector.
//!
//! Values are mapped onto the schema by position. Short rows are padded with
//! empty strings, surplus columns are dropped, nothing is reordered.

use crate::output::{Record, Schema};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::debug;

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:csv|CSV)?").unwrap());

/// Strip code fences, normalise line endings and trim.
pub fn clean_model_output(text: &str) -> String {
    let s = RE_FENCE.replace_all(text, "");
    s.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Parse one page of model output into records of `schema`.
pub fn parse_records(text: &str, schema: &Schema) -> Vec<Record> {
    let cleaned = clean_model_output(text);
    let mut rows = split_rows(&cleaned).into_iter();

    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let width = header.len();

    let mut records = Vec::new();
    for fields in rows {
        if fields.len() > width {
            debug!(
                "Skipping row with {} fields (header has {}): {:?}",
                fields.len(),
                width,
                fields
            );
            continue;
        }
        records.push(Record::fit(fields, schema.len()));
    }
    records
}

/// Split cleaned text into rows of fields, skipping blank and malformed lines.
fn split_rows(text: &str) -> Vec<Vec<String>> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut rows = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }

        // Keep feeding lines while a quoted field is still open.
        let mut splitter = FieldSplitter::new();
        let mut last = i;
        let mut outcome = splitter.feed(lines[i]);
        while outcome.is_ok() && splitter.in_quotes() && last + 1 < lines.len() {
            last += 1;
            outcome = splitter.feed("\n").and_then(|()| splitter.feed(lines[last]));
        }

        match outcome.and_then(|()| splitter.finish()) {
            Ok(fields) => {
                rows.push(fields);
                i = last + 1;
            }
            Err(e) => {
                debug!("Skipping malformed line {}: {} ({:?})", i + 1, e, lines[i]);
                i += 1;
            }
        }
    }

    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldError {
    UnterminatedQuote,
    TextAfterClosingQuote,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::UnterminatedQuote => f.write_str("unterminated quoted field"),
            FieldError::TextAfterClosingQuote => f.write_str("text after closing quote"),
        }
    }
}

#[derive(Clone, Copy)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    /// Just saw a `"` inside a quoted field: either an escape or the end.
    QuoteInQuoted,
    /// Closing quote seen, only whitespace may precede the next comma.
    AfterQuote,
}

/// Incremental splitter for one record, which may span lines inside quotes.
///
/// Each fed chunk is scanned once, so growing a record line by line stays
/// linear in its length.
struct FieldSplitter {
    fields: Vec<String>,
    field: String,
    state: State,
}

impl FieldSplitter {
    fn new() -> Self {
        Self {
            fields: Vec::new(),
            field: String::new(),
            state: State::FieldStart,
        }
    }

    fn in_quotes(&self) -> bool {
        matches!(self.state, State::Quoted)
    }

    fn feed(&mut self, chunk: &str) -> Result<(), FieldError> {
        for c in chunk.chars() {
            self.state = match (self.state, c) {
                (State::FieldStart, '"') => State::Quoted,
                (State::FieldStart | State::Unquoted | State::QuoteInQuoted | State::AfterQuote, ',') => {
                    self.fields.push(std::mem::take(&mut self.field));
                    State::FieldStart
                }
                (State::FieldStart | State::Unquoted, c) => {
                    self.field.push(c);
                    State::Unquoted
                }
                (State::Quoted, '"') => State::QuoteInQuoted,
                (State::Quoted, c) => {
                    self.field.push(c);
                    State::Quoted
                }
                (State::QuoteInQuoted, '"') => {
                    self.field.push('"');
                    State::Quoted
                }
                (State::QuoteInQuoted | State::AfterQuote, c) if c.is_whitespace() => {
                    State::AfterQuote
                }
                (State::QuoteInQuoted | State::AfterQuote, _) => {
                    return Err(FieldError::TextAfterClosingQuote)
                }
            };
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<String>, FieldError> {
        if self.in_quotes() {
            return Err(FieldError::UnterminatedQuote);
        }
        self.fields.push(self.field);
        Ok(self.fields)
    }
}
