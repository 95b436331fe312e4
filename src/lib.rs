//! # edgequake-pdf2csv
//!
//! Convert tabular PDF registers to CSV, one page at a time, using a
//! multimodal LLM.
//!
//! ## Why this crate?
//!
//! Grid-connection registers published as PDF are long, dense tables whose
//! layout defeats text extraction: wrapped cells, rotated headers and merged
//! columns come out as a jumble. Instead each page is cut out as its own
//! single-page PDF and handed to the model together with a fixed instruction
//! naming the nine target columns. The reply is parsed leniently and folded
//! into one table.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Segment    split into single-page PDFs via pdfium (spawn_blocking)
//!  ├─ 3. Extract    one LLM call per page, paced by a fixed delay
//!  ├─ 4. Parse      tolerant CSV → schema records
//!  ├─ 5. Accumulate append, drop repeated header rows
//!  └─ 6. Output     ResultTable + RunState + token stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2csv::{convert, ConversionConfig, Locale};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GEMINI_API_KEY unless a key is set on the config.
//!     let config = ConversionConfig::builder().locale(Locale::En).build()?;
//!     let output = convert("register.pdf", &config).await?;
//!     print!("{}", output.csv());
//!     eprintln!("{:?}: {} rows", output.state.phase, output.stats.rows);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2csv` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2csv = { version = "0.1", default-features = false }
//! ```
//!
//! ## Rate limiting
//!
//! Pages are never processed concurrently. Between two extraction calls the
//! converter waits [`config::DEFAULT_INTER_PAGE_DELAY`] (6 s, i.e. 10 requests
//! per minute) unless configured otherwise. There are no retries: a page
//! whose call fails is logged, reported to the progress sink and skipped.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod converter;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, Locale, PageRange, PageSelection};
pub use convert::{
    convert, convert_cancellable, convert_from_bytes, convert_sync, convert_to_file, inspect,
};
pub use converter::Converter;
pub use error::{ExtractionFailure, FailureKind, Pdf2CsvError};
pub use output::{
    ConversionOutput, ConversionStats, DocumentInfo, Record, ResultTable, RunPhase, RunState,
    Schema,
};
pub use pipeline::extract::{Completion, ExtractionBackend, ExtractionRequest, LlmBackend};
pub use pipeline::segment::Document;
pub use progress::{NoopProgressSink, PageProgress, ProgressSink, SharedProgressSink};
pub use tokio_util::sync::CancellationToken;
