//! Pipeline stages for PDF-to-CSV conversion.
//!
//! Each submodule implements exactly one transformation step; the
//! [`crate::converter::Converter`] drives them page by page.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ segment ──▶ extract ──▶ parse ──▶ accumulate
//! (URL/path) (pdfium)    (LLM)       (CSV)     (table)
//! ```
//!
//! 1. [`input`]     : read the user-supplied path or download the URL
//! 2. [`segment`]   : split the document into single-page PDFs; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`extract`]   : one LLM call per page with the locale's instruction;
//!    the only stage with network I/O after acquisition
//! 4. [`parse`]     : tolerant CSV parsing of the reply onto the schema
//! 5. [`accumulate`]: append to the run's table and prune repeated headers

pub mod accumulate;
pub mod extract;
pub mod input;
pub mod parse;
pub mod segment;
