//! Entry points: from a path, URL or byte buffer to a finished table.
//!
//! Every entry point follows the same order:
//!
//! 1. acquire the PDF bytes ([`crate::pipeline::input`])
//! 2. resolve the LLM backend, failing fast on a missing credential
//! 3. load and split the document ([`Document::from_pdf_bytes`])
//! 4. resolve the configured page selection against the page count and run a
//!    [`Converter`] over it
//!
//! The backend is resolved before the document is loaded, so a missing key
//! is reported before pdfium is bound and the pages are split.

use crate::config::ConversionConfig;
use crate::converter::Converter;
use crate::error::Pdf2CsvError;
use crate::output::{ConversionOutput, ConversionStats, DocumentInfo};
use crate::pipeline::extract::LlmBackend;
use crate::pipeline::input::{self, SourcePdf};
use crate::pipeline::segment::Document;
use crate::progress::{NoopProgressSink, ProgressSink};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Convert a PDF file or URL to a CSV table.
///
/// # Arguments
/// * `input`: Local file path or HTTP/HTTPS URL to a PDF
/// * `config`: Conversion configuration
///
/// # Returns
/// `Ok(ConversionOutput)` whenever the run reached a terminal phase, even if
/// some or all pages failed to extract (see `output.state`).
///
/// # Errors
/// Returns `Err(Pdf2CsvError)` only when the run could not start:
/// configuration problems, unreadable or invalid input, pdfium failures.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2CsvError> {
    convert_cancellable(input_str, config, &CancellationToken::new()).await
}

/// [`convert`] with a stop signal.
///
/// Cancelling `cancel` stops the run at the next page boundary; the output
/// then has phase `Stopped` and holds every page finished before the stop.
pub async fn convert_cancellable(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
    cancel: &CancellationToken,
) -> Result<ConversionOutput, Pdf2CsvError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    let source = input::resolve_input(input_str, config.download_timeout_secs).await?;
    run_source(source, config, cancel).await
}

/// Convert PDF bytes already in memory.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2csv::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("register.pdf")?;
/// let config = ConversionConfig::default();
/// let output = convert_from_bytes(bytes, &config).await?;
/// print!("{}", output.csv());
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: Vec<u8>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2CsvError> {
    let source = input::from_bytes("<memory>", bytes)?;
    run_source(source, config, &CancellationToken::new()).await
}

/// Convert a PDF and write the CSV directly to a file.
///
/// The file is written atomically, and also for a stopped or empty run
/// (header only in the latter case).
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Pdf2CsvError> {
    let output = convert(input_str, config).await?;
    let path = output_path.as_ref();
    output.table.write_csv(path)?;
    info!("Wrote {} rows to {}", output.table.len(), path.display());
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2CsvError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2CsvError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Load a document and report its page count.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<DocumentInfo, Pdf2CsvError> {
    let source = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let byte_len = source.bytes.len();
    let document = Document::from_pdf_bytes(source.bytes, config.password.as_deref()).await?;
    Ok(DocumentInfo {
        source: source.name,
        page_count: document.page_count(),
        byte_len,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_source(
    source: SourcePdf,
    config: &ConversionConfig,
    cancel: &CancellationToken,
) -> Result<ConversionOutput, Pdf2CsvError> {
    let backend = LlmBackend::from_config(config)?;

    let document = Document::from_pdf_bytes(source.bytes, config.password.as_deref()).await?;
    let range = config.pages.resolve(document.page_count());
    info!(
        "{}: {} pages, converting {}",
        source.name,
        document.page_count(),
        range
    );

    let converter = Converter::from_config(backend, config);
    let sink: &dyn ProgressSink = match config.progress_sink {
        Some(ref sink) => sink.as_ref(),
        None => &NoopProgressSink,
    };
    converter.run(&document, range, cancel, sink).await
}
