//! Error types for the edgequake-pdf2csv library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2CsvError`]: **Fatal**: a run cannot start or its output cannot be
//!   delivered (missing API key, invalid page range, unreadable PDF, output
//!   file not writable). Returned as `Err(Pdf2CsvError)` from the `convert*`
//!   functions and from [`crate::converter::Converter::run`].
//!
//! * [`ExtractionFailure`]: **Non-fatal**: the extraction call for a single
//!   page failed. The page counts as processed with no rows, the failure is
//!   reported to the progress sink as a warning and the run moves on.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2csv library.
#[derive(Debug, Error)]
pub enum Pdf2CsvError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// No API key is available for the extraction provider.
    #[error("No API key configured for provider '{provider}'.\nSet {env_var} or pass --api-key.")]
    MissingCredential { provider: String, env_var: String },

    /// The requested page range violates `1 <= start <= end <= total`.
    #[error("Invalid page range {start}-{end} (document has {total} pages)")]
    InvalidPageRange {
        start: usize,
        end: usize,
        total: usize,
    },

    /// A run is already active on this converter.
    #[error("A conversion is already running on this converter")]
    RunAlreadyActive,

    /// The provider factory rejected the provider/model combination.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Acquisition errors ────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read but do not start with the PDF magic.
    #[error("'{source_name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF")]
    WrongPassword,

    /// A page could not be copied into its own single-page PDF.
    #[error("Failed to split out page {page}: {detail}")]
    SegmentationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the pdf2csv executable.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2CsvError {
    /// True for errors that stop a run from ever entering `Running`
    /// because of how it was configured (as opposed to the input document).
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Pdf2CsvError::MissingCredential { .. }
                | Pdf2CsvError::InvalidPageRange { .. }
                | Pdf2CsvError::RunAlreadyActive
                | Pdf2CsvError::ProviderNotConfigured { .. }
                | Pdf2CsvError::InvalidConfig(_)
        )
    }
}

/// Why an extraction call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// Rejected credentials or missing permissions (401/403).
    Authentication,
    /// Overload, rate limiting, network trouble: the next page may well succeed.
    Transient,
    /// The service refused the request itself (400, unsupported payload).
    MalformedRequest,
}

/// A non-fatal extraction failure for a single page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("Page {page}: {kind:?} extraction failure: {detail}")]
pub struct ExtractionFailure {
    pub page: usize,
    pub kind: FailureKind,
    pub detail: String,
}

impl ExtractionFailure {
    pub fn new(page: usize, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            page,
            kind,
            detail: detail.into(),
        }
    }

    /// Classify a provider error message.
    ///
    /// Provider crates surface HTTP failures as formatted strings, so the
    /// status code or the provider's wording is all there is to go on.
    pub fn classify(page: usize, message: impl Into<String>) -> Self {
        let detail = message.into();
        let lower = detail.to_lowercase();

        let kind = if ["401", "403", "unauthorized", "forbidden", "api key", "api_key", "permission denied", "authentication"]
            .iter()
            .any(|m| lower.contains(m))
        {
            FailureKind::Authentication
        } else if ["400", "invalid argument", "invalid_argument", "bad request", "invalid request", "unsupported"]
            .iter()
            .any(|m| lower.contains(m))
        {
            FailureKind::MalformedRequest
        } else {
            FailureKind::Transient
        };

        Self { page, kind, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_range_display() {
        let e = Pdf2CsvError::InvalidPageRange {
            start: 5,
            end: 3,
            total: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("5-3"), "got: {msg}");
        assert!(msg.contains("10 pages"), "got: {msg}");
    }

    #[test]
    fn missing_credential_names_env_var() {
        let e = Pdf2CsvError::MissingCredential {
            provider: "gemini".into(),
            env_var: "GEMINI_API_KEY".into(),
        };
        assert!(e.to_string().contains("GEMINI_API_KEY"));
        assert!(e.is_configuration_error());
    }

    #[test]
    fn acquisition_errors_are_not_configuration_errors() {
        let e = Pdf2CsvError::FileNotFound {
            path: PathBuf::from("/tmp/missing.pdf"),
        };
        assert!(!e.is_configuration_error());
    }

    #[test]
    fn classify_auth_failures() {
        let f = ExtractionFailure::classify(2, "HTTP 403: API key not valid. Please pass a valid API key.");
        assert_eq!(f.kind, FailureKind::Authentication);
        assert_eq!(f.page, 2);
    }

    #[test]
    fn classify_malformed_request() {
        let f = ExtractionFailure::classify(1, "status 400 INVALID_ARGUMENT: request payload size exceeds the limit");
        assert_eq!(f.kind, FailureKind::MalformedRequest);
    }

    #[test]
    fn classify_defaults_to_transient() {
        let f = ExtractionFailure::classify(7, "503 Service Unavailable: the model is overloaded");
        assert_eq!(f.kind, FailureKind::Transient);
        assert!(f.to_string().contains("Page 7"));
    }
}
