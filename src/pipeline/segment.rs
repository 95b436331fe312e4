//! Segmentation: split a PDF into self-contained single-page PDFs.
//!
//! The extraction service receives one page at a time, so every page is
//! copied into its own document once, at load time. After that the
//! [`Document`] is an immutable list of page payloads and [`segment`] is a
//! pure slice over it.
//!
//! pdfium is not async-safe, so loading runs inside `spawn_blocking`.

use crate::config::PageRange;
use crate::error::Pdf2CsvError;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// One page, as a standalone PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePayload {
    /// 1-indexed page number in the source document.
    pub page_num: usize,
    pub bytes: Arc<[u8]>,
}

/// A loaded document: an ordered list of single-page PDFs.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pages: Vec<Arc<[u8]>>,
}

impl Document {
    /// Build a document from pages that are already split.
    pub fn from_pages<I, B>(pages: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        Self {
            pages: pages.into_iter().map(|p| Arc::from(p.into())).collect(),
        }
    }

    /// Load a PDF and split it into single-page PDFs.
    pub async fn from_pdf_bytes(
        bytes: Vec<u8>,
        password: Option<&str>,
    ) -> Result<Self, Pdf2CsvError> {
        let password = password.map(str::to_string);

        let pages = tokio::task::spawn_blocking(move || {
            split_pdf_blocking(&bytes, password.as_deref())
        })
        .await
        .map_err(|e| Pdf2CsvError::Internal(format!("Split task panicked: {}", e)))??;

        Ok(Self::from_pages(pages))
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Bytes of the 1-indexed page `page_num`.
    pub fn page(&self, page_num: usize) -> Option<&[u8]> {
        self.shared_page(page_num).map(|p| &**p)
    }

    fn shared_page(&self, page_num: usize) -> Option<&Arc<[u8]>> {
        page_num.checked_sub(1).and_then(|i| self.pages.get(i))
    }
}

/// One payload per page of `range`, in ascending page order.
///
/// `range` must already be validated against the document; pages outside
/// the document are not produced.
pub fn segment(document: &Document, range: PageRange) -> Vec<PagePayload> {
    debug_assert!(range.validate(document.page_count()).is_ok());
    range
        .pages()
        .filter_map(|page_num| {
            document.shared_page(page_num).map(|bytes| PagePayload {
                page_num,
                bytes: Arc::clone(bytes),
            })
        })
        .collect()
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// Bind pdfium: `PDFIUM_LIB_PATH` first, then a library next to the
/// executable, then the system library.
fn bind_pdfium() -> Result<Pdfium, Pdf2CsvError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("."));
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&exe_dir))
                .or_else(|_| Pdfium::bind_to_system_library())
        }
    }
    .map_err(|e| Pdf2CsvError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn split_pdf_blocking(bytes: &[u8], password: Option<&str>) -> Result<Vec<Vec<u8>>, Pdf2CsvError> {
    let pdfium = bind_pdfium()?;

    let source = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    Pdf2CsvError::WrongPassword
                } else {
                    Pdf2CsvError::PasswordRequired
                }
            } else {
                Pdf2CsvError::CorruptPdf { detail: err_str }
            }
        })?;

    let total_pages = source.pages().len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut pages = Vec::with_capacity(total_pages);
    for idx in 0..total_pages {
        let page_num = idx + 1;
        let seg_err = |detail: String| Pdf2CsvError::SegmentationFailed {
            page: page_num,
            detail,
        };

        let index = PdfPageIndex::try_from(idx).map_err(|e| seg_err(e.to_string()))?;
        let mut single = pdfium
            .create_new_pdf()
            .map_err(|e| seg_err(format!("{:?}", e)))?;
        single
            .pages_mut()
            .copy_page_from_document(&source, index, 0)
            .map_err(|e| seg_err(format!("{:?}", e)))?;
        let page_bytes = single
            .save_to_bytes()
            .map_err(|e| seg_err(format!("{:?}", e)))?;

        debug!("Split page {} → {} bytes", page_num, page_bytes.len());
        pages.push(page_bytes);
    }

    Ok(pages)
}
