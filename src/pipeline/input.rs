//! Input acquisition: turn a user-supplied path or URL into PDF bytes.
//!
//! Pages are split in memory, so both sources end up as a byte buffer. The
//! PDF magic (`%PDF`) is checked here so callers get a meaningful error
//! instead of a pdfium failure further down.

use crate::error::Pdf2CsvError;
use std::path::PathBuf;
use tracing::{debug, info};

/// PDF bytes together with a printable name of where they came from.
#[derive(Debug, Clone)]
pub struct SourcePdf {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to PDF bytes.
///
/// URLs are downloaded; anything else is read as a local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourcePdf, Pdf2CsvError> {
    if input.trim().is_empty() {
        return Err(Pdf2CsvError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Wrap in-memory bytes, validating the PDF magic.
pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<SourcePdf, Pdf2CsvError> {
    let name = name.into();
    check_magic(&name, &bytes)?;
    Ok(SourcePdf { name, bytes })
}

async fn read_local(path_str: &str) -> Result<SourcePdf, Pdf2CsvError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2CsvError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2CsvError::FileNotFound { path }),
    };

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    from_bytes(path.display().to_string(), bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourcePdf, Pdf2CsvError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2CsvError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2CsvError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2CsvError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2CsvError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2CsvError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    from_bytes(url, bytes.to_vec())
}

fn check_magic(name: &str, bytes: &[u8]) -> Result<(), Pdf2CsvError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(Pdf2CsvError::NotAPdf {
            source_name: name.to_string(),
            magic,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn from_bytes_rejects_non_pdf() {
        let err = from_bytes("notes.txt", b"hello world".to_vec()).unwrap_err();
        match err {
            Pdf2CsvError::NotAPdf { magic, .. } => assert_eq!(&magic, b"hell"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn from_bytes_rejects_short_input() {
        assert!(matches!(
            from_bytes("tiny", b"%P".to_vec()),
            Err(Pdf2CsvError::NotAPdf { .. })
        ));
    }

    #[test]
    fn from_bytes_accepts_pdf_magic() {
        let src = tokio_test::assert_ok!(from_bytes("mem", b"%PDF-1.7\n".to_vec()));
        assert_eq!(src.name, "mem");
        assert_eq!(src.bytes.len(), 9);
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = resolve_input("/definitely/not/a/real/file.pdf", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2CsvError::FileNotFound { .. }));
    }

    #[test]
    fn empty_input_is_invalid() {
        let err = tokio_test::assert_err!(tokio_test::block_on(resolve_input("  ", 5)));
        assert!(matches!(err, Pdf2CsvError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn local_non_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"PK\x03\x04zip").unwrap();
        let err = resolve_input(path.to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, Pdf2CsvError::NotAPdf { .. }));
    }
}
