//! End-to-end integration tests for edgequake-pdf2csv.
//!
//! Tests marked e2e use real PDF files in `./test_cases/`, need a pdfium
//! library and make live LLM API calls. They are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested. The remaining tests fail before pdfium or the
//! network is touched and always run.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_inspect -- --nocapture

use edgequake_pdf2csv::{
    convert, convert_from_bytes, convert_to_file, inspect, ConversionConfig, Locale, PageRange,
    Pdf2CsvError, ProgressSink, RunPhase,
};
use std::path::PathBuf;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn register_pdf() -> PathBuf {
    test_cases_dir().join("register.pdf")
}

/// Minimal configuration for a keyless provider name, so the credential
/// check cannot be satisfied by a key in the developer's environment.
fn keyless_config() -> ConversionConfig {
    ConversionConfig::builder()
        .provider_name("e2e-keyless-provider")
        .inter_page_delay(Duration::ZERO)
        .build()
        .unwrap()
}

// ── Failures before any pdfium or network work ───────────────────────────────

#[tokio::test]
async fn test_convert_nonexistent_file() {
    let err = convert("/no/such/register.pdf", &keyless_config())
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2CsvError::FileNotFound { .. }), "{err}");
}

#[tokio::test]
async fn test_convert_from_bytes_rejects_non_pdf() {
    let err = convert_from_bytes(b"Podmiot,Siedziba\n".to_vec(), &keyless_config())
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2CsvError::NotAPdf { .. }), "{err}");
}

#[tokio::test]
async fn test_missing_credential_is_reported_before_loading() {
    // Valid magic, invalid body: only reaching pdfium would reveal that.
    let err = convert_from_bytes(b"%PDF-1.7 truncated".to_vec(), &keyless_config())
        .await
        .unwrap_err();
    match err {
        Pdf2CsvError::MissingCredential { provider, env_var } => {
            assert_eq!(provider, "e2e-keyless-provider");
            assert_eq!(env_var, "E2E_KEYLESS_PROVIDER_API_KEY");
        }
        other => panic!("expected MissingCredential, got {other}"),
    }
}

#[tokio::test]
async fn test_convert_to_file_writes_nothing_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("register.csv");
    let result = convert_to_file("/no/such/register.pdf", &out, &keyless_config()).await;
    assert!(result.is_err());
    assert!(!out.exists());
}

#[test]
fn test_progress_sink_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<std::sync::Arc<dyn ProgressSink>>();
}

// ── Live tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_register() {
    let path = e2e_skip_unless_ready!(register_pdf());
    let info = inspect(path.to_str().unwrap(), &ConversionConfig::default())
        .await
        .expect("inspect failed");
    assert!(info.page_count >= 1);
    assert!(info.byte_len > 0);
    println!("{} pages, {} bytes", info.page_count, info.byte_len);
}

#[tokio::test]
async fn test_convert_register_first_page_pl() {
    let path = e2e_skip_unless_ready!(register_pdf());
    let config = ConversionConfig::builder()
        .pages(PageRange::new(1, 1))
        .build()
        .unwrap();

    let output = convert(path.to_str().unwrap(), &config)
        .await
        .expect("conversion failed");

    assert_eq!(output.state.pages_processed, 1);
    assert!(output.state.phase.is_terminal());
    assert_eq!(output.table.schema().len(), 9);

    let csv = output.csv();
    assert!(csv.starts_with("Podmiot,"), "unexpected header: {csv}");
    assert!(!csv.contains("```"));
    for row in output.table.rows() {
        assert_eq!(row.values().len(), 9);
        assert!(!row.get(3).unwrap_or_default().contains("Moc przyłączeniowa"));
    }
    println!("{csv}");
}

#[tokio::test]
async fn test_convert_register_two_pages_en_to_file() {
    let path = e2e_skip_unless_ready!(register_pdf());
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("register_en.csv");

    let config = ConversionConfig::builder()
        .locale(Locale::En)
        .pages(PageRange::new(1, 2))
        .build()
        .unwrap();

    let stats = convert_to_file(path.to_str().unwrap(), &out, &config)
        .await
        .expect("conversion failed");

    let csv = std::fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("Entity,"));
    assert!(csv.lines().count() > stats.rows);
    // Two pages, one pause in between.
    assert!(stats.total_duration_ms >= 6_000);
}

#[tokio::test]
async fn test_convert_json_serialisable() {
    let path = e2e_skip_unless_ready!(register_pdf());
    let config = ConversionConfig::builder()
        .pages(PageRange::new(1, 1))
        .build()
        .unwrap();

    let output = convert(path.to_str().unwrap(), &config)
        .await
        .expect("conversion failed");

    let json = serde_json::to_value(&output).unwrap();
    assert!(json["table"]["columns"].is_array());
    assert!(json["state"]["phase"].is_string());
    assert!(matches!(
        output.state.phase,
        RunPhase::Completed | RunPhase::CompletedEmpty
    ));
}

#[tokio::test]
async fn test_page_range_beyond_document() {
    let path = e2e_skip_unless_ready!(register_pdf());
    if std::env::var("GEMINI_API_KEY").is_err() {
        println!("SKIP: GEMINI_API_KEY not set");
        return;
    }
    let config = ConversionConfig::builder()
        .pages(PageRange::new(1, 100_000))
        .build()
        .unwrap();
    let err = convert(path.to_str().unwrap(), &config).await.unwrap_err();
    assert!(matches!(err, Pdf2CsvError::InvalidPageRange { .. }), "{err}");
}
