//! Configuration types for PDF-to-CSV conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The builder clamps numeric knobs into
//! their valid ranges and `build()` rejects the combinations that cannot work.

use crate::error::Pdf2CsvError;
use crate::progress::ProgressSink;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Provider used when none is named.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used when none is named.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Minimum spacing between two extraction calls.
///
/// Six seconds keeps a sequential run at 10 requests per minute, the free-tier
/// ceiling of the Gemini API.
pub const DEFAULT_INTER_PAGE_DELAY: Duration = Duration::from_secs(6);

/// Configuration for a PDF-to-CSV conversion.
///
/// # Example
/// ```rust
/// use edgequake_pdf2csv::{ConversionConfig, Locale, PageRange};
///
/// let config = ConversionConfig::builder()
///     .locale(Locale::En)
///     .pages(PageRange::new(2, 5))
///     .model("gemini-2.0-flash-lite")
///     .build()
///     .unwrap();
/// assert_eq!(config.locale, Locale::En);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Language of the instruction sent with each page and of the CSV
    /// header captions. Default: [`Locale::Pl`].
    pub locale: Locale,

    /// LLM model identifier. Default: `gemini-2.0-flash`.
    pub model: String,

    /// LLM provider name understood by `edgequake_llm::ProviderFactory`.
    /// Default: `gemini`.
    pub provider_name: String,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`
    /// and satisfies the credential precondition on its own.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// API key for `provider_name`. When `None` the provider's key variable
    /// (see [`api_key_var`]) is consulted.
    pub api_key: Option<String>,

    /// Sampling temperature. Default: 0.7.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 65 536.
    ///
    /// Dense register pages produce long CSV frames; a low cap silently cuts
    /// the last rows off.
    pub max_tokens: usize,

    /// Pages to convert. Default: the whole document.
    pub pages: PageSelection,

    /// Fixed pause between consecutive extraction calls. Default: 6 s.
    ///
    /// Applied after every page except the last, whether the page succeeded
    /// or not. This is a rate floor, not a backoff.
    pub inter_page_delay: Duration,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives per-page progress events. Default: none.
    pub progress_sink: Option<Arc<dyn ProgressSink>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            model: DEFAULT_MODEL.to_string(),
            provider_name: DEFAULT_PROVIDER.to_string(),
            provider: None,
            api_key: None,
            temperature: 0.7,
            max_tokens: 65_536,
            pages: PageSelection::All,
            inter_page_delay: DEFAULT_INTER_PAGE_DELAY,
            password: None,
            download_timeout_secs: 120,
            progress_sink: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("locale", &self.locale)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("pages", &self.pages)
            .field("inter_page_delay", &self.inter_page_delay)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("progress_sink", &self.progress_sink.as_ref().map(|_| "<dyn ProgressSink>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The API key for the configured provider: the explicit one first,
    /// then the provider's environment variable. Empty strings count as absent.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(api_key_var(&self.provider_name)).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Environment variable holding the API key of a provider.
pub fn api_key_var(provider_name: &str) -> String {
    match provider_name.to_lowercase().as_str() {
        "gemini" | "google" => "GEMINI_API_KEY".to_string(),
        "openai" => "OPENAI_API_KEY".to_string(),
        "anthropic" => "ANTHROPIC_API_KEY".to_string(),
        "mistral" => "MISTRAL_API_KEY".to_string(),
        other => format!("{}_API_KEY", other.to_uppercase().replace('-', "_")),
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn locale(mut self, locale: Locale) -> Self {
        self.config.locale = locale;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn pages(mut self, range: PageRange) -> Self {
        self.config.pages = PageSelection::Range(range);
        self
    }

    /// Convert from `start` to the last page of the document.
    pub fn pages_from(mut self, start: usize) -> Self {
        self.config.pages = PageSelection::From(start);
        self
    }

    pub fn inter_page_delay(mut self, delay: Duration) -> Self {
        self.config.inter_page_delay = delay;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.config.progress_sink = Some(sink);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// The page range is only checked for `1 <= start <= end` here; the upper
    /// bound needs the document and is checked before the run starts.
    pub fn build(self) -> Result<ConversionConfig, Pdf2CsvError> {
        let c = &self.config;
        match c.pages {
            PageSelection::Range(range) if range.start < 1 || range.start > range.end => {
                return Err(Pdf2CsvError::InvalidConfig(format!(
                    "page range must satisfy 1 <= start <= end, got {}-{}",
                    range.start, range.end
                )));
            }
            PageSelection::From(0) => {
                return Err(Pdf2CsvError::InvalidConfig(
                    "pages are 1-indexed, start page must be at least 1".into(),
                ));
            }
            _ => {}
        }
        if c.model.trim().is_empty() {
            return Err(Pdf2CsvError::InvalidConfig("model must not be empty".into()));
        }
        if c.provider.is_none() && c.provider_name.trim().is_empty() {
            return Err(Pdf2CsvError::InvalidConfig(
                "either a provider or a provider name is required".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums & value types ──────────────────────────────────────────────────

/// Language of the extraction instruction and of the table captions.
///
/// The set is closed; adding a language means adding a variant and its rows
/// in [`crate::prompts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Locale {
    /// Polish (default; the registers this tool targets are Polish).
    #[default]
    Pl,
    /// English.
    En,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::Pl, Locale::En];

    /// Map a language code to a locale; unknown codes fall back to the default.
    pub fn from_code(code: &str) -> Locale {
        match code.trim().to_lowercase().as_str() {
            "pl" | "pl-pl" | "polish" => Locale::Pl,
            "en" | "en-us" | "en-gb" | "english" => Locale::En,
            other => {
                warn!("Unknown locale '{}', falling back to '{}'", other, Locale::default().code());
                Locale::default()
            }
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Locale::Pl => "pl",
            Locale::En => "en",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A contiguous, 1-indexed, inclusive page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The range covering every page of a document.
    pub fn all(total_pages: usize) -> Self {
        Self {
            start: 1,
            end: total_pages,
        }
    }

    /// Number of pages in the range. Zero for an inverted range.
    pub fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check `1 <= start <= end <= total_pages`.
    pub fn validate(&self, total_pages: usize) -> Result<(), Pdf2CsvError> {
        if self.start < 1 || self.start > self.end || self.end > total_pages {
            return Err(Pdf2CsvError::InvalidPageRange {
                start: self.start,
                end: self.end,
                total: total_pages,
            });
        }
        Ok(())
    }

    /// Iterate the 1-based page numbers in ascending order.
    pub fn pages(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// The pages a run should cover, as configured before the document is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    #[default]
    All,
    Range(PageRange),
    /// From a start page through the last page.
    From(usize),
}

impl PageSelection {
    /// Fix the selection against a document of `total_pages` pages.
    ///
    /// Bounds are not checked here; see [`PageRange::validate`].
    pub fn resolve(self, total_pages: usize) -> PageRange {
        match self {
            PageSelection::All => PageRange::all(total_pages),
            PageSelection::Range(range) => range,
            PageSelection::From(start) => PageRange::new(start, total_pages),
        }
    }
}
