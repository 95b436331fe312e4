//! Extraction: send one page to the LLM with the locale's instruction.
//!
//! Two layers:
//!
//! * [`ExtractionBackend`] is the external capability: one request in, raw
//!   text (or a failure) out. [`LlmBackend`] implements it on top of an
//!   `edgequake_llm` provider; tests substitute their own.
//! * [`Extractor`] is the adapter the pipeline talks to. It picks the
//!   instruction for the locale, packages the page and calls the backend
//!   exactly once. Retrying is not its business.

use crate::config::{api_key_var, ConversionConfig, Locale};
use crate::error::{ExtractionFailure, Pdf2CsvError};
use crate::pipeline::segment::PagePayload;
use crate::prompts;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{
    AnthropicProvider, ChatMessage, CompletionOptions, GeminiProvider, ImageData, LLMProvider,
    OpenAIProvider, OpenRouterProvider, ProviderFactory, ProviderType, XAIProvider,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// What the backend is asked to do for one page.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub page_num: usize,
    /// A standalone single-page PDF.
    pub pdf: &'a [u8],
    pub instruction: &'static str,
    pub locale: Locale,
}

/// Raw backend reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Raw text the service produced for a page. Not guaranteed to be CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub page_num: usize,
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration: Duration,
}

/// The external extraction capability.
///
/// One call per page, no retries, no timeout: a hung call blocks the run.
pub trait ExtractionBackend: Send + Sync {
    fn invoke(
        &self,
        request: ExtractionRequest<'_>,
    ) -> impl Future<Output = Result<Completion, ExtractionFailure>> + Send;
}

/// Adapter binding pages and locales to the backend's request contract.
pub struct Extractor<B> {
    backend: B,
}

impl<B: ExtractionBackend> Extractor<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Extract the raw table text of one page.
    pub async fn extract(
        &self,
        payload: &PagePayload,
        locale: Locale,
    ) -> Result<ExtractionResult, ExtractionFailure> {
        let request = ExtractionRequest {
            page_num: payload.page_num,
            pdf: &payload.bytes,
            instruction: prompts::instruction(locale),
            locale,
        };

        let start = Instant::now();
        let completion = self.backend.invoke(request).await?;
        let duration = start.elapsed();

        debug!(
            "Page {}: {} input tokens, {} output tokens, {:?}",
            payload.page_num, completion.input_tokens, completion.output_tokens, duration
        );

        Ok(ExtractionResult {
            page_num: payload.page_num,
            text: completion.text,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            duration,
        })
    }
}

// ── edgequake-llm backend ────────────────────────────────────────────────

/// Nucleus sampling bound sent with every request.
const TOP_P: f32 = 0.95;

/// [`ExtractionBackend`] over an `edgequake_llm` provider.
///
/// The page travels as an inline `application/pdf` attachment next to the
/// instruction text in a single user message.
pub struct LlmBackend {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmBackend {
    /// Wrap an already constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Resolve the provider from the configuration.
    ///
    /// A pre-built `config.provider` is used as-is. Otherwise an API key must
    /// be present (see [`ConversionConfig::resolve_api_key`]). An explicit
    /// `config.api_key` is handed straight to the provider's constructor;
    /// a key from the environment goes through `ProviderFactory`, which reads
    /// it from the provider's variable itself.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Pdf2CsvError> {
        if let Some(ref provider) = config.provider {
            return Ok(Self::new(Arc::clone(provider), config));
        }

        if config.resolve_api_key().is_none() {
            return Err(Pdf2CsvError::MissingCredential {
                provider: config.provider_name.clone(),
                env_var: api_key_var(&config.provider_name),
            });
        }

        let not_configured = |e: edgequake_llm::LlmError| Pdf2CsvError::ProviderNotConfigured {
            provider: config.provider_name.clone(),
            hint: format!("{e}"),
        };

        let explicit_key = config.api_key.as_deref().filter(|k| !k.trim().is_empty());
        let keyed = explicit_key
            .map(|key| provider_with_key(&config.provider_name, &config.model, key))
            .transpose()
            .map_err(not_configured)?
            .flatten();

        let provider = match keyed {
            Some(provider) => provider,
            None => ProviderFactory::create_llm_provider(&config.provider_name, &config.model)
                .map_err(not_configured)?,
        };

        Ok(Self::new(provider, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            top_p: Some(TOP_P),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

impl ExtractionBackend for LlmBackend {
    async fn invoke(&self, request: ExtractionRequest<'_>) -> Result<Completion, ExtractionFailure> {
        let messages = vec![ChatMessage::user_with_images(
            request.instruction,
            vec![encode_pdf_page(request.pdf)],
        )];
        let options = self.options();

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => Ok(Completion {
                text: response.content,
                input_tokens: response.prompt_tokens as u64,
                output_tokens: response.completion_tokens as u64,
            }),
            Err(e) => Err(ExtractionFailure::classify(request.page_num, e.to_string())),
        }
    }
}

/// Build a provider around an explicit key, without touching the environment.
///
/// `None` for providers that take no key or have no key constructor; those
/// are left to `ProviderFactory`.
fn provider_with_key(
    provider_name: &str,
    model: &str,
    key: &str,
) -> Result<Option<Arc<dyn LLMProvider>>, edgequake_llm::LlmError> {
    let provider: Arc<dyn LLMProvider> = match ProviderType::from_str(provider_name) {
        Some(ProviderType::Gemini) if !model.starts_with("vertexai:") => {
            Arc::new(GeminiProvider::new(key).with_model(model))
        }
        Some(ProviderType::OpenAI) => Arc::new(OpenAIProvider::new(key).with_model(model)),
        Some(ProviderType::Anthropic) => Arc::new(AnthropicProvider::new(key).with_model(model)),
        Some(ProviderType::OpenRouter) => Arc::new(OpenRouterProvider::new(key).with_model(model)),
        Some(ProviderType::XAI) => Arc::new(XAIProvider::new(key.to_string(), model.to_string(), None)?),
        _ => {
            debug!("No key constructor for provider '{}', using the factory", provider_name);
            return Ok(None);
        }
    };
    Ok(Some(provider))
}

/// Base64-wrap a single-page PDF for the multimodal request body.
pub fn encode_pdf_page(pdf: &[u8]) -> ImageData {
    ImageData::new(STANDARD.encode(pdf), "application/pdf")
}
