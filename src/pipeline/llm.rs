//! LLM backends used by the table normaliser.
//!
//! A backend turns one prompt into one completion. Every backend is an
//! `edgequake_llm` provider wrapped in [`ProviderBackend`]; an explicit API
//! key builds an [`AnthropicProvider`] directly, so a credential handed to
//! the library at startup is used as-is rather than looked up in the
//! environment.
//!
//! There are no retries here. A failed call is reported as a
//! [`NormalizeError`] and the caller keeps the table in its extracted form.

use crate::config::ExtractionConfig;
use crate::error::{NormalizeError, Pdf2XlsxError};
use async_trait::async_trait;
use edgequake_llm::{
    AnthropicProvider, ChatMessage, CompletionOptions, LLMProvider, LlmError, ProviderFactory,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Single-turn text completion.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Short label for logs, e.g. `anthropic/claude-3-sonnet-20240229`.
    fn label(&self) -> String;

    async fn complete(&self, prompt: &str) -> Result<String, NormalizeError>;
}

// ── edgequake-llm ────────────────────────────────────────────────────────

/// [`LlmBackend`] over an `edgequake_llm` provider.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
    timeout: Duration,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            options: build_options(config),
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }
}

#[async_trait]
impl LlmBackend for ProviderBackend {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn complete(&self, prompt: &str) -> Result<String, NormalizeError> {
        let messages = vec![ChatMessage::user(prompt)];
        let response = tokio::time::timeout(
            self.timeout,
            self.provider.chat(&messages, Some(&self.options)),
        )
        .await
        .map_err(|_| {
            NormalizeError::Request(format!("no answer within {}s", self.timeout.as_secs()))
        })?
        .map_err(classify_provider_error)?;
        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        if response.content.trim().is_empty() {
            return Err(NormalizeError::EmptyResponse);
        }
        Ok(response.content)
    }
}

fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Map a provider error onto the per-table taxonomy.
fn classify_provider_error(error: LlmError) -> NormalizeError {
    match error {
        LlmError::RateLimited(msg) => NormalizeError::RateLimited(msg),
        LlmError::AuthError(msg) => NormalizeError::Auth(msg),
        LlmError::NetworkError(msg) => NormalizeError::Request(msg),
        LlmError::Timeout => NormalizeError::Request("provider timed out".to_string()),
        other => NormalizeError::Api(other.to_string()),
    }
}

// ── Resolution ───────────────────────────────────────────────────────────

/// Pick the backend for a run, from most to least specific.
///
/// 1. A pre-built provider (`config.provider`).
/// 2. An explicit Anthropic API key (`config.api_key`).
/// 3. A named provider (`config.provider_name`) with `config.model`.
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, both set.
/// 5. `ANTHROPIC_API_KEY` in the environment.
/// 6. Full auto-detection via `ProviderFactory::from_env`.
pub fn resolve_backend(config: &ExtractionConfig) -> Result<Arc<dyn LlmBackend>, Pdf2XlsxError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(ProviderBackend::new(
            Arc::clone(provider),
            "custom",
            config,
        )));
    }

    if let Some(ref key) = config.api_key {
        return anthropic(key, config);
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model_or_default();
        return named_provider(name, model, config);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return named_provider(&prov, &model, config);
        }
    }

    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        if !key.is_empty() {
            return anthropic(&key, config);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2XlsxError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set ANTHROPIC_API_KEY (or pass --api-key), or configure another provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(Arc::new(ProviderBackend::new(llm_provider, "auto", config)))
}

fn anthropic(key: &str, config: &ExtractionConfig) -> Result<Arc<dyn LlmBackend>, Pdf2XlsxError> {
    if key.trim().is_empty() {
        return Err(Pdf2XlsxError::ProviderNotConfigured {
            provider: "anthropic".to_string(),
            hint: "The API key is empty.".to_string(),
        });
    }
    let model = config.model_or_default();
    let provider = AnthropicProvider::new(key).with_model(model);
    Ok(Arc::new(ProviderBackend::new(
        Arc::new(provider),
        format!("anthropic/{model}"),
        config,
    )))
}

fn named_provider(
    name: &str,
    model: &str,
    config: &ExtractionConfig,
) -> Result<Arc<dyn LlmBackend>, Pdf2XlsxError> {
    let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        Pdf2XlsxError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(ProviderBackend::new(
        provider,
        format!("{name}/{model}"),
        config,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::MockProvider;

    #[test]
    fn provider_error_classification() {
        assert_eq!(
            classify_provider_error(LlmError::AuthError("invalid x-api-key".into())),
            NormalizeError::Auth("invalid x-api-key".into())
        );
        assert_eq!(
            classify_provider_error(LlmError::RateLimited("slow down".into())),
            NormalizeError::RateLimited("slow down".into())
        );
        assert!(matches!(
            classify_provider_error(LlmError::NetworkError("connection reset".into())),
            NormalizeError::Request(_)
        ));
        assert!(matches!(
            classify_provider_error(LlmError::Timeout),
            NormalizeError::Request(_)
        ));
        assert!(matches!(
            classify_provider_error(LlmError::ApiError("HTTP 529: overloaded".into())),
            NormalizeError::Api(ref msg) if msg.contains("overloaded")
        ));
        assert!(matches!(
            classify_provider_error(LlmError::ModelNotFound("claude-9".into())),
            NormalizeError::Api(_)
        ));
    }

    #[test]
    fn explicit_key_selects_anthropic() {
        let config = ExtractionConfig::builder()
            .api_key("sk-test")
            .model("claude-3-haiku-20240307")
            .build()
            .unwrap();
        let backend = resolve_backend(&config).unwrap();
        assert_eq!(backend.label(), "anthropic/claude-3-haiku-20240307");
    }

    #[test]
    fn explicit_key_without_model_uses_default() {
        let config = ExtractionConfig::builder().api_key("sk-test").build().unwrap();
        let backend = resolve_backend(&config).unwrap();
        assert_eq!(
            backend.label(),
            format!("anthropic/{}", crate::config::DEFAULT_MODEL)
        );
    }

    #[test]
    fn blank_key_is_not_configured() {
        let config = ExtractionConfig::builder().api_key("  ").build().unwrap();
        assert!(matches!(
            resolve_backend(&config).err().unwrap(),
            Pdf2XlsxError::ProviderNotConfigured { .. }
        ));
    }

    #[tokio::test]
    async fn provider_answer_is_returned_verbatim() {
        let mock = MockProvider::new();
        mock.add_response("a,b\n1,2").await;
        let backend = ProviderBackend::new(Arc::new(mock), "mock", &ExtractionConfig::default());
        assert_eq!(backend.complete("x").await.unwrap(), "a,b\n1,2");
    }

    #[tokio::test]
    async fn blank_answer_is_empty_response() {
        let mock = MockProvider::new();
        mock.add_response("   ").await;
        let backend = ProviderBackend::new(Arc::new(mock), "mock", &ExtractionConfig::default());
        assert_eq!(
            backend.complete("x").await.unwrap_err(),
            NormalizeError::EmptyResponse
        );
    }

    #[test]
    fn options_follow_config() {
        let config = ExtractionConfig::builder()
            .max_tokens(512)
            .temperature(0.3)
            .build()
            .unwrap();
        let opts = build_options(&config);
        assert_eq!(opts.max_tokens, Some(512));
        assert_eq!(opts.temperature, Some(0.3));
    }
}
