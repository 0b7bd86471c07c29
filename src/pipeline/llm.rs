//! edgequake-llm-backed [`GenerativeBackend`].
//!
//! The "model location" of a generic generative engine maps onto an
//! edgequake-llm provider name (`openai`, `anthropic`, `gemini`, `ollama`,
//! …). Initialisation resolves the provider through
//! [`ProviderFactory::create_llm_provider`], which reads the matching API key
//! from the environment. There is nothing to download, so progress jumps from
//! 0 to 1 once the provider is constructed.
//!
//! This module is intentionally thin: prompt wording lives in
//! [`crate::prompts`], lifecycle decisions in [`crate::rewrite`].

use crate::config::EngineOptions;
use crate::engine::{EngineInit, GenerativeBackend, GenerativeEngine, InitProgress};
use crate::error::ConvertError;
use crate::prompts::REWRITE_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Creates engines backed by an edgequake-llm provider.
#[derive(Clone, Default)]
pub struct LlmBackend {
    provider: Option<Arc<dyn LLMProvider>>,
}

impl LlmBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a pre-built provider for every model instead of resolving one from
    /// the model location. Useful when the caller needs custom middleware.
    pub fn with_provider(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }
}

#[async_trait]
impl GenerativeBackend for LlmBackend {
    async fn create_engine(
        &self,
        init: &EngineInit,
        progress: InitProgress<'_>,
    ) -> Result<Box<dyn GenerativeEngine>, ConvertError> {
        progress(0.0, &format!("Connecting to {}", init.model_location));

        let provider = match self.provider {
            Some(ref provider) => Arc::clone(provider),
            None => ProviderFactory::create_llm_provider(&init.model_location, &init.model_id)
                .map_err(|e| {
                    ConvertError::engine_init(
                        "generative",
                        format!("provider '{}': {e}", init.model_location),
                    )
                })?,
        };

        info!(
            "Generative engine ready: {} via {}",
            init.model_id, init.model_location
        );
        progress(1.0, &format!("{} ready", init.model_id));

        Ok(Box::new(LlmEngine {
            provider,
            model_id: init.model_id.clone(),
            options: build_options(&init.options),
        }))
    }
}

struct LlmEngine {
    provider: Arc<dyn LLMProvider>,
    model_id: String,
    options: CompletionOptions,
}

#[async_trait]
impl GenerativeEngine for LlmEngine {
    async fn generate(&self, prompt: &str) -> Result<String, ConvertError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(REWRITE_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ConvertError::GenerationFailure {
                model_id: self.model_id.clone(),
                detail: e.to_string(),
            })?;

        debug!(
            "Rewrite: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }

    async fn unload(self: Box<Self>) {
        debug!("Released provider for {}", self.model_id);
    }
}

/// Build `CompletionOptions` from the engine options.
fn build_options(options: &EngineOptions) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(options.temperature),
        max_tokens: Some(options.max_tokens),
        ..Default::default()
    }
}
