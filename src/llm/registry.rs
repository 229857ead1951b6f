//! Generator selection: configuration and the ordered provider chain

use super::huggingface::DEFAULT_GEN_MODEL;
use super::{
    GenerationRequest, HuggingFaceGenerator, LlmError, LocalGenerator, LoggingGenerator,
    TextGenerator,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Reply used when no generation backend is configured at all (development).
pub const CANNED_REPLY: &str = "यह डमी उत्तर है — HuggingFace API कुंजी गायब है।";

/// Configuration for text-generation providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Self-hosted endpoint, e.g. `http://localhost:5000/generate`
    pub local_url: Option<String>,
    pub huggingface_api_key: Option<String>,
    /// Hugging Face model id; defaults to `google/mt5-small`
    pub model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            local_url: non_empty_env("LOCAL_GPT4ALL_URL"),
            huggingface_api_key: non_empty_env("HUGGINGFACE_API_KEY"),
            model: non_empty_env("HF_GEN_MODEL"),
        }
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Development stand-in that always answers with [`CANNED_REPLY`]
pub struct CannedGenerator;

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, LlmError> {
        Ok(CANNED_REPLY.to_string())
    }

    fn name(&self) -> &str {
        "canned"
    }
}

/// Tries each configured provider in order until one answers.
///
/// With no providers configured it answers with the canned development reply.
/// When every configured provider fails, the last error is returned.
pub struct GeneratorChain {
    providers: Vec<Arc<dyn TextGenerator>>,
    fallback: Arc<dyn TextGenerator>,
}

impl GeneratorChain {
    pub fn new(config: &LlmConfig) -> Self {
        let mut providers: Vec<Arc<dyn TextGenerator>> = Vec::new();

        if let Some(url) = &config.local_url {
            match LocalGenerator::new(url.clone()) {
                Ok(g) => providers.push(Arc::new(LoggingGenerator::new(Arc::new(g)))),
                Err(e) => tracing::warn!(error = %e, "Local generator unavailable"),
            }
        }

        if let Some(key) = &config.huggingface_api_key {
            let model = config.model.as_deref().unwrap_or(DEFAULT_GEN_MODEL);
            match HuggingFaceGenerator::new(key.clone(), model) {
                Ok(g) => providers.push(Arc::new(LoggingGenerator::new(Arc::new(g)))),
                Err(e) => tracing::warn!(error = %e, "Hugging Face generator unavailable"),
            }
        }

        Self::with_providers(providers)
    }

    pub fn with_providers(providers: Vec<Arc<dyn TextGenerator>>) -> Self {
        Self {
            providers,
            fallback: Arc::new(CannedGenerator),
        }
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}

#[async_trait]
impl TextGenerator for GeneratorChain {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        if self.providers.is_empty() {
            return self.fallback.generate(request).await;
        }

        let mut last_error = None;
        for provider in &self.providers {
            match provider.generate(request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(
                        provider = %provider.name(),
                        error = %e,
                        "Generator failed, trying next provider"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::unknown("No generator answered")))
    }

    fn name(&self) -> &str {
        "chain"
    }
}
