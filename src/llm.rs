//! Text-generation backend abstraction
//!
//! Provides a common interface over the generation providers the service can
//! talk to: a self-hosted endpoint, the Hugging Face inference API, and a
//! canned development reply.

mod error;
mod huggingface;
mod local;
mod registry;
mod types;

#[cfg(test)]
pub mod testing;

pub use error::{LlmError, LlmErrorKind};
pub use huggingface::HuggingFaceGenerator;
pub use local::LocalGenerator;
pub use registry::{CannedGenerator, GeneratorChain, LlmConfig, CANNED_REPLY};
pub(crate) use registry::non_empty_env;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for text-generation backends
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce a reply for the request. An empty string is a valid reply.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        (**self).generate(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Logging wrapper for generators
pub struct LoggingGenerator {
    inner: Arc<dyn TextGenerator>,
    name: String,
}

impl LoggingGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>) -> Self {
        let name = inner.name().to_string();
        Self { inner, name }
    }
}

#[async_trait]
impl TextGenerator for LoggingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.generate(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(text) => {
                tracing::info!(
                    provider = %self.name,
                    duration_ms = %duration.as_millis(),
                    temperature = request.temperature,
                    reply_chars = text.chars().count(),
                    "Generation completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    provider = %self.name,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Generation failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        &self.name
    }
}
