//! Sentence embeddings for knowledge-base retrieval
//!
//! Same provider order as generation: a self-hosted embedding server, then
//! the Hugging Face feature-extraction pipeline. Unlike generation, embedding
//! never fails outward: when nothing answers, zero vectors are returned and
//! retrieval degrades to "no relevant context".

use crate::llm::{non_empty_env, LlmError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Output dimension of paraphrase-multilingual-MiniLM-L12-v2
pub const EMBEDDING_DIM: usize = 384;
pub const DEFAULT_EMBED_MODEL: &str = "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";
const FEATURE_EXTRACTION_BASE_URL: &str =
    "https://api-inference.huggingface.co/pipeline/feature-extraction";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Common interface for embedding backends
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    fn name(&self) -> &str;
}

/// Configuration for embedding providers
#[derive(Debug, Clone, Default)]
pub struct EmbeddingConfig {
    /// Self-hosted endpoint accepting `{texts}` and answering `number[][]`
    pub local_url: Option<String>,
    pub huggingface_api_key: Option<String>,
    pub model: Option<String>,
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        Self {
            local_url: non_empty_env("LOCAL_EMBEDDINGS_URL"),
            huggingface_api_key: non_empty_env("HUGGINGFACE_API_KEY"),
            model: non_empty_env("HF_EMBED_MODEL"),
        }
    }
}

fn http_client() -> Result<Client, LlmError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))
}

// ============================================================================
// Local embedding server
// ============================================================================

pub struct LocalEmbedder {
    client: Client,
    url: String,
}

impl LocalEmbedder {
    pub fn new(url: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "texts": texts }))
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(LlmError::from_status(status, &body));
        }

        let data: Value = serde_json::from_str(&body)
            .map_err(|e| LlmError::unknown(format!("Invalid embedding response: {e}")))?;
        validate_vectors(&data, texts.len())
            .ok_or_else(|| LlmError::unknown("Local embeddings returned unexpected shape"))
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Accept only one flat numeric vector per input.
fn validate_vectors(data: &Value, expected: usize) -> Option<Vec<Vec<f32>>> {
    let items = data.as_array()?;
    if items.len() != expected {
        return None;
    }
    items.iter().map(as_vector).collect()
}

#[allow(clippy::cast_possible_truncation)]
fn as_vector(value: &Value) -> Option<Vec<f32>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|n| n.as_f64().map(|f| f as f32))
        .collect()
}

// ============================================================================
// Hugging Face feature extraction
// ============================================================================

pub struct HuggingFaceEmbedder {
    client: Client,
    api_key: String,
    url: String,
}

impl HuggingFaceEmbedder {
    pub fn new(api_key: impl Into<String>, model: &str) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client()?,
            api_key: api_key.into(),
            url: format!("{FEATURE_EXTRACTION_BASE_URL}/{model}"),
        })
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(texts)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(LlmError::from_status(status, &body));
        }

        let data: Value = serde_json::from_str(&body)
            .map_err(|e| LlmError::unknown(format!("Invalid embedding response: {e}")))?;
        let vectors = normalize_feature_output(&data);
        if vectors.len() == texts.len() {
            Ok(vectors)
        } else {
            Err(LlmError::unknown(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )))
        }
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

/// Feature extraction answers either one vector per input or one vector per
/// token per input; token vectors are mean-pooled.
pub(crate) fn normalize_feature_output(data: &Value) -> Vec<Vec<f32>> {
    let Some(items) = data.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let rows = item.as_array()?;
            if rows.first().is_some_and(Value::is_array) {
                let tokens: Vec<Vec<f32>> = rows.iter().filter_map(as_vector).collect();
                mean_pool(&tokens)
            } else {
                as_vector(item)
            }
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn mean_pool(tokens: &[Vec<f32>]) -> Option<Vec<f32>> {
    let width = tokens.first()?.len();
    let mut avg = vec![0.0_f32; width];
    for token in tokens {
        for (slot, x) in avg.iter_mut().zip(token) {
            *slot += x;
        }
    }
    let n = tokens.len() as f32;
    for slot in &mut avg {
        *slot /= n;
    }
    Some(avg)
}

// ============================================================================
// Chain with zero-vector fallback
// ============================================================================

/// Tries providers in order; degrades to zero vectors when none answers.
pub struct EmbedderChain {
    providers: Vec<Arc<dyn Embedder>>,
}

impl EmbedderChain {
    pub fn new(config: &EmbeddingConfig) -> Self {
        let mut providers: Vec<Arc<dyn Embedder>> = Vec::new();

        if let Some(url) = &config.local_url {
            match LocalEmbedder::new(url.clone()) {
                Ok(e) => providers.push(Arc::new(e)),
                Err(e) => tracing::warn!(error = %e, "Local embedder unavailable"),
            }
        }

        if let Some(key) = &config.huggingface_api_key {
            let model = config.model.as_deref().unwrap_or(DEFAULT_EMBED_MODEL);
            match HuggingFaceEmbedder::new(key.clone(), model) {
                Ok(e) => providers.push(Arc::new(e)),
                Err(e) => tracing::warn!(error = %e, "Hugging Face embedder unavailable"),
            }
        }

        Self { providers }
    }

    pub fn with_providers(providers: Vec<Arc<dyn Embedder>>) -> Self {
        Self { providers }
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }
}

#[async_trait]
impl Embedder for EmbedderChain {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        for provider in &self.providers {
            match provider.embed(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => tracing::warn!(
                    provider = %provider.name(),
                    error = %e,
                    "Embedding failed, trying next provider"
                ),
            }
        }

        if self.has_providers() {
            tracing::warn!(count = texts.len(), "All embedders failed, using zero vectors");
        }
        Ok(zero_vectors(texts.len()))
    }

    fn name(&self) -> &str {
        "chain"
    }
}

pub fn zero_vectors(count: usize) -> Vec<Vec<f32>> {
    vec![vec![0.0; EMBEDDING_DIM]; count]
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            Err(LlmError::network("unreachable"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn approx_eq(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    #[test]
    fn test_flat_vectors_pass_through() {
        let data = json!([[1.0, 2.0], [3.0, 4.0]]);
        let out = normalize_feature_output(&data);
        assert_eq!(out.len(), 2);
        assert!(approx_eq(&out[1], &[3.0, 4.0]));
    }

    #[test]
    fn test_token_vectors_are_mean_pooled() {
        let data = json!([[[1.0, 0.0], [3.0, 2.0]]]);
        let out = normalize_feature_output(&data);
        assert_eq!(out.len(), 1);
        assert!(approx_eq(&out[0], &[2.0, 1.0]));
    }

    #[test]
    fn test_local_shape_validation() {
        assert!(validate_vectors(&json!([[0.1, 0.2]]), 1).is_some());
        // wrong count
        assert!(validate_vectors(&json!([[0.1, 0.2]]), 2).is_none());
        // non-numeric
        assert!(validate_vectors(&json!([["a"]]), 1).is_none());
        // error object
        assert!(validate_vectors(&json!({"error": "missing 'texts'"}), 1).is_none());
    }

    #[tokio::test]
    async fn test_chain_without_providers_returns_zero_vectors() {
        let chain = EmbedderChain::with_providers(vec![]);
        let out = chain
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), EMBEDDING_DIM);
        assert!(out.iter().flatten().all(|x| x.abs() < f32::EPSILON));
    }

    #[tokio::test]
    async fn test_chain_degrades_when_all_fail() {
        let chain = EmbedderChain::with_providers(vec![Arc::new(FailingEmbedder) as Arc<dyn Embedder>]);
        let out = chain.embed(&["q".to_string()]).await.unwrap();
        assert_eq!(out, zero_vectors(1));
    }
}
