//! Mock backends for testing
//!
//! Replies are queued up front and every request is recorded.

use super::{GenerationRequest, LlmError, TextGenerator};
use crate::embeddings::{Embedder, EMBEDDING_DIM};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

// ============================================================================
// Mock Generator
// ============================================================================

/// Mock generator that returns queued replies
pub struct MockGenerator {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    /// Answer used once the queue is drained
    default_reply: Option<String>,
    /// Record of all requests made
    pub requests: Mutex<Vec<GenerationRequest>>,
}

#[allow(dead_code)]
impl MockGenerator {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Mock that answers every call with the same reply
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            default_reply: Some(reply.into()),
            ..Self::new()
        }
    }

    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }
        self.default_reply
            .clone()
            .ok_or_else(|| LlmError::network("No mock reply queued"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Mock Embedder
// ============================================================================

/// Embeds text by keyword: dimension `i` is 1.0 when `keywords[i]` occurs.
pub struct KeywordEmbedder {
    keywords: Vec<String>,
    /// Record of every batch embedded
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        assert!(keywords.len() <= EMBEDDING_DIM);
        Self {
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.calls.lock().unwrap().push(texts.to_vec());
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0; EMBEDDING_DIM];
                for (i, k) in self.keywords.iter().enumerate() {
                    if text.contains(k.as_str()) {
                        v[i] = 1.0;
                    }
                }
                v
            })
            .collect())
    }

    fn name(&self) -> &str {
        "keyword"
    }
}
