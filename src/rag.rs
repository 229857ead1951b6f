//! Retrieval-augmented answering over the knowledge base
//!
//! Embed the question, pull the closest chunks, ask the generator to answer
//! from that context only, moderate the answer, then record it.

use crate::db::{Database, DbError, MessageRole, NewAiEvent};
use crate::embeddings::Embedder;
use crate::events::{AppEvent, EventBus};
use crate::knowledge::{match_chunks, ScoredChunk, MATCH_COUNT};
use crate::llm::{GenerationRequest, LlmError, TextGenerator};
use crate::moderation::moderate_answer;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub const RAG_SYSTEM: &str = "आपको केवल दिए गए संदर्भ से उत्तर देना है। संदर्भ में न हो तो कहें:
\"इस विषय पर मेरे पास निश्चित जानकारी नहीं है।\"
हमेशा हिंदी में, संक्षेप में, और अंत में 2-3 संदर्भ [1][2] जैसे दिखाएँ。";

pub const RAG_TEMPERATURE: f32 = 0.3;

/// Role recorded on AI events for generated answers
const ASSISTANT_ROLE: &str = "assistant";

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Question is empty")]
    EmptyQuestion,
    #[error("Embedding failed: {0}")]
    Embedding(#[source] LlmError),
    #[error("Generation failed: {0}")]
    Generation(#[source] LlmError),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Source reference returned with an answer; `n` matches the `【n】` marker
/// in the prompt context.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Citation {
    pub n: usize,
    pub id: String,
    pub doc_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RagAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

#[derive(Clone)]
pub struct RagService {
    db: Database,
    generator: Arc<dyn TextGenerator>,
    embedder: Arc<dyn Embedder>,
    events: EventBus,
}

impl RagService {
    pub fn new(
        db: Database,
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
        events: EventBus,
    ) -> Self {
        Self {
            db,
            generator,
            embedder,
            events,
        }
    }

    /// Answer a question from the knowledge base.
    ///
    /// With a `chat_id` the moderated answer is also posted to that chat.
    /// Recording failures are logged and never fail the answer.
    pub async fn answer_question(
        &self,
        chat_id: Option<&str>,
        question: &str,
    ) -> Result<RagAnswer, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        let query = self
            .embedder
            .embed(&[question.to_string()])
            .await
            .map_err(RagError::Embedding)?
            .into_iter()
            .next()
            .unwrap_or_default();
        let chunks = match_chunks(&self.db, &query, MATCH_COUNT)?;

        let prompt = build_prompt(question, &chunks);
        let request = GenerationRequest::new(RAG_SYSTEM, prompt.clone(), RAG_TEMPERATURE);

        let start = Instant::now();
        let raw = self
            .generator
            .generate(&request)
            .await
            .map_err(RagError::Generation)?;
        let latency_ms = i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX);

        let answer = moderate_answer(&raw);
        tracing::info!(
            chunks = chunks.len(),
            latency_ms,
            chat_id = chat_id.unwrap_or(""),
            "Answered question"
        );

        self.record(chat_id, prompt, &answer, &chunks, latency_ms);

        Ok(RagAnswer {
            citations: citations(&chunks),
            answer,
        })
    }

    fn record(
        &self,
        chat_id: Option<&str>,
        prompt: String,
        answer: &str,
        chunks: &[ScoredChunk],
        latency_ms: i64,
    ) {
        let event = NewAiEvent {
            chat_id: chat_id.map(String::from),
            role: ASSISTANT_ROLE.to_string(),
            prompt,
            response: answer.to_string(),
            retrieved_chunk_ids: chunks.iter().map(|c| c.chunk.id.clone()).collect(),
            latency_ms,
        };
        if let Err(e) = self.db.insert_ai_event(&event) {
            tracing::warn!(error = %e, "Failed to record AI event");
        }

        let Some(chat_id) = chat_id.filter(|_| !answer.is_empty()) else {
            return;
        };
        match self
            .db
            .add_message(chat_id, None, MessageRole::Assistant, answer)
        {
            Ok(message) => {
                self.events.publish(AppEvent::MessageAdded {
                    chat_id: chat_id.to_string(),
                    message,
                });
            }
            Err(e) => tracing::warn!(chat_id = %chat_id, error = %e, "Failed to store answer"),
        }
    }
}

/// Context block plus question, chunks numbered from 1
pub fn build_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
    let context = chunks
        .iter()
        .enumerate()
        .map(|(i, c)| format!("【{}】{}", i + 1, c.chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("प्रश्न: {question}\n\nसंदर्भ:\n{context}")
}

fn citations(chunks: &[ScoredChunk]) -> Vec<Citation> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| Citation {
            n: i + 1,
            id: c.chunk.id.clone(),
            doc_id: c.chunk.doc_id.clone(),
        })
        .collect()
}
