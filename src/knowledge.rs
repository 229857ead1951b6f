//! Knowledge base: built-in documents, chunking and vector retrieval
//!
//! Chunks are stored with their embeddings and searched by brute-force
//! cosine similarity. The knowledge base is a handful of short policy
//! documents, so a full scan per query is cheap.

use crate::db::{Database, DbError, KbChunk};
use crate::embeddings::Embedder;
use crate::llm::LlmError;
use thiserror::Error;

/// Maximum characters per chunk
pub const CHUNK_CHARS: usize = 1000;

/// Chunks retrieved per question
pub const MATCH_COUNT: usize = 4;

/// A document shipped with the service
#[derive(Debug, Clone, Copy)]
pub struct SeedDoc {
    pub title: &'static str,
    pub source: &'static str,
    pub lang: &'static str,
    pub body: &'static str,
}

pub const SEED_DOCS: &[SeedDoc] = &[
    SeedDoc {
        title: "परामर्श नीति",
        source: "internal",
        lang: "hi",
        body: "• यह AI सहायक केवल सामान्य मार्गदर्शन देता है।\n\
               • अंतिम सलाह मानव ज्योतिषी देंगे।\n\
               • मूल्य, समय-सारणी, और गोपनीयता नीति यहाँ दी गई है…",
    },
    SeedDoc {
        title: "सेवा सीमाएँ",
        source: "internal",
        lang: "hi",
        body: "• चिकित्सा/कानूनी/वित्तीय निश्चित दावे नहीं।\n\
               • संवेदनशील व्यक्तिगत डेटा साझा न करें।\n\
               • आपातकाल में स्थानीय सेवाओं से संपर्क करें।",
    },
];

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Embedding failed: {0}")]
    Embedding(#[from] LlmError),
    #[error("Embedder returned {got} vectors for {expected} chunks")]
    EmbeddingCount { expected: usize, got: usize },
}

/// Outcome of a seeding run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub docs: usize,
    pub chunks: usize,
    /// Documents already present, left untouched
    pub skipped: usize,
}

/// A chunk with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: KbChunk,
    pub score: f32,
}

/// Split into consecutive slices of at most `max_chars` characters.
pub fn chunk_text(body: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 {
        return Vec::new();
    }
    let chars: Vec<char> = body.chars().collect();
    chars
        .chunks(max_chars)
        .map(|slice| slice.iter().collect())
        .collect()
}

/// Insert, chunk and embed one document.
pub async fn ingest_document(
    db: &Database,
    embedder: &dyn Embedder,
    doc: &SeedDoc,
) -> Result<usize, KnowledgeError> {
    let chunks = chunk_text(doc.body, CHUNK_CHARS);
    let embeddings = embedder.embed(&chunks).await?;
    if embeddings.len() != chunks.len() {
        return Err(KnowledgeError::EmbeddingCount {
            expected: chunks.len(),
            got: embeddings.len(),
        });
    }

    let stored = db.insert_kb_doc(doc.title, doc.source, doc.lang, doc.body)?;
    for (index, (content, embedding)) in (0_i64..).zip(chunks.iter().zip(&embeddings)) {
        db.insert_kb_chunk(&stored.id, index, content, embedding)?;
    }

    tracing::info!(doc_id = %stored.id, title = %doc.title, chunks = chunks.len(), "Ingested document");
    Ok(chunks.len())
}

/// Seed the built-in documents, skipping titles already present.
pub async fn seed_knowledge_base(
    db: &Database,
    embedder: &dyn Embedder,
) -> Result<SeedReport, KnowledgeError> {
    let mut report = SeedReport::default();

    for doc in SEED_DOCS {
        if db.kb_doc_exists(doc.title)? {
            report.skipped += 1;
            continue;
        }
        report.chunks += ingest_document(db, embedder, doc).await?;
        report.docs += 1;
    }

    Ok(report)
}

/// Top `match_count` stored chunks by cosine similarity, best first.
/// Equal scores keep storage order.
pub fn match_chunks(
    db: &Database,
    query_embedding: &[f32],
    match_count: usize,
) -> Result<Vec<ScoredChunk>, DbError> {
    let mut scored: Vec<ScoredChunk> = db
        .list_kb_chunks()?
        .into_iter()
        .map(|chunk| ScoredChunk {
            score: cosine_similarity(query_embedding, &chunk.embedding),
            chunk,
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(match_count);
    Ok(scored)
}

/// Zero-length, mismatched or all-zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
