//! Database schema and types

use crate::triage::TriageState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS chats (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    priority INTEGER NOT NULL UNIQUE,
    status TEXT NOT NULL DEFAULT 'active',
    meta TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chats_user ON chats(user_id, priority);
CREATE INDEX IF NOT EXISTS idx_chats_status ON chats(status, priority);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL,
    sender_id TEXT,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id);

CREATE TABLE IF NOT EXISTS queue_metrics (
    metric_key TEXT PRIMARY KEY,
    count INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kb_docs (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    source TEXT NOT NULL,
    lang TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kb_chunks (
    id TEXT PRIMARY KEY,
    doc_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding TEXT NOT NULL,

    FOREIGN KEY (doc_id) REFERENCES kb_docs(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_kb_chunks_doc ON kb_chunks(doc_id, chunk_index);

CREATE TABLE IF NOT EXISTS ai_events (
    id TEXT PRIMARY KEY,
    chat_id TEXT,
    role TEXT NOT NULL,
    prompt TEXT NOT NULL,
    response TEXT NOT NULL,
    retrieved_chunk_ids TEXT NOT NULL DEFAULT '[]',
    latency_ms INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ai_events_created ON ai_events(created_at DESC);
";

/// Key of the cached active-chat count in `queue_metrics`
pub const ACTIVE_CHATS_METRIC: &str = "active_chats";

/// Chat lifecycle. `Ended` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Active,
    Ended,
}

impl ChatStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatStatus::Active => "active",
            ChatStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One consultation: a queue entry plus its conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    /// Join order; lower is served first
    pub priority: i64,
    pub status: ChatStatus,
    /// Triage fields collected so far
    pub meta: TriageState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn is_active(&self) -> bool {
        self.status == ChatStatus::Active
    }
}

/// Who wrote a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    #[default]
    User,
    Astrologer,
    /// Generated answers; these have no sender
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Astrologer => write!(f, "astrologer"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: Option<String>,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Cached aggregate, keyed by metric name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueMetric {
    pub metric_key: String,
    pub count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Knowledge-base source document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KbDoc {
    pub id: String,
    pub title: String,
    pub source: String,
    pub lang: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Retrieval unit: a slice of a document with its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct KbChunk {
    pub id: String,
    pub doc_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// AI event to record
#[derive(Debug, Clone, PartialEq)]
pub struct NewAiEvent {
    pub chat_id: Option<String>,
    pub role: String,
    pub prompt: String,
    pub response: String,
    pub retrieved_chunk_ids: Vec<String>,
    pub latency_ms: i64,
}

/// Recorded AI event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiEvent {
    pub id: String,
    pub chat_id: Option<String>,
    pub role: String,
    pub prompt: String,
    pub response: String,
    pub retrieved_chunk_ids: Vec<String>,
    pub latency_ms: i64,
    pub created_at: DateTime<Utc>,
}
