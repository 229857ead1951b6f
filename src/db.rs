//! Database module
//!
//! Provides persistence for chats, messages, the queue metric cache, the
//! knowledge base and AI event analytics.

mod schema;

pub use schema::*;

use crate::triage::TriageState;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Chat not found: {0}")]
    ChatNotFound(String),
    #[error("Chat has ended: {0}")]
    ChatEnded(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// `ASTRO_DB_PATH`, else `~/.astro-consult/astro.db`
pub fn db_path_from_env() -> PathBuf {
    std::env::var("ASTRO_DB_PATH").map_or_else(
        |_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".astro-consult").join("astro.db")
        },
        PathBuf::from,
    )
}

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

const CHAT_COLUMNS: &str = "id, user_id, priority, status, meta, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, role, content, created_at";
const AI_EVENT_COLUMNS: &str =
    "id, chat_id, role, prompt, response, retrieved_chunk_ids, latency_ms, created_at";

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Every statement is a short critical section, so a panic elsewhere
    /// cannot leave the connection half-updated.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Chat Operations ====================

    /// Return the user's active chat, or create one at the back of the queue.
    ///
    /// The lookup, priority assignment and insert share one lock, so
    /// concurrent joins never produce duplicate priorities or a second active
    /// chat for the same user. The flag is `true` when a chat was created.
    pub fn open_chat_for_user(&self, user_id: &str) -> DbResult<(Chat, bool)> {
        let conn = self.conn();

        if let Some(existing) = active_chat_for_user(&conn, user_id)? {
            return Ok((existing, false));
        }

        let priority: i64 = conn.query_row(
            "SELECT COALESCE(MAX(priority), 0) + 1 FROM chats",
            [],
            |row| row.get(0),
        )?;

        let now = now();
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            priority,
            status: ChatStatus::Active,
            meta: TriageState::new(),
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO chats (id, user_id, priority, status, meta, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, '{}', ?5, ?5)",
            params![
                chat.id,
                chat.user_id,
                chat.priority,
                chat.status.as_str(),
                timestamp(now)
            ],
        )?;

        Ok((chat, true))
    }

    /// Get chat by ID
    pub fn get_chat(&self, id: &str) -> DbResult<Chat> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1"),
            params![id],
            parse_chat_row,
        )
        .optional()?
        .ok_or_else(|| DbError::ChatNotFound(id.to_string()))
    }

    /// Replace the triage fields stored on a chat
    pub fn update_chat_meta(&self, id: &str, meta: &TriageState) -> DbResult<()> {
        let conn = self.conn();
        let meta_json = serde_json::to_string(meta)?;
        let updated = conn.execute(
            "UPDATE chats SET meta = ?1, updated_at = ?2 WHERE id = ?3",
            params![meta_json, timestamp(now()), id],
        )?;

        if updated == 0 {
            return Err(DbError::ChatNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Mark a chat ended. Returns `false` if it had already ended.
    pub fn end_chat(&self, id: &str) -> DbResult<bool> {
        let conn = self.conn();
        let exists: bool = conn
            .query_row("SELECT 1 FROM chats WHERE id = ?1", params![id], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(DbError::ChatNotFound(id.to_string()));
        }

        let updated = conn.execute(
            "UPDATE chats SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            params![
                ChatStatus::Ended.as_str(),
                timestamp(now()),
                id,
                ChatStatus::Active.as_str()
            ],
        )?;
        Ok(updated > 0)
    }

    pub fn count_active_chats(&self) -> DbResult<i64> {
        let conn = self.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM chats WHERE status = ?1",
            params![ChatStatus::Active.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// All chats in join order
    pub fn list_chats(&self) -> DbResult<Vec<Chat>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats ORDER BY priority ASC"
        ))?;
        let rows = stmt.query_map([], parse_chat_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// A user's chats in join order
    pub fn list_chats_for_user(&self, user_id: &str) -> DbResult<Vec<Chat>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE user_id = ?1 ORDER BY priority ASC"
        ))?;
        let rows = stmt.query_map(params![user_id], parse_chat_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn active_chat_for_user(&self, user_id: &str) -> DbResult<Option<Chat>> {
        active_chat_for_user(&self.conn(), user_id)
    }

    /// 1-based queue position of every active chat, keyed by chat ID
    pub fn queue_positions(&self) -> DbResult<HashMap<String, i64>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id FROM chats WHERE status = ?1 ORDER BY priority ASC")?;
        let ids = stmt
            .query_map(params![ChatStatus::Active.as_str()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ids.into_iter().zip(1..).collect())
    }

    // ==================== Metric Operations ====================

    pub fn upsert_metric(&self, key: &str, count: i64) -> DbResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO queue_metrics (metric_key, count, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(metric_key) DO UPDATE SET count = excluded.count, updated_at = excluded.updated_at",
            params![key, count, timestamp(now())],
        )?;
        Ok(())
    }

    pub fn get_metric(&self, key: &str) -> DbResult<Option<QueueMetric>> {
        let conn = self.conn();
        let metric = conn
            .query_row(
                "SELECT metric_key, count, updated_at FROM queue_metrics WHERE metric_key = ?1",
                params![key],
                |row| {
                    Ok(QueueMetric {
                        metric_key: row.get(0)?,
                        count: row.get(1)?,
                        updated_at: parse_datetime(&row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;
        Ok(metric)
    }

    // ==================== Message Operations ====================

    /// Append a message to an active chat
    pub fn add_message(
        &self,
        chat_id: &str,
        sender_id: Option<&str>,
        role: MessageRole,
        content: &str,
    ) -> DbResult<Message> {
        let conn = self.conn();

        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM chats WHERE id = ?1",
                params![chat_id],
                |row| row.get(0),
            )
            .optional()?;
        match status.as_deref() {
            None => return Err(DbError::ChatNotFound(chat_id.to_string())),
            Some(s) if s != ChatStatus::Active.as_str() => {
                return Err(DbError::ChatEnded(chat_id.to_string()))
            }
            Some(_) => {}
        }

        let now = now();
        let message = Message {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.map(String::from),
            role,
            content: content.to_string(),
            created_at: now,
        };

        conn.execute(
            "INSERT INTO messages (id, chat_id, sender_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id,
                message.chat_id,
                message.sender_id,
                role.to_string(),
                message.content,
                timestamp(now),
            ],
        )?;

        conn.execute(
            "UPDATE chats SET updated_at = ?1 WHERE id = ?2",
            params![timestamp(now), chat_id],
        )?;

        Ok(message)
    }

    /// Messages of a chat in insertion order
    pub fn get_messages(&self, chat_id: &str) -> DbResult<Vec<Message>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ?1 ORDER BY rowid ASC"
        ))?;
        let rows = stmt.query_map(params![chat_id], parse_message_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn last_message(&self, chat_id: &str) -> DbResult<Option<Message>> {
        let conn = self.conn();
        let message = conn
            .query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ?1
                     ORDER BY rowid DESC LIMIT 1"
                ),
                params![chat_id],
                parse_message_row,
            )
            .optional()?;
        Ok(message)
    }

    // ==================== Knowledge Base Operations ====================

    pub fn insert_kb_doc(&self, title: &str, source: &str, lang: &str, body: &str) -> DbResult<KbDoc> {
        let conn = self.conn();
        let doc = KbDoc {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            source: source.to_string(),
            lang: lang.to_string(),
            body: body.to_string(),
            created_at: now(),
        };

        conn.execute(
            "INSERT INTO kb_docs (id, title, source, lang, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                doc.id,
                doc.title,
                doc.source,
                doc.lang,
                doc.body,
                timestamp(doc.created_at)
            ],
        )?;
        Ok(doc)
    }

    pub fn kb_doc_exists(&self, title: &str) -> DbResult<bool> {
        let conn = self.conn();
        let found = conn
            .query_row(
                "SELECT 1 FROM kb_docs WHERE title = ?1 LIMIT 1",
                params![title],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn insert_kb_chunk(
        &self,
        doc_id: &str,
        chunk_index: i64,
        content: &str,
        embedding: &[f32],
    ) -> DbResult<KbChunk> {
        let conn = self.conn();
        let chunk = KbChunk {
            id: Uuid::new_v4().to_string(),
            doc_id: doc_id.to_string(),
            chunk_index,
            content: content.to_string(),
            embedding: embedding.to_vec(),
        };

        conn.execute(
            "INSERT INTO kb_chunks (id, doc_id, chunk_index, content, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                chunk.id,
                chunk.doc_id,
                chunk.chunk_index,
                chunk.content,
                serde_json::to_string(embedding)?
            ],
        )?;
        Ok(chunk)
    }

    /// Every stored chunk, grouped by document
    pub fn list_kb_chunks(&self) -> DbResult<Vec<KbChunk>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, doc_id, chunk_index, content, embedding FROM kb_chunks
             ORDER BY doc_id, chunk_index",
        )?;
        let rows = stmt.query_map([], |row| {
            let embedding: String = row.get(4)?;
            Ok(KbChunk {
                id: row.get(0)?,
                doc_id: row.get(1)?,
                chunk_index: row.get(2)?,
                content: row.get(3)?,
                embedding: serde_json::from_str(&embedding).unwrap_or_default(),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== AI Event Operations ====================

    pub fn insert_ai_event(&self, event: &NewAiEvent) -> DbResult<AiEvent> {
        let conn = self.conn();
        let recorded = AiEvent {
            id: Uuid::new_v4().to_string(),
            chat_id: event.chat_id.clone(),
            role: event.role.clone(),
            prompt: event.prompt.clone(),
            response: event.response.clone(),
            retrieved_chunk_ids: event.retrieved_chunk_ids.clone(),
            latency_ms: event.latency_ms,
            created_at: now(),
        };

        conn.execute(
            &format!("INSERT INTO ai_events ({AI_EVENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                recorded.id,
                recorded.chat_id,
                recorded.role,
                recorded.prompt,
                recorded.response,
                serde_json::to_string(&recorded.retrieved_chunk_ids)?,
                recorded.latency_ms,
                timestamp(recorded.created_at),
            ],
        )?;
        Ok(recorded)
    }

    pub fn count_ai_events(&self) -> DbResult<i64> {
        let conn = self.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM ai_events", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_ai_events_since(&self, since: DateTime<Utc>) -> DbResult<i64> {
        let conn = self.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM ai_events WHERE created_at >= ?1",
            params![timestamp(since)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Most recent events first
    pub fn recent_ai_events(&self, limit: usize) -> DbResult<Vec<AiEvent>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {AI_EVENT_COLUMNS} FROM ai_events ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            let chunk_ids: String = row.get(5)?;
            Ok(AiEvent {
                id: row.get(0)?,
                chat_id: row.get(1)?,
                role: row.get(2)?,
                prompt: row.get(3)?,
                response: row.get(4)?,
                retrieved_chunk_ids: serde_json::from_str(&chunk_ids).unwrap_or_default(),
                latency_ms: row.get(6)?,
                created_at: parse_datetime(&row.get::<_, String>(7)?),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn active_chat_for_user(conn: &Connection, user_id: &str) -> DbResult<Option<Chat>> {
    let chat = conn
        .query_row(
            &format!(
                "SELECT {CHAT_COLUMNS} FROM chats WHERE user_id = ?1 AND status = ?2
                 ORDER BY priority DESC LIMIT 1"
            ),
            params![user_id, ChatStatus::Active.as_str()],
            parse_chat_row,
        )
        .optional()?;
    Ok(chat)
}

fn parse_chat_row(row: &Row<'_>) -> rusqlite::Result<Chat> {
    let status: String = row.get(3)?;
    let meta: String = row.get(4)?;
    Ok(Chat {
        id: row.get(0)?,
        user_id: row.get(1)?,
        priority: row.get(2)?,
        status: parse_chat_status(&status),
        meta: serde_json::from_str(&meta).unwrap_or_default(),
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn parse_message_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(3)?;
    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        sender_id: row.get(2)?,
        role: parse_message_role(&role),
        content: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn parse_chat_status(s: &str) -> ChatStatus {
    match s {
        "ended" => ChatStatus::Ended,
        _ => ChatStatus::Active,
    }
}

fn parse_message_role(s: &str) -> MessageRole {
    match s {
        "astrologer" => MessageRole::Astrologer,
        "assistant" => MessageRole::Assistant,
        _ => MessageRole::User,
    }
}

/// Current time at the precision timestamps are stored with
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so stored timestamps compare lexicographically
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::TriageField;

    #[test]
    fn test_open_chat_assigns_increasing_priority() {
        let db = Database::open_in_memory().unwrap();

        let (a, created_a) = db.open_chat_for_user("user-a").unwrap();
        let (b, created_b) = db.open_chat_for_user("user-b").unwrap();

        assert!(created_a && created_b);
        assert_eq!(a.priority, 1);
        assert_eq!(b.priority, 2);
        assert!(a.is_active());
        assert_eq!(a.meta, TriageState::new());

        let fetched = db.get_chat(&a.id).unwrap();
        assert_eq!(fetched.user_id, "user-a");
        assert_eq!(fetched.status, ChatStatus::Active);
    }

    #[test]
    fn test_open_chat_returns_existing_active_chat() {
        let db = Database::open_in_memory().unwrap();

        let (first, _) = db.open_chat_for_user("user-a").unwrap();
        let (again, created) = db.open_chat_for_user("user-a").unwrap();

        assert!(!created);
        assert_eq!(again.id, first.id);
        assert_eq!(db.count_active_chats().unwrap(), 1);
    }

    #[test]
    fn test_priority_keeps_growing_after_end() {
        let db = Database::open_in_memory().unwrap();

        let (first, _) = db.open_chat_for_user("user-a").unwrap();
        assert!(db.end_chat(&first.id).unwrap());
        let (second, created) = db.open_chat_for_user("user-a").unwrap();

        assert!(created);
        assert_eq!(second.priority, 2);
    }

    #[test]
    fn test_get_missing_chat() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_chat("nope"),
            Err(DbError::ChatNotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_meta_round_trips() {
        let db = Database::open_in_memory().unwrap();
        let (chat, _) = db.open_chat_for_user("user-a").unwrap();

        let mut meta = TriageState::new();
        meta.set(TriageField::Name, "Asha");
        meta.set(TriageField::Place, "Pune, India");
        db.update_chat_meta(&chat.id, &meta).unwrap();

        assert_eq!(db.get_chat(&chat.id).unwrap().meta, meta);
        assert!(matches!(
            db.update_chat_meta("nope", &meta),
            Err(DbError::ChatNotFound(_))
        ));
    }

    #[test]
    fn test_end_chat_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let (chat, _) = db.open_chat_for_user("user-a").unwrap();

        assert!(db.end_chat(&chat.id).unwrap());
        assert!(!db.end_chat(&chat.id).unwrap());
        assert_eq!(db.get_chat(&chat.id).unwrap().status, ChatStatus::Ended);
        assert_eq!(db.count_active_chats().unwrap(), 0);
        assert!(matches!(db.end_chat("nope"), Err(DbError::ChatNotFound(_))));
    }

    #[test]
    fn test_queue_positions_skip_ended_chats() {
        let db = Database::open_in_memory().unwrap();
        let (a, _) = db.open_chat_for_user("a").unwrap();
        let (b, _) = db.open_chat_for_user("b").unwrap();
        let (c, _) = db.open_chat_for_user("c").unwrap();

        db.end_chat(&a.id).unwrap();
        let positions = db.queue_positions().unwrap();

        assert_eq!(positions.get(&a.id), None);
        assert_eq!(positions[&b.id], 1);
        assert_eq!(positions[&c.id], 2);
    }

    #[test]
    fn test_metric_upsert() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_metric(ACTIVE_CHATS_METRIC).unwrap().is_none());

        db.upsert_metric(ACTIVE_CHATS_METRIC, 3).unwrap();
        db.upsert_metric(ACTIVE_CHATS_METRIC, 2).unwrap();

        let metric = db.get_metric(ACTIVE_CHATS_METRIC).unwrap().unwrap();
        assert_eq!(metric.count, 2);
    }

    #[test]
    fn test_messages_in_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let (chat, _) = db.open_chat_for_user("user-a").unwrap();

        db.add_message(&chat.id, Some("user-a"), MessageRole::User, "नमस्ते")
            .unwrap();
        db.add_message(&chat.id, Some("astro-1"), MessageRole::Astrologer, "Hello")
            .unwrap();
        db.add_message(&chat.id, None, MessageRole::Assistant, "Summary")
            .unwrap();

        let messages = db.get_messages(&chat.id).unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["नमस्ते", "Hello", "Summary"]);
        assert_eq!(messages[1].role, MessageRole::Astrologer);
        assert_eq!(messages[2].sender_id, None);

        let last = db.last_message(&chat.id).unwrap().unwrap();
        assert_eq!(last.content, "Summary");
    }

    #[test]
    fn test_add_message_rejects_ended_or_missing_chat() {
        let db = Database::open_in_memory().unwrap();
        let (chat, _) = db.open_chat_for_user("user-a").unwrap();
        db.end_chat(&chat.id).unwrap();

        assert!(matches!(
            db.add_message(&chat.id, None, MessageRole::User, "hi"),
            Err(DbError::ChatEnded(_))
        ));
        assert!(matches!(
            db.add_message("nope", None, MessageRole::User, "hi"),
            Err(DbError::ChatNotFound(_))
        ));
    }

    #[test]
    fn test_kb_chunks_store_embeddings() {
        let db = Database::open_in_memory().unwrap();
        let doc = db.insert_kb_doc("नीति", "internal", "hi", "body").unwrap();
        db.insert_kb_chunk(&doc.id, 1, "second", &[0.0, 1.0]).unwrap();
        db.insert_kb_chunk(&doc.id, 0, "first", &[1.0, 0.5]).unwrap();

        let chunks = db.list_kb_chunks().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "first");
        assert_eq!(chunks[0].embedding, vec![1.0, 0.5]);
        assert!(db.kb_doc_exists("नीति").unwrap());
        assert!(!db.kb_doc_exists("other").unwrap());
    }

    #[test]
    fn test_ai_events() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..3 {
            db.insert_ai_event(&NewAiEvent {
                chat_id: None,
                role: "assistant".to_string(),
                prompt: format!("q{i}"),
                response: "a".to_string(),
                retrieved_chunk_ids: vec!["c1".to_string()],
                latency_ms: 10,
            })
            .unwrap();
        }

        assert_eq!(db.count_ai_events().unwrap(), 3);
        let since = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(db.count_ai_events_since(since).unwrap(), 3);
        let future = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(db.count_ai_events_since(future).unwrap(), 0);

        let recent = db.recent_ai_events(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].prompt, "q2");
        assert_eq!(recent[0].retrieved_chunk_ids, vec!["c1"]);
    }

    #[test]
    fn test_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("astro.db");

        let id = {
            let db = Database::open(&path).unwrap();
            db.open_chat_for_user("user-a").unwrap().0.id
        };

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_chat(&id).unwrap().priority, 1);
    }
}
