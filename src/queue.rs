//! Consultation queue
//!
//! Users join and get a chat at the back of the queue; operators end chats.
//! After every change the active-chat count is recomputed, cached in
//! `queue_metrics` and announced on the event bus.

use crate::db::{Chat, Database, DbError, Message, ACTIVE_CHATS_METRIC};
use crate::events::{AppEvent, EventBus};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Missing user_id")]
    MissingUserId,
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result of joining the queue
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub chat: Chat,
    /// `false` when the user's existing active chat was returned
    pub created: bool,
    /// Active chats after the join
    pub count: i64,
}

/// A chat with its place in line. Ended chats have no position.
#[derive(Debug, Clone)]
pub struct QueuedChat {
    pub chat: Chat,
    pub queue_position: Option<i64>,
}

/// Operator inbox row
#[derive(Debug, Clone)]
pub struct InboxEntry {
    pub chat: Chat,
    pub queue_position: Option<i64>,
    pub last_message: Option<Message>,
}

#[derive(Clone)]
pub struct QueueService {
    db: Database,
    events: EventBus,
}

impl QueueService {
    pub fn new(db: Database, events: EventBus) -> Self {
        Self { db, events }
    }

    pub fn join_queue(&self, user_id: &str) -> Result<JoinOutcome, QueueError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(QueueError::MissingUserId);
        }

        let (chat, created) = self.db.open_chat_for_user(user_id)?;
        if created {
            tracing::info!(chat_id = %chat.id, user_id = %user_id, priority = chat.priority, "Chat joined queue");
            self.events.publish(AppEvent::ChatCreated { chat: chat.clone() });
        } else {
            tracing::debug!(chat_id = %chat.id, user_id = %user_id, "User already queued");
        }

        let count = self.refresh_active_count()?;
        Ok(JoinOutcome {
            chat,
            created,
            count,
        })
    }

    /// End a chat. Ending an already-ended chat succeeds without changes.
    pub fn end_chat(&self, chat_id: &str) -> Result<i64, QueueError> {
        if self.db.end_chat(chat_id)? {
            tracing::info!(chat_id = %chat_id, "Chat ended");
            self.events.publish(AppEvent::ChatEnded {
                chat_id: chat_id.to_string(),
            });
        }
        self.refresh_active_count()
    }

    /// Cached active-chat count; 0 before anything was cached
    pub fn queue_count(&self) -> Result<i64, QueueError> {
        Ok(self
            .db
            .get_metric(ACTIVE_CHATS_METRIC)?
            .map_or(0, |m| m.count))
    }

    pub fn chat(&self, chat_id: &str) -> Result<QueuedChat, QueueError> {
        let chat = self.db.get_chat(chat_id)?;
        let positions = self.db.queue_positions()?;
        Ok(with_position(chat, &positions))
    }

    pub fn user_chats(&self, user_id: &str) -> Result<Vec<QueuedChat>, QueueError> {
        let chats = self.db.list_chats_for_user(user_id)?;
        let positions = self.db.queue_positions()?;
        Ok(chats
            .into_iter()
            .map(|chat| with_position(chat, &positions))
            .collect())
    }

    pub fn active_chat(&self, user_id: &str) -> Result<Option<QueuedChat>, QueueError> {
        let Some(chat) = self.db.active_chat_for_user(user_id)? else {
            return Ok(None);
        };
        let positions = self.db.queue_positions()?;
        Ok(Some(with_position(chat, &positions)))
    }

    /// Every chat in join order, with position and latest message
    pub fn inbox(&self) -> Result<Vec<InboxEntry>, QueueError> {
        let positions = self.db.queue_positions()?;
        self.db
            .list_chats()?
            .into_iter()
            .map(|chat| -> Result<InboxEntry, QueueError> {
                let last_message = self.db.last_message(&chat.id)?;
                Ok(InboxEntry {
                    queue_position: positions.get(&chat.id).copied(),
                    chat,
                    last_message,
                })
            })
            .collect()
    }

    fn refresh_active_count(&self) -> Result<i64, QueueError> {
        let count = self.db.count_active_chats()?;
        self.db.upsert_metric(ACTIVE_CHATS_METRIC, count)?;
        self.events
            .publish(AppEvent::QueueChanged { active_count: count });
        Ok(count)
    }
}

fn with_position(chat: Chat, positions: &HashMap<String, i64>) -> QueuedChat {
    QueuedChat {
        queue_position: positions.get(&chat.id).copied(),
        chat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MessageRole;

    fn service() -> QueueService {
        QueueService::new(Database::open_in_memory().unwrap(), EventBus::new())
    }

    #[test]
    fn test_join_assigns_positions_in_order() {
        let queue = service();

        let a = queue.join_queue("user-a").unwrap();
        let b = queue.join_queue("user-b").unwrap();

        assert!(a.created && b.created);
        assert_eq!(a.count, 1);
        assert_eq!(b.count, 2);
        assert!(b.chat.priority > a.chat.priority);
        assert_eq!(queue.chat(&a.chat.id).unwrap().queue_position, Some(1));
        assert_eq!(queue.chat(&b.chat.id).unwrap().queue_position, Some(2));
    }

    #[test]
    fn test_join_twice_returns_same_chat() {
        let queue = service();
        let first = queue.join_queue("user-a").unwrap();
        let second = queue.join_queue(" user-a ").unwrap();

        assert!(!second.created);
        assert_eq!(second.chat.id, first.chat.id);
        assert_eq!(second.count, 1);
    }

    #[test]
    fn test_join_requires_user_id() {
        let queue = service();
        assert!(matches!(
            queue.join_queue("  "),
            Err(QueueError::MissingUserId)
        ));
    }

    #[test]
    fn test_end_updates_cached_count_and_positions() {
        let queue = service();
        assert_eq!(queue.queue_count().unwrap(), 0);

        let a = queue.join_queue("user-a").unwrap();
        let b = queue.join_queue("user-b").unwrap();
        assert_eq!(queue.queue_count().unwrap(), 2);

        assert_eq!(queue.end_chat(&a.chat.id).unwrap(), 1);
        assert_eq!(queue.queue_count().unwrap(), 1);
        assert_eq!(queue.chat(&a.chat.id).unwrap().queue_position, None);
        assert_eq!(queue.chat(&b.chat.id).unwrap().queue_position, Some(1));

        // idempotent
        assert_eq!(queue.end_chat(&a.chat.id).unwrap(), 1);
    }

    #[test]
    fn test_end_unknown_chat() {
        let queue = service();
        assert!(matches!(
            queue.end_chat("missing"),
            Err(QueueError::Db(DbError::ChatNotFound(_)))
        ));
    }

    #[test]
    fn test_user_chats_and_active_chat() {
        let queue = service();
        let first = queue.join_queue("user-a").unwrap();
        queue.end_chat(&first.chat.id).unwrap();
        let second = queue.join_queue("user-a").unwrap();
        queue.join_queue("user-b").unwrap();

        let chats = queue.user_chats("user-a").unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].chat.id, first.chat.id);
        assert_eq!(chats[0].queue_position, None);
        assert_eq!(chats[1].queue_position, Some(1));

        let active = queue.active_chat("user-a").unwrap().unwrap();
        assert_eq!(active.chat.id, second.chat.id);
        assert!(queue.active_chat("nobody").unwrap().is_none());
    }

    #[test]
    fn test_inbox_includes_last_message() {
        let db = Database::open_in_memory().unwrap();
        let queue = QueueService::new(db.clone(), EventBus::new());
        let a = queue.join_queue("user-a").unwrap();
        queue.join_queue("user-b").unwrap();

        db.add_message(&a.chat.id, Some("user-a"), MessageRole::User, "first")
            .unwrap();
        db.add_message(&a.chat.id, Some("astro"), MessageRole::Astrologer, "reply")
            .unwrap();

        let inbox = queue.inbox().unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].last_message.as_ref().unwrap().content, "reply");
        assert!(inbox[1].last_message.is_none());
        assert_eq!(inbox[1].queue_position, Some(2));
    }

    #[tokio::test]
    async fn test_events_published() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let queue = QueueService::new(Database::open_in_memory().unwrap(), events);

        let joined = queue.join_queue("user-a").unwrap();
        queue.end_chat(&joined.chat.id).unwrap();

        assert!(matches!(rx.recv().await.unwrap(), AppEvent::ChatCreated { .. }));
        assert_eq!(
            rx.recv().await.unwrap(),
            AppEvent::QueueChanged { active_count: 1 }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            AppEvent::ChatEnded {
                chat_id: joined.chat.id.clone()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            AppEvent::QueueChanged { active_count: 0 }
        );
    }
}
