//! Live chat messages between a user and the operator

use crate::db::{Database, DbError, Message, MessageRole};
use crate::events::{AppEvent, EventBus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Message content is empty")]
    EmptyMessage,
    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Clone)]
pub struct ChatService {
    db: Database,
    events: EventBus,
}

impl ChatService {
    pub fn new(db: Database, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Store a message on an active chat and publish it
    pub fn send_message(
        &self,
        chat_id: &str,
        sender_id: Option<&str>,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let sender_id = sender_id.map(str::trim).filter(|s| !s.is_empty());
        let message = self.db.add_message(chat_id, sender_id, role, content)?;

        tracing::debug!(chat_id = %chat_id, message_id = %message.id, role = %role, "Message stored");
        self.events.publish(AppEvent::MessageAdded {
            chat_id: chat_id.to_string(),
            message: message.clone(),
        });
        Ok(message)
    }

    /// Messages in insertion order. Unknown chats are an error, not empty.
    pub fn messages(&self, chat_id: &str) -> Result<Vec<Message>, ChatError> {
        self.db.get_chat(chat_id)?;
        Ok(self.db.get_messages(chat_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, ChatService, String) {
        let db = Database::open_in_memory().unwrap();
        let (chat, _) = db.open_chat_for_user("user-a").unwrap();
        let service = ChatService::new(db.clone(), EventBus::new());
        (db, service, chat.id)
    }

    #[test]
    fn test_send_trims_and_stores() {
        let (_db, service, chat_id) = setup();
        let message = service
            .send_message(&chat_id, Some("user-a"), MessageRole::User, "  नमस्ते  ")
            .unwrap();

        assert_eq!(message.content, "नमस्ते");
        assert_eq!(service.messages(&chat_id).unwrap(), vec![message]);
    }

    #[test]
    fn test_blank_sender_is_none() {
        let (_db, service, chat_id) = setup();
        let message = service
            .send_message(&chat_id, Some(" "), MessageRole::Astrologer, "hi")
            .unwrap();
        assert_eq!(message.sender_id, None);
    }

    #[test]
    fn test_rejects_empty_and_ended() {
        let (db, service, chat_id) = setup();
        assert!(matches!(
            service.send_message(&chat_id, None, MessageRole::User, "   "),
            Err(ChatError::EmptyMessage)
        ));

        db.end_chat(&chat_id).unwrap();
        assert!(matches!(
            service.send_message(&chat_id, None, MessageRole::User, "late"),
            Err(ChatError::Db(DbError::ChatEnded(_)))
        ));
    }

    #[test]
    fn test_messages_for_unknown_chat() {
        let (_db, service, _) = setup();
        assert!(matches!(
            service.messages("missing"),
            Err(ChatError::Db(DbError::ChatNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_message_published() {
        let db = Database::open_in_memory().unwrap();
        let (chat, _) = db.open_chat_for_user("user-a").unwrap();
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let service = ChatService::new(db, events);

        let sent = service
            .send_message(&chat.id, Some("user-a"), MessageRole::User, "hello")
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            AppEvent::MessageAdded {
                chat_id: chat.id.clone(),
                message: sent
            }
        );
    }
}
