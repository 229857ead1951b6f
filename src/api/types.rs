//! API request and response types
//!
//! Request keys follow what the web client sends: `chatId` for chat-scoped
//! calls, `user_id` for queue joins.

use crate::db::{Chat, Message, MessageRole};
use crate::queue::{InboxEntry, QueuedChat};
use crate::triage::{TriageOutcome, TriageState};
use serde::{Deserialize, Serialize};

/// Request to run one triage turn
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageRequest {
    pub chat_id: Option<String>,
    pub message: Option<String>,
}

/// Result of one triage turn
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageResponse {
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_question: Option<String>,
    pub meta: TriageState,
}

impl From<TriageOutcome> for TriageResponse {
    fn from(outcome: TriageOutcome) -> Self {
        match outcome {
            TriageOutcome::Complete { meta } => Self {
                done: true,
                follow_up_question: None,
                meta,
            },
            TriageOutcome::NeedsMore {
                follow_up_question,
                meta,
            } => Self {
                done: false,
                follow_up_question: Some(follow_up_question),
                meta,
            },
        }
    }
}

/// Knowledge-base question, optionally posted into a chat
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub chat_id: Option<String>,
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinQueueRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinQueueResponse {
    pub id: String,
    pub count: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndChatRequest {
    pub chat_id: Option<String>,
}

/// Active-chat count
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

/// A chat row plus its queue position
#[derive(Debug, Serialize)]
pub struct ChatView {
    #[serde(flatten)]
    pub chat: Chat,
    #[serde(rename = "queuePosition")]
    pub queue_position: Option<i64>,
}

impl From<QueuedChat> for ChatView {
    fn from(queued: QueuedChat) -> Self {
        Self {
            chat: queued.chat,
            queue_position: queued.queue_position,
        }
    }
}

/// Operator inbox row
#[derive(Debug, Serialize)]
pub struct InboxItem {
    #[serde(flatten)]
    pub chat: Chat,
    #[serde(rename = "queuePosition")]
    pub queue_position: Option<i64>,
    #[serde(rename = "lastMessage")]
    pub last_message: Option<Message>,
}

impl From<InboxEntry> for InboxItem {
    fn from(entry: InboxEntry) -> Self {
        Self {
            chat: entry.chat,
            queue_position: entry.queue_position,
            last_message: entry.last_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub chats: Vec<ChatView>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub chat: ChatView,
}

#[derive(Debug, Serialize)]
pub struct ActiveChatResponse {
    pub chat: Option<ChatView>,
}

#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub chats: Vec<InboxItem>,
}

/// Request to post a chat message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: Option<String>,
    /// Defaults to `user`
    pub role: Option<MessageRole>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
