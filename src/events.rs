//! Application-wide change feed
//!
//! One broadcast channel owned by the application state. Queue and chat
//! changes are published here and fanned out to SSE subscribers.

use crate::db::{Chat, Message};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 128;

/// A change other parts of the app may want to react to
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The cached active-chat count was recomputed
    QueueChanged { active_count: i64 },
    ChatCreated { chat: Chat },
    MessageAdded { chat_id: String, message: Message },
    ChatEnded { chat_id: String },
}

impl AppEvent {
    /// Chat this event belongs to, if any
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            AppEvent::QueueChanged { .. } => None,
            AppEvent::ChatCreated { chat } => Some(&chat.id),
            AppEvent::MessageAdded { chat_id, .. } | AppEvent::ChatEnded { chat_id } => {
                Some(chat_id)
            }
        }
    }

    /// Whether the operator's queue view should hear about this event
    pub fn affects_queue(&self) -> bool {
        !matches!(self, AppEvent::MessageAdded { .. })
    }
}

/// Cloneable publish/subscribe handle
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish to current subscribers. Returns how many received it; having
    /// none is fine.
    pub fn publish(&self, event: AppEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
