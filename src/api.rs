//! HTTP API for the consultation service
//!
//! JSON endpoints for triage, the consultation queue, chat messages and
//! knowledge-base answers, plus SSE streams for live queue and chat updates.

mod handlers;
mod sse;
mod types;


pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::chat::ChatService;
use crate::db::Database;
use crate::embeddings::Embedder;
use crate::events::EventBus;
use crate::llm::TextGenerator;
use crate::queue::QueueService;
use crate::rag::RagService;
use crate::triage::TriageService;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub events: EventBus,
    pub queue: QueueService,
    pub chats: ChatService,
    pub triage: TriageService,
    pub rag: RagService,
}

impl AppState {
    pub fn new(
        db: Database,
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let events = EventBus::new();
        Self {
            queue: QueueService::new(db.clone(), events.clone()),
            chats: ChatService::new(db.clone(), events.clone()),
            triage: TriageService::new(db.clone(), generator.clone()),
            rag: RagService::new(db.clone(), generator, embedder, events.clone()),
            db,
            events,
        }
    }
}
