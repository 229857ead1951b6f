//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ActiveChatResponse, AskRequest, ChatListResponse, ChatResponse, ChatView, CountResponse,
    EndChatRequest, ErrorResponse, InboxItem, InboxResponse, JoinQueueRequest, JoinQueueResponse,
    MessageResponse, MessagesResponse, SendMessageRequest, TriageRequest, TriageResponse,
};
use super::AppState;
use crate::analytics::{analytics, Analytics};
use crate::chat::ChatError;
use crate::db::{DbError, MessageRole};
use crate::events::AppEvent;
use crate::queue::QueueError;
use crate::rag::{RagAnswer, RagError};
use crate::triage::TriageServiceError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

/// Shown when the text generator fails; the client resends its last message.
const GENERATION_FAILED: &str = "Could not process your message right now. Please try again.";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Triage and knowledge-base answers
        .route("/api/triage", post(triage))
        .route("/api/ask", post(ask))
        // Queue
        .route("/api/join-queue", post(join_queue))
        .route("/api/queue-count", get(queue_count))
        .route("/api/end-chat", post(end_chat))
        .route("/api/inbox", get(inbox))
        .route("/api/queue/stream", get(stream_queue))
        // Per-user views
        .route("/api/users/:user_id/chats", get(user_chats))
        .route("/api/users/:user_id/active-chat", get(active_chat))
        // Chats
        .route("/api/chats/:id", get(get_chat))
        .route(
            "/api/chats/:id/messages",
            get(list_messages).post(send_message),
        )
        .route("/api/chats/:id/stream", get(stream_chat))
        // Admin
        .route("/api/admin/analytics", get(admin_analytics))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Triage
// ============================================================

/// Unreadable bodies are treated like an empty one, so they fail on the
/// missing `chatId` rather than with an extractor error.
async fn triage(
    State(state): State<AppState>,
    body: Option<Json<TriageRequest>>,
) -> Result<Json<TriageResponse>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let chat_id = required(req.chat_id, "chatId required")?;
    let message = req.message.unwrap_or_default();

    let outcome = state.triage.handle_turn(&chat_id, &message).await?;
    Ok(Json(outcome.into()))
}

// ============================================================
// Knowledge-base answers
// ============================================================

async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<RagAnswer>, AppError> {
    let chat_id = req.chat_id.filter(|id| !id.trim().is_empty());
    let answer = state
        .rag
        .answer_question(chat_id.as_deref(), &req.question)
        .await?;
    Ok(Json(answer))
}

// ============================================================
// Queue
// ============================================================

async fn join_queue(
    State(state): State<AppState>,
    body: Option<Json<JoinQueueRequest>>,
) -> Result<Json<JoinQueueResponse>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let user_id = required(req.user_id, "Missing user_id")?;

    let joined = state.queue.join_queue(&user_id)?;
    Ok(Json(JoinQueueResponse {
        id: joined.chat.id,
        count: joined.count,
    }))
}

async fn queue_count(State(state): State<AppState>) -> Result<Json<CountResponse>, AppError> {
    let count = state.queue.queue_count()?;
    Ok(Json(CountResponse { count }))
}

async fn end_chat(
    State(state): State<AppState>,
    body: Option<Json<EndChatRequest>>,
) -> Result<Json<CountResponse>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let chat_id = required(req.chat_id, "Missing chatId")?;

    let count = state.queue.end_chat(&chat_id)?;
    Ok(Json(CountResponse { count }))
}

async fn inbox(State(state): State<AppState>) -> Result<Json<InboxResponse>, AppError> {
    let chats = state.queue.inbox()?;
    Ok(Json(InboxResponse {
        chats: chats.into_iter().map(InboxItem::from).collect(),
    }))
}

async fn stream_queue(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    // Subscribe before reading the snapshot so nothing falls in between
    let broadcast_rx = state.events.subscribe();
    let count = state.queue.queue_count()?;

    Ok(sse_stream(
        json!({ "count": count }),
        broadcast_rx,
        AppEvent::affects_queue,
    ))
}

// ============================================================
// Per-user views
// ============================================================

async fn user_chats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ChatListResponse>, AppError> {
    let chats = state.queue.user_chats(&user_id)?;
    Ok(Json(ChatListResponse {
        chats: chats.into_iter().map(ChatView::from).collect(),
    }))
}

async fn active_chat(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ActiveChatResponse>, AppError> {
    let chat = state.queue.active_chat(&user_id)?;
    Ok(Json(ActiveChatResponse {
        chat: chat.map(ChatView::from),
    }))
}

// ============================================================
// Chats
// ============================================================

async fn get_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatResponse>, AppError> {
    let chat = state.queue.chat(&id)?;
    Ok(Json(ChatResponse { chat: chat.into() }))
}

async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessagesResponse>, AppError> {
    let messages = state.chats.messages(&id)?;
    Ok(Json(MessagesResponse { messages }))
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let role = req.role.unwrap_or_default();
    if role == MessageRole::Assistant {
        return Err(AppError::BadRequest(
            "role must be user or astrologer".to_string(),
        ));
    }

    let message = state
        .chats
        .send_message(&id, req.sender_id.as_deref(), role, &req.content)?;
    Ok(Json(MessageResponse { message }))
}

async fn stream_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let broadcast_rx = state.events.subscribe();
    let chat = state.queue.chat(&id)?;
    let messages = state.chats.messages(&id)?;

    let init = json!({
        "chat": ChatView::from(chat),
        "messages": messages,
    });

    Ok(sse_stream(init, broadcast_rx, move |event| {
        matches!(
            event,
            AppEvent::MessageAdded { chat_id, .. } | AppEvent::ChatEnded { chat_id }
                if *chat_id == id
        )
    }))
}

// ============================================================
// Admin
// ============================================================

async fn admin_analytics(State(state): State<AppState>) -> Result<Json<Analytics>, AppError> {
    let stats = analytics(&state.db)?;
    Ok(Json(stats))
}

async fn get_version() -> &'static str {
    concat!("astro-consult ", env!("CARGO_PKG_VERSION"))
}

fn required(value: Option<String>, message: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub(crate) enum AppError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ChatNotFound(_) => AppError::NotFound(e.to_string()),
            DbError::ChatEnded(_) => AppError::BadRequest(e.to_string()),
            DbError::Sqlite(_) | DbError::Json(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<QueueError> for AppError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::MissingUserId => AppError::BadRequest(e.to_string()),
            QueueError::Db(db) => db.into(),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::EmptyMessage => AppError::BadRequest(e.to_string()),
            ChatError::Db(db) => db.into(),
        }
    }
}

impl From<TriageServiceError> for AppError {
    fn from(e: TriageServiceError) -> Self {
        match e {
            TriageServiceError::Generation(err) => {
                tracing::warn!(error = %err, "Triage generation failed");
                AppError::BadGateway(GENERATION_FAILED.to_string())
            }
            TriageServiceError::Db(db) => db.into(),
        }
    }
}

impl From<RagError> for AppError {
    fn from(e: RagError) -> Self {
        match e {
            RagError::EmptyQuestion => AppError::BadRequest("question required".to_string()),
            RagError::Embedding(err) | RagError::Generation(err) => {
                tracing::warn!(error = %err, "Answer generation failed");
                AppError::BadGateway(GENERATION_FAILED.to_string())
            }
            RagError::Db(db) => db.into(),
        }
    }
}
