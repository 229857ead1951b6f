//! Server-Sent Events support
//!
//! Each stream opens with an `init` snapshot, then relays matching events
//! from the application event bus.

use crate::events::AppEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
pub fn sse_stream<F>(
    init: Value,
    broadcast_rx: broadcast::Receiver<AppEvent>,
    wanted: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: Fn(&AppEvent) -> bool + Send + 'static,
{
    let init = futures::stream::once(async move { Ok(init_event(&init)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(move |result| match result {
        Ok(event) if wanted(&event) => Some(Ok(app_event_to_axum(&event))),
        // Skip unwanted and lagged messages
        _ => None,
    });

    let combined = init.chain(broadcasts);

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn init_event(snapshot: &Value) -> Event {
    let mut data = json!({ "type": "init" });
    if let (Some(obj), Some(fields)) = (data.as_object_mut(), snapshot.as_object()) {
        obj.extend(fields.clone());
    }
    Event::default().event("init").data(data.to_string())
}

pub(crate) fn app_event_to_axum(event: &AppEvent) -> Event {
    let (event_type, data) = event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}

pub(crate) fn event_payload(event: &AppEvent) -> (&'static str, Value) {
    match event {
        AppEvent::QueueChanged { active_count } => (
            "queue_changed",
            json!({
                "type": "queue_changed",
                "count": active_count
            }),
        ),
        AppEvent::ChatCreated { chat } => (
            "chat_created",
            json!({
                "type": "chat_created",
                "chat": chat
            }),
        ),
        AppEvent::MessageAdded { chat_id, message } => (
            "message",
            json!({
                "type": "message",
                "chat_id": chat_id,
                "message": message
            }),
        ),
        AppEvent::ChatEnded { chat_id } => (
            "chat_ended",
            json!({
                "type": "chat_ended",
                "chat_id": chat_id
            }),
        ),
    }
}
