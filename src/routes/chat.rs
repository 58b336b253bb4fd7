use std::{convert::Infallible, time::Duration};
use axum::{
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    error::{bad, AppResult},
    hub::{ChatHub, ChatMessage, Subscription},
};

pub const MAX_TEXT:      usize = 280;
pub const MAX_USER:      usize = 32;
pub const DEFAULT_COLOR: &str  = "#fb7185";

#[derive(Deserialize)]
pub struct ChatInput {
    #[serde(default)]
    pub user:  String,
    #[serde(default)]
    pub text:  String,
    #[serde(default)]
    pub color: Option<String>,
}

pub fn router() -> Router {
    Router::new()
        .route("/chat/send",   post(send))
        .route("/chat/stream", get(stream_chat))
}

/* ---------------- 驗證 + 補欄位 ---------------- */
pub fn build_message(input: ChatInput) -> AppResult<ChatMessage> {
    let text_len = input.text.chars().count();
    if text_len == 0 || text_len > MAX_TEXT {
        return Err(bad(format!("text must be 1-{MAX_TEXT} chars")));
    }
    let user_len = input.user.chars().count();
    if user_len == 0 || user_len > MAX_USER {
        return Err(bad(format!("user must be 1-{MAX_USER} chars")));
    }
    let color = input
        .color
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_COLOR.into());

    Ok(ChatMessage {
        user:  input.user,
        text:  input.text,
        color,
        time:  chrono::Local::now().format("%H:%M").to_string(),
    })
}

async fn send(
    Extension(hub): Extension<ChatHub>,
    Json(input): Json<ChatInput>,
) -> AppResult<Json<Value>> {
    let msg = build_message(input)?;
    let delivered = hub.publish(msg);
    debug!(delivered, "chat message published");
    Ok(Json(json!({"status": "ok"})))
}

/* ---------------- SSE ---------------- */
async fn stream_chat(
    Extension(hub): Extension<ChatHub>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let sub = hub.subscribe();
    debug!(subscriber = sub.id(), "chat subscriber joined");
    let events = chat_events(sub).filter_map(|m| async move {
        match Event::default().json_data(&m) {
            Ok(ev) => Some(Ok(ev)),
            Err(e) => {
                warn!(error = %e, "failed to encode chat message");
                None
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// History first, then live messages. The stream owns the subscription, so
/// when axum drops it (peer gone, server shutting down) the subscriber is
/// removed from the hub. Ends on its own once the hub closes.
pub fn chat_events(mut sub: Subscription) -> impl Stream<Item = ChatMessage> {
    let history = stream::iter(sub.take_history());
    let live = stream::unfold(sub, |mut sub| async move {
        sub.recv().await.map(|m| (m, sub))
    });
    history.chain(live)
}
