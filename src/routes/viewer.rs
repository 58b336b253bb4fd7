use axum::{body::Bytes, routing::post, Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{presence::Presence, state::StatusBoard};

#[derive(Deserialize, Default)]
struct PingInput {
    #[serde(default)]
    viewer_id: Option<String>,
    #[serde(default)]
    offline:   bool,
}

pub fn router() -> Router {
    Router::new().route("/viewer/ping", post(ping))
}

// body 壞掉就當作空的 ping（第一次進來沒帶任何東西）
async fn ping(
    Extension(presence): Extension<Presence>,
    Extension(board): Extension<StatusBoard>,
    body: Bytes,
) -> Json<Value> {
    let input: PingInput = serde_json::from_slice(&body).unwrap_or_default();
    let p = presence.ping(input.viewer_id, input.offline);
    board.set_viewer_count(p.count, p.seq).await;
    Json(json!({"viewer_id": p.viewer_id, "viewer_count": p.count}))
}
