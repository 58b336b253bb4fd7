use axum::{
    extract::rejection::JsonRejection,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::{bad, AppResult},
    state::{AppMeta, StatusBoard, StreamInfo},
};

pub fn router() -> Router {
    Router::new()
        .route("/info",   get(read_info))
        .route("/update", post(update_info))
        .route("/health", get(health))
        .route("/stats",  get(stats))
}

async fn read_info(Extension(board): Extension<StatusBoard>) -> Json<Value> {
    let (info, s) = board.info().await;
    Json(json!({
        "title":        info.title,
        "description":  info.description,
        "announcement": info.announcement,
        "is_live":      s.is_live,
        "uptime":       s.uptime,
        "viewer_count": s.viewer_count,
    }))
}

async fn update_info(
    Extension(board): Extension<StatusBoard>,
    body: Result<Json<StreamInfo>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(new_info) = body.map_err(|e| bad(format!("invalid request body: {e}")))?;
    info!(title = %new_info.title, "📝 admin update");
    board.update_info(new_info).await;
    Ok(Json(json!({"status": "success"})))
}

async fn health(Extension(meta): Extension<AppMeta>) -> Json<Value> {
    Json(json!({
        "status":  "healthy",
        "version": meta.version,
        "uptime":  meta.started.elapsed().as_secs(),
    }))
}

async fn stats(Extension(board): Extension<StatusBoard>) -> Json<Value> {
    let s = board.snapshot().await;
    let since = s
        .last_check
        .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0);
    Json(json!({
        "is_live":           s.is_live,
        "uptime":            s.uptime,
        "viewer_count":      s.viewer_count,
        "last_check":        since,
        "stream_started_at": s.stream_started_at,
        "media_sequence":    s.media_sequence,
    }))
}
