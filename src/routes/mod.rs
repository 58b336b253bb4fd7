use axum::{extract::DefaultBodyLimit, http::Method, http::header, Extension, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::{hub::ChatHub, presence::Presence, state::{AppMeta, StatusBoard}};

pub mod chat;
pub mod info;
pub mod viewer;

pub fn router() -> Router {
    Router::new().nest(
        "/api",
        info::router()
            .merge(chat::router())
            .merge(viewer::router()),
    )
}

/// Routes plus the shared handles and middleware stack.
pub fn app(
    hub: ChatHub,
    presence: Presence,
    board: StatusBoard,
    meta: AppMeta,
    body_limit: usize,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    router()
        .layer(Extension(hub))
        .layer(Extension(presence))
        .layer(Extension(board))
        .layer(Extension(meta))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
