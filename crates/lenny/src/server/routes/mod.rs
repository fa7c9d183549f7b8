//! Routes of the chat server

pub mod chat;
pub mod pages;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Chat page, its script and the chat endpoint
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::index))
        .route("/static/js/script.js", get(pages::script))
        .route("/chat", post(chat::chat))
}
