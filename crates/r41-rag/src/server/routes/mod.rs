//! API routes for the chat server

pub mod chat;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "r41-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Question answering about the R41 club with streamed answers",
        "endpoints": {
            "POST /api/chat": "Ask a question; the answer streams back as plain text",
            "GET /api/info": "This document",
            "GET /health": "Liveness",
            "GET /ready": "Backend reachability"
        }
    }))
}
