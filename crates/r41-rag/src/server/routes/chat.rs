//! Streaming chat endpoint

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use std::convert::Infallible;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::ChatRequest;

/// Header carrying the request id of a streamed answer
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// POST /api/chat - stream an answer as `text/plain` chunks
pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload.map_err(|e| Error::invalid_request(e.body_text()))?;
    let chat = request.validate()?;

    tracing::info!(
        "Chat: \"{}\" ({} history turns)",
        chat.question,
        chat.history.len()
    );

    let answer = state.pipeline().answer(chat.question, &chat.history);
    let request_id = answer.request_id().to_string();
    let body = Body::from_stream(answer.map(Ok::<_, Infallible>));

    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    Ok(response)
}
